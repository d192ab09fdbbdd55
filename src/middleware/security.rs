use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::AppConfig;

/// Response headers required by the admin panel: the configured CSP plus
/// `nosniff` and same-origin framing. Headers a handler already set win.
pub fn security_headers(router: Router, config: &AppConfig) -> Router {
    let router = router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ));

    match HeaderValue::from_str(&config.content_security_policy_header()) {
        Ok(csp) => router.layer(SetResponseHeaderLayer::if_not_present(header::CONTENT_SECURITY_POLICY, csp)),
        Err(e) => {
            tracing::warn!(error = %e, "Content-Security-Policy is not a valid header value; not sending it");
            router
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn adds_security_headers() {
        let config = AppConfig::from_env();
        let app = security_headers(Router::new().route("/", get(|| async { "ok" })), &config);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        let csp = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(csp.contains("img-src"));
        assert!(csp.contains("https://storage.googleapis.com"));
    }
}
