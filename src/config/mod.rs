use base64::Engine;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub i18n: I18nConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout: u64,
    /// Seconds before an idle connection is closed
    pub idle_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub request_timeout_secs: u64,
    pub max_upload_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub project_id: Option<String>,
    pub bucket_name: String,
    pub base_path: Option<String>,
    pub public_host: String,
    pub provider_name: String,
    pub signed_url_ttl_secs: u64,
    #[serde(skip_serializing)]
    pub hmac: Option<HmacCredentials>,
}

/// HMAC key pair used for V4 signed URLs
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmacCredentials {
    pub access_id: String,
    pub secret: String,
}

impl std::fmt::Debug for HmacCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCredentials")
            .field("access_id", &self.access_id)
            .field("secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub content_security_policy: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I18nConfig {
    pub enabled: bool,
    pub default_locale: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DB_CONNECTION_TIMEOUT") {
            // Milliseconds, like the CMS database config
            if let Ok(ms) = v.parse::<u64>() {
                self.database.acquire_timeout = (ms / 1000).max(1);
            }
        }
        if let Ok(v) = env::var("DB_IDLE_TIMEOUT") {
            if let Ok(ms) = v.parse::<u64>() {
                self.database.idle_timeout = (ms / 1000).max(1);
            }
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Some(port) = env::var("PORT").ok().and_then(|s| s.parse().ok()) {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("MAX_UPLOAD_SIZE_MB") {
            if let Ok(mb) = v.parse::<usize>() {
                self.api.max_upload_size_bytes = mb * 1024 * 1024;
            }
        }

        // Storage overrides
        if let Ok(v) = env::var("GCP_PROJECT_ID") {
            self.storage.project_id = Some(v);
        }
        if let Ok(v) = env::var("GCS_BUCKET_NAME") {
            self.storage.bucket_name = v;
        }
        if let Ok(v) = env::var("GCS_BASE_PATH") {
            self.storage.base_path = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("GCS_SIGNED_URL_TTL_SECS") {
            self.storage.signed_url_ttl_secs = v.parse().unwrap_or(self.storage.signed_url_ttl_secs);
        }
        if let Ok(v) = env::var("GCS_HMAC_KEY_BASE64") {
            self.storage.hmac = decode_hmac_credentials(&v);
        }
        if let (Ok(access_id), Ok(secret)) = (env::var("GCS_HMAC_ACCESS_ID"), env::var("GCS_HMAC_SECRET")) {
            self.storage.hmac = Some(HmacCredentials { access_id, secret });
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        // i18n overrides
        if let Ok(v) = env::var("I18N_ENABLED") {
            self.i18n.enabled = v.parse().unwrap_or(self.i18n.enabled);
        }
        if let Ok(v) = env::var("I18N_DEFAULT_LOCALE") {
            self.i18n.default_locale = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 1,
                acquire_timeout: 60,
                idle_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 1337,
                default_page_size: 10,
                max_page_size: 1000,
                request_timeout_secs: 60,
                max_upload_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            storage: StorageConfig::defaults(),
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:1337".to_string(), "http://localhost:5173".to_string()],
                content_security_policy: default_content_security_policy(),
            },
            i18n: I18nConfig::defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 5,
                acquire_timeout: 30,
                idle_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 1337,
                default_page_size: 10,
                max_page_size: 500,
                request_timeout_secs: 30,
                max_upload_size_bytes: 10 * 1024 * 1024,
            },
            storage: StorageConfig::defaults(),
            security: SecurityConfig {
                cors_origins: vec![],
                content_security_policy: default_content_security_policy(),
            },
            i18n: I18nConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 10,
                acquire_timeout: 10,
                idle_timeout: 30,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 1337,
                default_page_size: 10,
                max_page_size: 100,
                request_timeout_secs: 30,
                max_upload_size_bytes: 10 * 1024 * 1024,
            },
            storage: StorageConfig::defaults(),
            security: SecurityConfig {
                cors_origins: vec![],
                content_security_policy: default_content_security_policy(),
            },
            i18n: I18nConfig::defaults(),
        }
    }

    /// Rendered Content-Security-Policy header value
    pub fn content_security_policy_header(&self) -> String {
        self.security
            .content_security_policy
            .iter()
            .map(|(directive, sources)| {
                if sources.is_empty() {
                    format!("{} 'none'", directive)
                } else {
                    format!("{} {}", directive, sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl StorageConfig {
    fn defaults() -> Self {
        Self {
            project_id: None,
            bucket_name: String::new(),
            base_path: None,
            public_host: "storage.googleapis.com".to_string(),
            provider_name: "@strapi-community/strapi-provider-upload-google-cloud-storage".to_string(),
            signed_url_ttl_secs: 15 * 60,
            hmac: None,
        }
    }
}

impl I18nConfig {
    fn defaults() -> Self {
        Self {
            enabled: true,
            default_locale: "ja".to_string(),
        }
    }
}

fn default_content_security_policy() -> Vec<(String, Vec<String>)> {
    let directive = |name: &str, sources: &[&str]| {
        (name.to_string(), sources.iter().map(|s| s.to_string()).collect())
    };
    vec![
        directive("default-src", &["'self'"]),
        directive("script-src", &["'self'", "'unsafe-inline'", "'unsafe-eval'"]),
        directive("style-src", &["'self'", "'unsafe-inline'"]),
        directive(
            "img-src",
            &["'self'", "data:", "blob:", "https://market-assets.strapi.io", "https://storage.googleapis.com"],
        ),
        directive("connect-src", &["'self'"]),
        directive("font-src", &["'self'", "data:"]),
        directive("media-src", &["'self'"]),
        directive("object-src", &["'none'"]),
        directive("frame-src", &[]),
    ]
}

/// Decode `{"accessId": "...", "secret": "..."}` from base64
fn decode_hmac_credentials(encoded: &str) -> Option<HmacCredentials> {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("GCS_HMAC_KEY_BASE64 is not valid base64: {}", e);
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(creds) => Some(creds),
        Err(e) => {
            tracing::warn!("GCS_HMAC_KEY_BASE64 does not hold HMAC credentials: {}", e);
            None
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.api.default_page_size, 10);
        assert_eq!(config.api.max_upload_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.signed_url_ttl_secs, 900);
        assert_eq!(config.i18n.default_locale, "ja");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.api.max_page_size, 100);
        assert!(!config.database.enable_query_logging);
    }

    #[test]
    fn content_security_policy_renders_all_directives() {
        let header = AppConfig::development().content_security_policy_header();
        assert!(header.starts_with("default-src 'self'; "));
        assert!(header.contains("img-src 'self' data: blob: https://market-assets.strapi.io https://storage.googleapis.com"));
        assert!(header.contains("object-src 'none'"));
        assert!(header.ends_with("frame-src 'none'"));
    }

    #[test]
    fn decodes_base64_hmac_credentials() {
        let raw = r#"{"accessId":"GOOG1EXAMPLE","secret":"c2VjcmV0"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let creds = decode_hmac_credentials(&encoded).expect("credentials");
        assert_eq!(creds.access_id, "GOOG1EXAMPLE");
        assert_eq!(creds.secret, "c2VjcmV0");
        assert!(decode_hmac_credentials("not base64!").is_none());
    }
}
