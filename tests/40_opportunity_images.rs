mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{database_app, send};

const OPPORTUNITIES: &str = "/content-manager/collection-types/api::opportunity.opportunity";

fn inline_image(url: &str, name: &str) -> Value {
    json!({
        "id": -1,
        "url": url,
        "name": name,
        "size": 120.5,
        "width": 800,
        "height": 600,
        "mime": "image/jpeg",
        "ext": ".jpg",
        "alternativeText": "",
        "caption": "seaside"
    })
}

fn image_ids(body: &Value) -> Vec<String> {
    let mut ids: Vec<String> = body["data"]["images"]
        .as_array()
        .map(|images| images.iter().filter_map(|i| i["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    ids.sort();
    ids
}

#[tokio::test]
async fn update_replaces_the_image_set() {
    let Some((app, _pool)) = database_app().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let run = uuid::Uuid::new_v4().to_string();
    let first_url = format!("https://storage.googleapis.com/media/opp/{}/first.jpg", run);
    let second_url = format!("https://storage.googleapis.com/media/opp/{}/second.jpg", run);

    let created = send(
        &app,
        Method::POST,
        OPPORTUNITIES,
        Some(json!({
            "title": "Beach cleanup",
            "category": "ACTIVITY",
            "community": { "connect": [{ "id": "community-1" }] },
            "place": { "connect": [{ "id": "place-1" }] },
            "createdByUserOnDB": { "connect": [{ "id": "user-1" }] },
            "images": [inline_image(&first_url, "first.jpg")]
        })),
    )
    .await;
    assert_eq!(created.status, StatusCode::OK, "{}", created.body);
    let id = created.body["data"]["id"].as_str().unwrap().to_string();
    let entry = format!("{}/{}", OPPORTUNITIES, id);

    let fetched = send(&app, Method::GET, &entry, None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let first = image_ids(&fetched.body);
    assert_eq!(first.len(), 1);
    assert_eq!(fetched.body["data"]["images"][0]["url"], first_url.as_str());

    // Keep the first image by id, add a second inline, and repeat the first by url
    let updated = send(
        &app,
        Method::PUT,
        &entry,
        Some(json!({
            "images": [
                { "id": first[0] },
                inline_image(&second_url, "second.jpg"),
                { "id": -1, "url": first_url }
            ]
        })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.body["data"]["images"], json!([]));

    let fetched = send(&app, Method::GET, &entry, None).await;
    let both = image_ids(&fetched.body);
    assert_eq!(both.len(), 2);
    assert!(both.contains(&first[0]));

    // Unknown ids are dropped and the rest of the update still applies
    let updated = send(
        &app,
        Method::PUT,
        &entry,
        Some(json!({ "title": "Beach cleanup (rescheduled)", "images": { "connect": [{ "id": "no-such-image" }] } })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["title"], "Beach cleanup (rescheduled)");
    let fetched = send(&app, Method::GET, &entry, None).await;
    assert!(image_ids(&fetched.body).is_empty());

    // No images key leaves the relation alone
    let restored = send(&app, Method::PUT, &entry, Some(json!({ "images": [{ "id": first[0] }] }))).await;
    assert_eq!(restored.status, StatusCode::OK);
    let untouched = send(&app, Method::PUT, &entry, Some(json!({ "requireApproval": true }))).await;
    assert_eq!(untouched.status, StatusCode::OK);
    assert_eq!(untouched.body["data"]["requireApproval"], true);
    let fetched = send(&app, Method::GET, &entry, None).await;
    assert_eq!(image_ids(&fetched.body), first);

    let deleted = send(&app, Method::DELETE, &entry, None).await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = send(&app, Method::PUT, &entry, Some(json!({ "images": [] }))).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}
