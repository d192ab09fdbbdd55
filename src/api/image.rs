use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::Image;
use crate::storage::StorageClient;

/// Image as the admin media field renders it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageNode {
    pub id: String,
    pub name: String,
    pub size: f64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub mime: String,
    pub ext: String,
    pub alternative_text: Option<String>,
    pub caption: Option<String>,
    pub url: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl ImageNode {
    /// Private images get a short-lived signed URL instead of the stored one
    pub fn from_image(image: &Image, storage: &StorageClient) -> Self {
        let url = if image.is_public {
            image.url.clone()
        } else {
            storage.signed_url(&image.filename, image.folder_path.as_deref(), image.bucket.as_deref())
        };
        Self {
            id: image.id.clone(),
            name: image.filename.clone(),
            size: image.size,
            width: image.width,
            height: image.height,
            mime: image.mime.clone(),
            ext: image.ext.clone(),
            alternative_text: image.alt.clone(),
            caption: image.caption.clone(),
            url,
            provider: storage.provider_name().to_string(),
            created_at: image.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HmacCredentials, StorageConfig};

    fn image(is_public: bool) -> Image {
        Image {
            id: "img-1".to_string(),
            strapi_id: Some(12),
            url: "https://storage.googleapis.com/media/opp/a.jpg".to_string(),
            bucket: Some("media".to_string()),
            folder_path: Some("opp".to_string()),
            filename: "a.jpg".to_string(),
            size: 120.5,
            width: Some(640),
            height: Some(480),
            mime: "image/jpeg".to_string(),
            ext: ".jpg".to_string(),
            alt: None,
            caption: Some("Coast".to_string()),
            is_public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn storage() -> StorageClient {
        StorageClient::new(StorageConfig {
            project_id: None,
            bucket_name: "media".to_string(),
            base_path: None,
            public_host: "storage.googleapis.com".to_string(),
            provider_name: "gcs-provider".to_string(),
            signed_url_ttl_secs: 900,
            hmac: Some(HmacCredentials { access_id: "GOOG1".to_string(), secret: "s".to_string() }),
        })
    }

    #[test]
    fn public_images_keep_stored_url() {
        let node = serde_json::to_value(ImageNode::from_image(&image(true), &storage())).unwrap();
        assert_eq!(node["id"], "img-1");
        assert_eq!(node["name"], "a.jpg");
        assert_eq!(node["url"], "https://storage.googleapis.com/media/opp/a.jpg");
        assert_eq!(node["provider"], "gcs-provider");
        assert_eq!(node["alternativeText"], serde_json::Value::Null);
        assert_eq!(node["caption"], "Coast");
    }

    #[test]
    fn private_images_are_signed() {
        let node = ImageNode::from_image(&image(false), &storage());
        assert!(node.url.starts_with("https://storage.googleapis.com/media/opp/a.jpg?X-Goog-Algorithm="));
        assert!(node.url.contains("X-Goog-Signature="));
    }
}
