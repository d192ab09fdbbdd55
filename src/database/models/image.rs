use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::image_reconciler::{ExistingImage, ImageId};

pub const TABLE: &str = "images";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Image {
    pub id: String,
    pub strapi_id: Option<i32>,
    pub url: String,
    pub bucket: Option<String>,
    pub folder_path: Option<String>,
    pub filename: String,
    pub size: f64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub mime: String,
    pub ext: String,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Image> for ExistingImage {
    fn from(image: &Image) -> Self {
        ExistingImage {
            id: ImageId::new(image.id.clone()),
            url: image.url.clone(),
        }
    }
}

/// An image joined to the opportunity it is attached to
#[derive(Debug, Clone, FromRow)]
pub struct OpportunityImage {
    pub opportunity_id: String,
    #[sqlx(flatten)]
    pub image: Image,
}
