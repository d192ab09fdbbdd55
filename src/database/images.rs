//! Image rows and the opportunity ↔ image link table.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::image::{Image, OpportunityImage};
use crate::services::image_reconciler::{ImageId, ImageLookup, LookupError, NewImage, ReconciliationPlan};

/// Reconciler lookups bound to the connection of the running transaction
pub struct PgImageLookup<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgImageLookup<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'c> ImageLookup for PgImageLookup<'c> {
    async fn existing_ids(&mut self, ids: &[ImageId]) -> Result<HashSet<ImageId>, LookupError> {
        let wanted: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let found: Vec<String> = sqlx::query_scalar("SELECT id FROM images WHERE id = ANY($1)")
            .bind(&wanted)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(LookupError::new)?;
        Ok(found.into_iter().map(ImageId::new).collect())
    }

    async fn find_by_urls(&mut self, urls: &[String]) -> Result<HashMap<String, ImageId>, LookupError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT DISTINCT ON (url) url, id FROM images WHERE url = ANY($1) ORDER BY url, created_at")
                .bind(urls)
                .fetch_all(&mut *self.conn)
                .await
                .map_err(LookupError::new)?;
        Ok(rows.into_iter().map(|(url, id)| (url, ImageId::new(id))).collect())
    }
}

pub async fn insert_image<'e, E: PgExecutor<'e>>(executor: E, image: &NewImage) -> Result<Image, DatabaseError> {
    let row = sqlx::query_as::<_, Image>(
        "INSERT INTO images \
         (id, strapi_id, url, bucket, folder_path, filename, size, width, height, mime, ext, alt, caption, is_public, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(image.strapi_id)
    .bind(&image.url)
    .bind(&image.bucket)
    .bind(&image.folder_path)
    .bind(&image.filename)
    .bind(image.size)
    .bind(image.width)
    .bind(image.height)
    .bind(&image.mime)
    .bind(&image.ext)
    .bind(&image.alt)
    .bind(&image.caption)
    .bind(image.is_public)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

pub async fn find_by_ids<'e, E: PgExecutor<'e>>(executor: E, ids: &[String]) -> Result<Vec<Image>, DatabaseError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let rows = sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Images attached to each of `opportunity_ids`, oldest first
pub async fn for_opportunities<'e, E: PgExecutor<'e>>(
    executor: E,
    opportunity_ids: &[String],
) -> Result<HashMap<String, Vec<Image>>, DatabaseError> {
    if opportunity_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, OpportunityImage>(
        "SELECT oi.opportunity_id, i.* FROM images i \
         JOIN opportunity_images oi ON oi.image_id = i.id \
         WHERE oi.opportunity_id = ANY($1) ORDER BY i.created_at, i.id",
    )
    .bind(opportunity_ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<String, Vec<Image>> = HashMap::new();
    for row in rows {
        grouped.entry(row.opportunity_id).or_default().push(row.image);
    }
    Ok(grouped)
}

pub async fn connect_to_opportunity(
    conn: &mut PgConnection,
    opportunity_id: &str,
    image_ids: &[String],
) -> Result<(), DatabaseError> {
    if image_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO opportunity_images (opportunity_id, image_id) \
         SELECT $1, UNNEST($2::text[]) ON CONFLICT DO NOTHING",
    )
    .bind(opportunity_id)
    .bind(image_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// Apply a reconciliation plan: create new rows, drop the old links, then link
/// everything that should remain. Runs on the caller's transaction.
pub async fn apply_plan(
    conn: &mut PgConnection,
    opportunity_id: &str,
    plan: &ReconciliationPlan,
) -> Result<Vec<Image>, DatabaseError> {
    let mut created = Vec::with_capacity(plan.to_create.len());
    for image in &plan.to_create {
        created.push(insert_image(&mut *conn, image).await?);
    }

    if !plan.to_disconnect.is_empty() {
        let ids: Vec<String> = plan.to_disconnect.iter().map(|id| id.as_str().to_string()).collect();
        sqlx::query("DELETE FROM opportunity_images WHERE opportunity_id = $1 AND image_id = ANY($2)")
            .bind(opportunity_id)
            .bind(&ids)
            .execute(&mut *conn)
            .await?;
    }

    let mut connect: Vec<String> = plan.to_connect.iter().map(|id| id.as_str().to_string()).collect();
    connect.extend(created.iter().map(|image| image.id.clone()));
    connect_to_opportunity(conn, opportunity_id, &connect).await?;

    tracing::debug!(
        opportunity_id,
        created = created.len(),
        disconnected = plan.to_disconnect.len(),
        connected = connect.len(),
        "Applied image plan"
    );
    Ok(created)
}
