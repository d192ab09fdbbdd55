use std::collections::HashMap;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgConnection, Postgres, Transaction};

use super::{decode, fetch_row, list_rows, new_id, not_found, respond, write_failed};
use crate::api::{FindOneResponse, FindResponse, ImageNode, ListQuery, MutationResponse, Node, RelationInput};
use crate::context::AppContext;
use crate::database::images::{self, PgImageLookup};
use crate::database::models::opportunity::{Opportunity, OpportunityChanges};
use crate::database::models::Image;
use crate::error::ApiError;
use crate::i18n::{Locale, Message};
use crate::services::image_reconciler::{reconcile, ExistingImage, SubmittedImage};
use crate::storage::StorageClient;
use crate::types::{ContentType, Operation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityFields {
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub category: String,
    pub require_approval: bool,
    pub images: Vec<ImageNode>,
    pub community_id: Option<String>,
    pub place_id: Option<String>,
    #[serde(rename = "createdByOnDB")]
    pub created_by_on_db: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `images` arrives either as a plain list or as `{ connect: [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImagesInput {
    List(Vec<SubmittedImage>),
    Relation {
        #[serde(default)]
        connect: Vec<SubmittedImage>,
    },
}

impl ImagesInput {
    pub fn entries(&self) -> &[SubmittedImage] {
        match self {
            ImagesInput::List(list) => list,
            ImagesInput::Relation { connect } => connect,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub require_approval: Option<bool>,
    /// Absent leaves the image relation untouched; present replaces it
    pub images: Option<ImagesInput>,
    pub community: Option<RelationInput>,
    pub place: Option<RelationInput>,
    #[serde(rename = "createdByUserOnDB")]
    pub created_by_user_on_db: Option<RelationInput>,
}

impl OpportunityInput {
    fn changes(&self) -> OpportunityChanges {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        OpportunityChanges {
            title: non_empty(&self.title),
            description: non_empty(&self.description),
            body: non_empty(&self.body),
            category: non_empty(&self.category),
            require_approval: self.require_approval,
            community_id: self.community.as_ref().and_then(RelationInput::first_connect),
            place_id: self.place.as_ref().and_then(RelationInput::first_connect),
            created_by: self.created_by_user_on_db.as_ref().and_then(RelationInput::first_connect),
        }
    }
}

pub fn node(opportunity: Opportunity, images: Vec<ImageNode>) -> Node<OpportunityFields> {
    Node::new(
        opportunity.id,
        OpportunityFields {
            title: opportunity.title,
            description: opportunity.description,
            body: opportunity.body,
            category: opportunity.category,
            require_approval: opportunity.require_approval,
            images,
            community_id: opportunity.community_id,
            place_id: opportunity.place_id,
            created_by_on_db: opportunity.created_by,
            created_at: opportunity.created_at,
            updated_at: opportunity.updated_at,
        },
    )
}

fn image_nodes(images: Option<Vec<Image>>, storage: &StorageClient) -> Vec<ImageNode> {
    images
        .unwrap_or_default()
        .iter()
        .map(|image| ImageNode::from_image(image, storage))
        .collect()
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<Opportunity>(ctx, ContentType::Opportunity, query, scope).await?;
    let ids: Vec<String> = rows.iter().map(|o| o.id.clone()).collect();
    let mut attached: HashMap<String, Vec<Image>> = images::for_opportunities(&ctx.pool, &ids).await?;

    let results = rows
        .into_iter()
        .map(|o| {
            let images = image_nodes(attached.remove(&o.id), &ctx.storage);
            node(o, images)
        })
        .collect();
    Ok(respond(FindResponse { results, pagination }))
}

pub async fn find_one(ctx: &AppContext, id: &str, locale: Locale) -> Result<Response, ApiError> {
    let opportunity = fetch_row::<Opportunity>(ctx, ContentType::Opportunity, id, locale).await?;
    let mut attached = images::for_opportunities(&ctx.pool, &[opportunity.id.clone()]).await?;
    let images = image_nodes(attached.remove(&opportunity.id), &ctx.storage);
    Ok(respond(FindOneResponse::new(node(opportunity, images))))
}

pub async fn create(ctx: &AppContext, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: OpportunityInput = decode(payload)?;
    let changes = input.changes();

    let mut missing = HashMap::new();
    for (field, value) in [
        ("community", &changes.community_id),
        ("place", &changes.place_id),
        ("createdByUserOnDB", &changes.created_by),
    ] {
        if value.is_none() {
            missing.insert(field.to_string(), "required".to_string());
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::validation_error(Message::Failed(Operation::Create).text(locale), Some(missing)));
    }

    let failed = write_failed(Operation::Create, locale);
    let mut tx = ctx.pool.begin().await.map_err(|e| failed(e.into()))?;
    let opportunity = Opportunity::insert(&mut *tx, &new_id(), &changes).await.map_err(&failed)?;
    if let Some(submitted) = &input.images {
        apply_images(&mut tx, &opportunity.id, submitted.entries(), &[], Operation::Create, locale).await?;
    }
    tx.commit().await.map_err(|e| failed(e.into()))?;

    tracing::info!(id = %opportunity.id, "Created opportunity");
    Ok(respond(MutationResponse::new(node(opportunity, Vec::new()))))
}

/// Scalar changes, relation connects and the image reconciliation all commit
/// together. The row lock serializes concurrent updates of one opportunity.
pub async fn update(ctx: &AppContext, id: &str, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: OpportunityInput = decode(payload)?;

    let failed = write_failed(Operation::Update, locale);
    let mut tx = ctx.pool.begin().await.map_err(|e| failed(e.into()))?;
    if Opportunity::lock(&mut tx, id).await.map_err(&failed)?.is_none() {
        return Err(not_found(ContentType::Opportunity, id, locale));
    }

    if let Some(submitted) = &input.images {
        let mut attached = images::for_opportunities(&mut *tx, &[id.to_string()])
            .await
            .map_err(&failed)?;
        let existing: Vec<ExistingImage> = attached
            .remove(id)
            .unwrap_or_default()
            .iter()
            .map(ExistingImage::from)
            .collect();
        apply_images(&mut tx, id, submitted.entries(), &existing, Operation::Update, locale).await?;
    }

    let opportunity = Opportunity::update(&mut *tx, id, &input.changes())
        .await
        .map_err(&failed)?
        .ok_or_else(|| not_found(ContentType::Opportunity, id, locale))?;
    tx.commit().await.map_err(|e| failed(e.into()))?;

    // Images are fetched separately by the admin UI
    Ok(respond(MutationResponse::new(node(opportunity, Vec::new()))))
}

async fn apply_images(
    tx: &mut Transaction<'_, Postgres>,
    opportunity_id: &str,
    submitted: &[SubmittedImage],
    existing: &[ExistingImage],
    operation: Operation,
    locale: Locale,
) -> Result<(), ApiError> {
    let conn: &mut PgConnection = tx;
    let outcome = reconcile(submitted, existing, &mut PgImageLookup::new(&mut *conn))
        .await
        .map_err(|e| {
            tracing::error!(opportunity_id, error = %e, "Image reconciliation failed");
            ApiError::bad_request(Message::Failed(operation).text(locale))
        })?;

    if !outcome.failures.is_empty() {
        tracing::warn!(opportunity_id, skipped = outcome.failures.len(), "Some submitted images were not usable");
    }

    if let Some(plan) = outcome.plan {
        images::apply_plan(conn, opportunity_id, &plan)
            .await
            .map_err(write_failed(operation, locale))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_list_and_connect_image_payloads() {
        let list: OpportunityInput = serde_json::from_value(json!({
            "images": [{ "id": -1, "url": "https://storage.googleapis.com/b/a.jpg" }, { "id": "img-2" }]
        }))
        .unwrap();
        assert_eq!(list.images.unwrap().entries().len(), 2);

        let connect: OpportunityInput = serde_json::from_value(json!({
            "images": { "connect": [{ "id": 5 }] }
        }))
        .unwrap();
        assert_eq!(connect.images.unwrap().entries().len(), 1);

        let absent: OpportunityInput = serde_json::from_value(json!({ "title": "Beach cleanup" })).unwrap();
        assert!(absent.images.is_none());
    }

    #[test]
    fn collects_scalar_and_relation_changes() {
        let input: OpportunityInput = serde_json::from_value(json!({
            "title": "Beach cleanup",
            "description": "",
            "requireApproval": false,
            "community": { "connect": [{ "id": "c-1" }] },
            "place": { "connect": [] },
            "createdByUserOnDB": { "connect": [{ "id": "u-1" }] }
        }))
        .unwrap();
        let changes = input.changes();
        assert_eq!(changes.title.as_deref(), Some("Beach cleanup"));
        assert_eq!(changes.description, None);
        assert_eq!(changes.require_approval, Some(false));
        assert_eq!(changes.community_id.as_deref(), Some("c-1"));
        assert_eq!(changes.place_id, None);
        assert_eq!(changes.created_by.as_deref(), Some("u-1"));
    }
}
