use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{decode, fetch_row, list_rows, new_id, not_found, respond, write_failed};
use crate::api::{FindOneResponse, FindResponse, ListQuery, MutationResponse, Node};
use crate::context::AppContext;
use crate::database::models::community::{Community, CommunityInput};
use crate::error::ApiError;
use crate::i18n::Locale;
use crate::types::{ContentType, Operation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityFields {
    pub name: String,
    pub point_name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn node(community: Community) -> Node<CommunityFields> {
    Node::new(
        community.id,
        CommunityFields {
            name: community.name,
            point_name: community.point_name,
            bio: community.bio,
            created_at: community.created_at,
            updated_at: community.updated_at,
        },
    )
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<Community>(ctx, ContentType::Community, query, scope).await?;
    Ok(respond(FindResponse {
        results: rows.into_iter().map(node).collect(),
        pagination,
    }))
}

pub async fn find_one(ctx: &AppContext, id: &str, locale: Locale) -> Result<Response, ApiError> {
    let community = fetch_row::<Community>(ctx, ContentType::Community, id, locale).await?;
    Ok(respond(FindOneResponse::new(node(community))))
}

pub async fn create(ctx: &AppContext, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: CommunityInput = decode(payload)?;
    let community = Community::insert(&ctx.pool, &new_id(), &input)
        .await
        .map_err(write_failed(Operation::Create, locale))?;
    tracing::info!(id = %community.id, "Created community");
    Ok(respond(MutationResponse::new(node(community))))
}

pub async fn update(ctx: &AppContext, id: &str, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: CommunityInput = decode(payload)?;
    let community = Community::update(&ctx.pool, id, &input)
        .await
        .map_err(write_failed(Operation::Update, locale))?
        .ok_or_else(|| not_found(ContentType::Community, id, locale))?;
    Ok(respond(MutationResponse::new(node(community))))
}
