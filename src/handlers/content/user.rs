use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{decode, fetch_row, list_rows, new_id, not_found, respond, write_failed};
use crate::api::{FindOneResponse, FindResponse, ListQuery, MutationResponse, Node};
use crate::context::AppContext;
use crate::database::models::user::{User, UserInput, DEFAULT_PREFECTURE};
use crate::error::ApiError;
use crate::i18n::Locale;
use crate::types::{ContentType, Operation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFields {
    pub name: String,
    pub slug: Option<String>,
    pub current_prefecture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn node(user: User) -> Node<UserFields> {
    Node::new(
        user.id,
        UserFields {
            name: user.name,
            slug: user.slug,
            current_prefecture: user.current_prefecture.unwrap_or_else(|| DEFAULT_PREFECTURE.to_string()),
            created_at: user.created_at,
            updated_at: user.updated_at,
        },
    )
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<User>(ctx, ContentType::User, query, scope).await?;
    Ok(respond(FindResponse {
        results: rows.into_iter().map(node).collect(),
        pagination,
    }))
}

pub async fn find_one(ctx: &AppContext, id: &str, locale: Locale) -> Result<Response, ApiError> {
    let user = fetch_row::<User>(ctx, ContentType::User, id, locale).await?;
    Ok(respond(FindOneResponse::new(node(user))))
}

pub async fn create(ctx: &AppContext, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: UserInput = decode(payload)?;
    let user = User::insert(&ctx.pool, &new_id(), &input)
        .await
        .map_err(write_failed(Operation::Create, locale))?;
    tracing::info!(id = %user.id, "Created user");
    Ok(respond(MutationResponse::new(node(user))))
}

pub async fn update(ctx: &AppContext, id: &str, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: UserInput = decode(payload)?;
    let user = User::update(&ctx.pool, id, &input)
        .await
        .map_err(write_failed(Operation::Update, locale))?
        .ok_or_else(|| not_found(ContentType::User, id, locale))?;
    Ok(respond(MutationResponse::new(node(user))))
}
