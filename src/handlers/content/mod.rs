//! `/content-manager` routes. Requests are dispatched on the CMS uid to one
//! controller module per content type; all of them answer in the envelopes the
//! admin UI expects.

pub mod article;
pub mod city;
pub mod community;
pub mod opportunity;
pub mod opportunity_slot;
pub mod place;
pub mod user;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use sqlx::{postgres::PgRow, FromRow};

use crate::api::{format, ListParams, ListQuery, Pagination};
use crate::context::AppContext;
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::i18n::{Locale, Message};
use crate::types::{ContentType, Operation, RelationField};

/// GET /content-manager/collection-types/:uid
pub async fn find(
    Extension(ctx): Extension<AppContext>,
    Path(uid): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let content_type = resolve(&uid)?;
    let query = ListQuery::from_params(&params)?;
    find_as(&ctx, content_type, &query, None).await
}

/// GET /content-manager/collection-types/:uid/:id
pub async fn find_one(
    Extension(ctx): Extension<AppContext>,
    Path((uid, id)): Path<(String, String)>,
    locale: Locale,
) -> Result<Response, ApiError> {
    match resolve(&uid)? {
        ContentType::Article => article::find_one(&ctx, &id, locale).await,
        ContentType::Community => community::find_one(&ctx, &id, locale).await,
        ContentType::Opportunity => opportunity::find_one(&ctx, &id, locale).await,
        ContentType::OpportunitySlot => opportunity_slot::find_one(&ctx, &id, locale).await,
        ContentType::Place => place::find_one(&ctx, &id, locale).await,
        ContentType::City => city::find_one(&ctx, &id, locale).await,
        ContentType::User => user::find_one(&ctx, &id, locale).await,
    }
}

/// POST /content-manager/collection-types/:uid
pub async fn create(
    Extension(ctx): Extension<AppContext>,
    Path(uid): Path<String>,
    locale: Locale,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = resolve(&uid)?;
    if content_type.is_read_only() {
        return Err(ApiError::forbidden(Message::CityReadOnly(Operation::Create).text(locale)));
    }
    let payload = parse_body(&body, locale)?;
    match content_type {
        ContentType::Article => article::create(&ctx, payload, locale).await,
        ContentType::Community => community::create(&ctx, payload, locale).await,
        ContentType::Opportunity => opportunity::create(&ctx, payload, locale).await,
        ContentType::OpportunitySlot => opportunity_slot::create(&ctx, payload, locale).await,
        ContentType::Place => place::create(&ctx, payload, locale).await,
        ContentType::User => user::create(&ctx, payload, locale).await,
        ContentType::City => Err(ApiError::forbidden(Message::CityReadOnly(Operation::Create).text(locale))),
    }
}

/// PUT /content-manager/collection-types/:uid/:id
pub async fn update(
    Extension(ctx): Extension<AppContext>,
    Path((uid, id)): Path<(String, String)>,
    locale: Locale,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = resolve(&uid)?;
    if content_type.is_read_only() {
        return Err(ApiError::forbidden(Message::CityReadOnly(Operation::Update).text(locale)));
    }
    let payload = parse_body(&body, locale)?;
    match content_type {
        ContentType::Article => article::update(&ctx, &id, payload, locale).await,
        ContentType::Community => community::update(&ctx, &id, payload, locale).await,
        ContentType::Opportunity => opportunity::update(&ctx, &id, payload, locale).await,
        ContentType::OpportunitySlot => opportunity_slot::update(&ctx, &id, payload, locale).await,
        ContentType::Place => place::update(&ctx, &id, payload, locale).await,
        ContentType::User => user::update(&ctx, &id, payload, locale).await,
        ContentType::City => Err(ApiError::forbidden(Message::CityReadOnly(Operation::Update).text(locale))),
    }
}

/// DELETE /content-manager/collection-types/:uid/:id
pub async fn delete(
    Extension(ctx): Extension<AppContext>,
    Path((uid, id)): Path<(String, String)>,
    locale: Locale,
) -> Result<Response, ApiError> {
    let content_type = resolve(&uid)?;
    if content_type.is_read_only() {
        return Err(ApiError::forbidden(Message::CityReadOnly(Operation::Delete).text(locale)));
    }

    let deleted = crate::database::delete_row(&ctx.pool, content_type.table(), content_type.key_column(), &id)
        .await
        .map_err(write_failed(Operation::Delete, locale))?;
    if !deleted {
        return Err(not_found(content_type, &id, locale));
    }

    tracing::info!(uid = content_type.uid(), id = %id, "Deleted entry");
    Ok(respond(format::MutationResponse::deleted()))
}

/// GET /content-manager/collection-types/:uid/:id/actions/countDraftRelations
pub async fn count_draft_relations(Path((uid, _id)): Path<(String, String)>) -> Result<Response, ApiError> {
    resolve(&uid)?;
    Ok(respond(format::count_draft_relations()))
}

/// GET /content-manager/relations/:uid/:field
pub async fn relation_options(
    Extension(ctx): Extension<AppContext>,
    Path((uid, field)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let relation = resolve_relation(&uid, &field)?;
    let query = ListQuery::from_params(&params)?;
    find_as(&ctx, relation.target, &query, None).await
}

/// GET /content-manager/relations/:uid/:id/:field
pub async fn related(
    Extension(ctx): Extension<AppContext>,
    Path((uid, id, field)): Path<(String, String, String)>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let relation = resolve_relation(&uid, &field)?;
    let query = ListQuery::from_params(&params)?;
    find_as(&ctx, relation.target, &query, Some(relation_scope(&relation, &id))).await
}

async fn find_as(
    ctx: &AppContext,
    content_type: ContentType,
    query: &ListQuery,
    scope: Option<Value>,
) -> Result<Response, ApiError> {
    match content_type {
        ContentType::Article => article::find(ctx, query, scope).await,
        ContentType::Community => community::find(ctx, query, scope).await,
        ContentType::Opportunity => opportunity::find(ctx, query, scope).await,
        ContentType::OpportunitySlot => opportunity_slot::find(ctx, query, scope).await,
        ContentType::Place => place::find(ctx, query, scope).await,
        ContentType::City => city::find(ctx, query, scope).await,
        ContentType::User => user::find(ctx, query, scope).await,
    }
}

fn resolve(uid: &str) -> Result<ContentType, ApiError> {
    ContentType::from_uid(uid).ok_or_else(|| ApiError::not_found(format!("Unknown content type: {}", uid)))
}

fn resolve_relation(uid: &str, field: &str) -> Result<RelationField, ApiError> {
    resolve(uid)?
        .relation(field)
        .ok_or_else(|| ApiError::not_found(format!("Unknown relation: {}.{}", uid, field)))
}

/// Restrict the target list to rows linked from `source_id`
pub(crate) fn relation_scope(relation: &RelationField, source_id: &str) -> Value {
    json!({
        relation.target.key_column(): { "$related": {
            "table": relation.via_table,
            "select": relation.via_select,
            "where": { relation.via_source: source_id }
        }}
    })
}

/// One page of rows plus its pagination block
pub(crate) async fn list_rows<T>(
    ctx: &AppContext,
    content_type: ContentType,
    query: &ListQuery,
    scope: Option<Value>,
) -> Result<(Vec<T>, Pagination), ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let filter = query.to_filter_data(content_type, scope)?;
    let repo = Repository::<T>::new(content_type.table(), ctx.pool.clone());
    let (total, rows) = repo.select_page(filter).await?;
    Ok((rows, Pagination::new(query.page, query.page_size, total)))
}

pub(crate) async fn fetch_row<T>(ctx: &AppContext, content_type: ContentType, id: &str, locale: Locale) -> Result<T, ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    Repository::<T>::new(content_type.table(), ctx.pool.clone())
        .select_by(content_type.key_column(), id)
        .await?
        .ok_or_else(|| not_found(content_type, id, locale))
}

pub(crate) fn respond<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

/// Body of a create/update request. An absent, `null` or `{}` body is "no data".
fn parse_body(body: &Bytes, locale: Locale) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request(Message::NoData.text(locale)));
    }
    let value: Value = serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;
    match &value {
        Value::Null => Err(ApiError::bad_request(Message::NoData.text(locale))),
        Value::Object(map) if map.is_empty() => Err(ApiError::bad_request(Message::NoData.text(locale))),
        Value::Object(_) => Ok(value),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::bad_request(format!("Invalid data: {}", e)))
}

pub(crate) fn not_found(content_type: ContentType, id: &str, locale: Locale) -> ApiError {
    ApiError::not_found(Message::NotFound(content_type, id.to_string()).text(locale))
}

/// Store failures on writes are reported generically; the cause is only logged
pub(crate) fn write_failed(operation: Operation, locale: Locale) -> impl Fn(DatabaseError) -> ApiError {
    move |err| {
        tracing::error!(?operation, error = %err, "Content write failed");
        ApiError::bad_request(Message::Failed(operation).text(locale))
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
