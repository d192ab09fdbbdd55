use std::collections::HashMap;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Postgres, Transaction};

use super::{decode, fetch_row, list_rows, new_id, not_found, respond, write_failed};
use crate::api::{FindOneResponse, FindResponse, ImageNode, ListQuery, MutationResponse, Node, RelationInput};
use crate::context::AppContext;
use crate::database::images::{self, PgImageLookup};
use crate::database::models::article::{Article, ArticleChanges, ArticleLink};
use crate::database::models::Image;
use crate::error::ApiError;
use crate::i18n::{Locale, Message};
use crate::services::image_reconciler::{reconcile, SubmittedImage};
use crate::types::{ContentType, Operation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleFields {
    pub title: String,
    pub introduction: Option<String>,
    pub body: Option<String>,
    pub category: String,
    pub publish_status: String,
    pub thumbnail: Option<ImageNode>,
    pub community_id: Option<String>,
    #[serde(rename = "publishedAtOnDB")]
    pub published_at_on_db: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleInput {
    pub title: Option<String>,
    pub introduction: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub publish_status: Option<String>,
    #[serde(rename = "publishedAtOnDB")]
    pub published_at_on_db: Option<DateTime<Utc>>,
    pub thumbnail: Option<SubmittedImage>,
    pub community: Option<RelationInput>,
    pub authors: Option<RelationInput>,
    pub related_users: Option<RelationInput>,
    pub opportunities: Option<RelationInput>,
}

impl ArticleInput {
    fn changes(&self) -> ArticleChanges {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        ArticleChanges {
            title: non_empty(&self.title),
            introduction: non_empty(&self.introduction),
            body: non_empty(&self.body),
            category: non_empty(&self.category),
            publish_status: non_empty(&self.publish_status),
            published_at: self.published_at_on_db,
            thumbnail_id: None,
            community_id: self.community.as_ref().and_then(RelationInput::first_connect),
        }
    }

    fn links(&self) -> [(ArticleLink, Option<&RelationInput>); 3] {
        [
            (ArticleLink::Authors, self.authors.as_ref()),
            (ArticleLink::RelatedUsers, self.related_users.as_ref()),
            (ArticleLink::Opportunities, self.opportunities.as_ref()),
        ]
    }
}

pub fn node(article: Article, thumbnail: Option<ImageNode>) -> Node<ArticleFields> {
    Node::new(
        article.id,
        ArticleFields {
            title: article.title,
            introduction: article.introduction,
            body: article.body,
            category: article.category,
            publish_status: article.publish_status,
            thumbnail,
            community_id: article.community_id,
            published_at_on_db: article.published_at,
            created_at: article.created_at,
            updated_at: article.updated_at,
        },
    )
}

async fn thumbnails(ctx: &AppContext, articles: &[Article]) -> Result<HashMap<String, Image>, ApiError> {
    let ids: Vec<String> = articles.iter().filter_map(|a| a.thumbnail_id.clone()).collect();
    let rows = images::find_by_ids(&ctx.pool, &ids).await?;
    Ok(rows.into_iter().map(|image| (image.id.clone(), image)).collect())
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<Article>(ctx, ContentType::Article, query, scope).await?;
    let thumbs = thumbnails(ctx, &rows).await?;
    let results = rows
        .into_iter()
        .map(|article| {
            let thumbnail = article
                .thumbnail_id
                .as_ref()
                .and_then(|id| thumbs.get(id))
                .map(|image| ImageNode::from_image(image, &ctx.storage));
            node(article, thumbnail)
        })
        .collect();
    Ok(respond(FindResponse { results, pagination }))
}

pub async fn find_one(ctx: &AppContext, id: &str, locale: Locale) -> Result<Response, ApiError> {
    let article = fetch_row::<Article>(ctx, ContentType::Article, id, locale).await?;
    let mut thumbs = thumbnails(ctx, std::slice::from_ref(&article)).await?;
    let thumbnail = article
        .thumbnail_id
        .as_ref()
        .and_then(|id| thumbs.remove(id))
        .map(|image| ImageNode::from_image(&image, &ctx.storage));
    Ok(respond(FindOneResponse::new(node(article, thumbnail))))
}

pub async fn create(ctx: &AppContext, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: ArticleInput = decode(payload)?;
    let mut changes = input.changes();

    let failed = write_failed(Operation::Create, locale);
    let mut tx = ctx.pool.begin().await.map_err(|e| failed(e.into()))?;

    let thumbnail = match &input.thumbnail {
        Some(submitted) => resolve_thumbnail(&mut tx, submitted, Operation::Create, locale).await?,
        None => None,
    };
    changes.thumbnail_id = thumbnail.as_ref().map(|image| image.id.clone());

    let article = Article::insert(&mut *tx, &new_id(), &changes).await.map_err(&failed)?;
    for (link, relation) in input.links() {
        if let Some(relation) = relation {
            Article::connect(&mut tx, link, &article.id, &relation.connect_keys())
                .await
                .map_err(&failed)?;
        }
    }
    tx.commit().await.map_err(|e| failed(e.into()))?;

    tracing::info!(id = %article.id, "Created article");
    let thumbnail = thumbnail.map(|image| ImageNode::from_image(&image, &ctx.storage));
    Ok(respond(MutationResponse::new(node(article, thumbnail))))
}

pub async fn update(ctx: &AppContext, id: &str, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: ArticleInput = decode(payload)?;
    let mut changes = input.changes();

    let failed = write_failed(Operation::Update, locale);
    let mut tx = ctx.pool.begin().await.map_err(|e| failed(e.into()))?;

    let thumbnail = match &input.thumbnail {
        Some(submitted) => resolve_thumbnail(&mut tx, submitted, Operation::Update, locale).await?,
        None => None,
    };
    changes.thumbnail_id = thumbnail.as_ref().map(|image| image.id.clone());

    let article = Article::update(&mut *tx, id, &changes)
        .await
        .map_err(&failed)?
        .ok_or_else(|| not_found(ContentType::Article, id, locale))?;
    for (link, relation) in input.links() {
        if let Some(relation) = relation {
            Article::disconnect(&mut tx, link, id, &relation.disconnect_keys())
                .await
                .map_err(&failed)?;
            Article::connect(&mut tx, link, id, &relation.connect_keys())
                .await
                .map_err(&failed)?;
        }
    }
    tx.commit().await.map_err(|e| failed(e.into()))?;

    let thumbnail = match thumbnail {
        Some(image) => Some(image),
        None => thumbnails(ctx, std::slice::from_ref(&article)).await?.into_values().next(),
    };
    let thumbnail = thumbnail.map(|image| ImageNode::from_image(&image, &ctx.storage));
    Ok(respond(MutationResponse::new(node(article, thumbnail))))
}

/// A submitted thumbnail reuses a stored image with the same id or url and
/// otherwise becomes a new image row. An unusable entry leaves it unchanged.
async fn resolve_thumbnail(
    tx: &mut Transaction<'_, Postgres>,
    submitted: &SubmittedImage,
    operation: Operation,
    locale: Locale,
) -> Result<Option<Image>, ApiError> {
    let outcome = reconcile(std::slice::from_ref(submitted), &[], &mut PgImageLookup::new(&mut **tx))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Thumbnail lookup failed");
            ApiError::bad_request(Message::Failed(operation).text(locale))
        })?;
    if !outcome.failures.is_empty() {
        tracing::warn!(skipped = outcome.failures.len(), "Some submitted images were not usable");
    }
    let Some(plan) = outcome.plan else {
        return Ok(None);
    };

    let failed = write_failed(operation, locale);
    if let Some(new_image) = plan.to_create.first() {
        let image = images::insert_image(&mut **tx, new_image).await.map_err(&failed)?;
        return Ok(Some(image));
    }
    let ids: Vec<String> = plan.to_connect.iter().map(|id| id.as_str().to_string()).collect();
    let found = images::find_by_ids(&mut **tx, &ids).await.map_err(&failed)?;
    Ok(found.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_article_payload() {
        let input: ArticleInput = serde_json::from_value(json!({
            "title": "Autumn in Iya",
            "introduction": "",
            "category": "INTERVIEW",
            "publishedAtOnDB": "2024-05-01T00:00:00Z",
            "community": { "connect": [{ "id": "c-1" }] },
            "authors": { "connect": [{ "id": "u-1" }, { "id": "u-2" }], "disconnect": [{ "id": "u-3" }] },
            "thumbnail": { "id": -1, "url": "https://storage.googleapis.com/b/t.jpg", "name": "t.jpg" }
        }))
        .unwrap();

        let changes = input.changes();
        assert_eq!(changes.title.as_deref(), Some("Autumn in Iya"));
        assert_eq!(changes.introduction, None);
        assert_eq!(changes.community_id.as_deref(), Some("c-1"));
        assert!(changes.published_at.is_some());
        assert!(input.thumbnail.is_some());

        let [(authors, Some(relation)), (_, related), (_, opportunities)] = input.links() else {
            panic!("authors relation missing");
        };
        assert_eq!(authors, ArticleLink::Authors);
        assert_eq!(relation.connect_keys(), vec!["u-1", "u-2"]);
        assert_eq!(relation.disconnect_keys(), vec!["u-3"]);
        assert!(related.is_none());
        assert!(opportunities.is_none());
    }
}
