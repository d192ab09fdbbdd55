use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor};

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "articles";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub introduction: Option<String>,
    pub body: Option<String>,
    pub category: String,
    pub publish_status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub thumbnail_id: Option<String>,
    pub community_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub introduction: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub publish_status: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub thumbnail_id: Option<String>,
    pub community_id: Option<String>,
}

/// Many-to-many link tables from articles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleLink {
    Authors,
    RelatedUsers,
    Opportunities,
}

impl ArticleLink {
    fn table(&self) -> &'static str {
        match self {
            ArticleLink::Authors => "article_authors",
            ArticleLink::RelatedUsers => "article_related_users",
            ArticleLink::Opportunities => "article_opportunities",
        }
    }

    fn target_column(&self) -> &'static str {
        match self {
            ArticleLink::Authors | ArticleLink::RelatedUsers => "user_id",
            ArticleLink::Opportunities => "opportunity_id",
        }
    }
}

impl Article {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &ArticleChanges,
    ) -> Result<Article, DatabaseError> {
        let (Some(title), Some(category)) = (changes.title.as_deref(), changes.category.as_deref()) else {
            return Err(DatabaseError::QueryError("article title and category are required".to_string()));
        };
        let article = sqlx::query_as::<_, Article>(
            "INSERT INTO articles \
             (id, title, introduction, body, category, publish_status, published_at, thumbnail_id, community_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING *",
        )
        .bind(id)
        .bind(title)
        .bind(&changes.introduction)
        .bind(&changes.body)
        .bind(category)
        .bind(changes.publish_status.as_deref().unwrap_or("PUBLIC"))
        .bind(changes.published_at)
        .bind(&changes.thumbnail_id)
        .bind(&changes.community_id)
        .fetch_one(executor)
        .await?;
        Ok(article)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &ArticleChanges,
    ) -> Result<Option<Article>, DatabaseError> {
        let article = sqlx::query_as::<_, Article>(
            "UPDATE articles SET \
             title = COALESCE($2, title), \
             introduction = COALESCE($3, introduction), \
             body = COALESCE($4, body), \
             category = COALESCE($5, category), \
             publish_status = COALESCE($6, publish_status), \
             published_at = COALESCE($7, published_at), \
             thumbnail_id = COALESCE($8, thumbnail_id), \
             community_id = COALESCE($9, community_id), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.introduction)
        .bind(&changes.body)
        .bind(&changes.category)
        .bind(&changes.publish_status)
        .bind(changes.published_at)
        .bind(&changes.thumbnail_id)
        .bind(&changes.community_id)
        .fetch_optional(executor)
        .await?;
        Ok(article)
    }

    pub async fn connect(
        conn: &mut PgConnection,
        link: ArticleLink,
        article_id: &str,
        target_ids: &[String],
    ) -> Result<(), DatabaseError> {
        if target_ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "INSERT INTO {} (article_id, {}) SELECT $1, UNNEST($2::text[]) ON CONFLICT DO NOTHING",
            link.table(),
            link.target_column()
        );
        sqlx::query(&sql).bind(article_id).bind(target_ids).execute(conn).await?;
        Ok(())
    }

    pub async fn disconnect(
        conn: &mut PgConnection,
        link: ArticleLink,
        article_id: &str,
        target_ids: &[String],
    ) -> Result<(), DatabaseError> {
        if target_ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {} WHERE article_id = $1 AND {} = ANY($2)",
            link.table(),
            link.target_column()
        );
        sqlx::query(&sql).bind(article_id).bind(target_ids).execute(conn).await?;
        Ok(())
    }
}
