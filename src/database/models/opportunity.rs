use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor};

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "opportunities";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub category: String,
    pub require_approval: bool,
    pub community_id: Option<String>,
    pub place_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values for insert and update; `None` leaves a column unchanged on update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub require_approval: Option<bool>,
    pub community_id: Option<String>,
    pub place_id: Option<String>,
    pub created_by: Option<String>,
}

impl Opportunity {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &OpportunityChanges,
    ) -> Result<Opportunity, DatabaseError> {
        let (Some(title), Some(category)) = (changes.title.as_deref(), changes.category.as_deref()) else {
            return Err(DatabaseError::QueryError("opportunity title and category are required".to_string()));
        };
        let opportunity = sqlx::query_as::<_, Opportunity>(
            "INSERT INTO opportunities \
             (id, title, description, body, category, require_approval, community_id, place_id, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING *",
        )
        .bind(id)
        .bind(title)
        .bind(&changes.description)
        .bind(&changes.body)
        .bind(category)
        .bind(changes.require_approval.unwrap_or(false))
        .bind(&changes.community_id)
        .bind(&changes.place_id)
        .bind(&changes.created_by)
        .fetch_one(executor)
        .await?;
        Ok(opportunity)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &OpportunityChanges,
    ) -> Result<Option<Opportunity>, DatabaseError> {
        let opportunity = sqlx::query_as::<_, Opportunity>(
            "UPDATE opportunities SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             body = COALESCE($4, body), \
             category = COALESCE($5, category), \
             require_approval = COALESCE($6, require_approval), \
             community_id = COALESCE($7, community_id), \
             place_id = COALESCE($8, place_id), \
             created_by = COALESCE($9, created_by), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.body)
        .bind(&changes.category)
        .bind(changes.require_approval)
        .bind(&changes.community_id)
        .bind(&changes.place_id)
        .bind(&changes.created_by)
        .fetch_optional(executor)
        .await?;
        Ok(opportunity)
    }

    /// Lock the row for the rest of the transaction
    pub async fn lock(conn: &mut PgConnection, id: &str) -> Result<Option<Opportunity>, DatabaseError> {
        let opportunity = sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(opportunity)
    }
}
