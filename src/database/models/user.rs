use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "users";
pub const DEFAULT_PREFECTURE: &str = "OUTSIDE_SHIKOKU";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub current_prefecture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub current_prefecture: Option<String>,
}

impl User {
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, id: &str, input: &UserInput) -> Result<User, DatabaseError> {
        let name = input
            .name
            .as_deref()
            .ok_or_else(|| DatabaseError::QueryError("user name is required".to_string()))?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, slug, current_prefecture, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(&input.slug)
        .bind(input.current_prefecture.as_deref().unwrap_or(DEFAULT_PREFECTURE))
        .fetch_one(executor)
        .await?;
        Ok(user)
    }

    /// Applies the fields present in `input`; absent fields keep their value
    pub async fn update<'e, E: PgExecutor<'e>>(executor: E, id: &str, input: &UserInput) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET name = COALESCE($2, name), slug = COALESCE($3, slug), \
             current_prefecture = COALESCE($4, current_prefecture), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.current_prefecture)
        .fetch_optional(executor)
        .await?;
        Ok(user)
    }
}
