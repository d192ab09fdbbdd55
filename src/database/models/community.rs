use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "communities";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Community {
    pub id: String,
    pub name: String,
    pub point_name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityInput {
    pub name: Option<String>,
    pub point_name: Option<String>,
    pub bio: Option<String>,
}

impl Community {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        input: &CommunityInput,
    ) -> Result<Community, DatabaseError> {
        let (Some(name), Some(point_name)) = (input.name.as_deref(), input.point_name.as_deref()) else {
            return Err(DatabaseError::QueryError("community name and pointName are required".to_string()));
        };
        let community = sqlx::query_as::<_, Community>(
            "INSERT INTO communities (id, name, point_name, bio, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(point_name)
        .bind(&input.bio)
        .fetch_one(executor)
        .await?;
        Ok(community)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        input: &CommunityInput,
    ) -> Result<Option<Community>, DatabaseError> {
        let community = sqlx::query_as::<_, Community>(
            "UPDATE communities SET name = COALESCE($2, name), point_name = COALESCE($3, point_name), \
             bio = COALESCE($4, bio), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.point_name)
        .bind(&input.bio)
        .fetch_optional(executor)
        .await?;
        Ok(community)
    }
}
