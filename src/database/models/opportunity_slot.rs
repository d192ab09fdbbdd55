use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "opportunity_slots";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpportunitySlot {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub opportunity_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotChanges {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub opportunity_id: Option<String>,
}

impl OpportunitySlot {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &SlotChanges,
    ) -> Result<OpportunitySlot, DatabaseError> {
        let (Some(starts_at), Some(ends_at), Some(opportunity_id)) =
            (changes.starts_at, changes.ends_at, changes.opportunity_id.as_deref())
        else {
            return Err(DatabaseError::QueryError("slot startsAt, endsAt and opportunity are required".to_string()));
        };
        let slot = sqlx::query_as::<_, OpportunitySlot>(
            "INSERT INTO opportunity_slots (id, starts_at, ends_at, capacity, opportunity_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING *",
        )
        .bind(id)
        .bind(starts_at)
        .bind(ends_at)
        .bind(changes.capacity)
        .bind(opportunity_id)
        .fetch_one(executor)
        .await?;
        Ok(slot)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &SlotChanges,
    ) -> Result<Option<OpportunitySlot>, DatabaseError> {
        let slot = sqlx::query_as::<_, OpportunitySlot>(
            "UPDATE opportunity_slots SET starts_at = COALESCE($2, starts_at), ends_at = COALESCE($3, ends_at), \
             capacity = COALESCE($4, capacity), opportunity_id = COALESCE($5, opportunity_id), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.starts_at)
        .bind(changes.ends_at)
        .bind(changes.capacity)
        .bind(&changes.opportunity_id)
        .fetch_optional(executor)
        .await?;
        Ok(slot)
    }
}
