use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, PgExecutor};

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "places";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city_code: Option<String>,
    pub community_id: Option<String>,
    pub is_manual: bool,
    /// `{ lat, lng, address }` as the map picker stores it
    pub map_location: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `{ lat, lng, address }` as the map picker stores it
pub fn map_location(latitude: f64, longitude: f64, address: &str) -> Value {
    json!({ "lat": latitude, "lng": longitude, "address": address })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city_code: Option<String>,
    pub community_id: Option<String>,
    pub is_manual: Option<bool>,
    pub map_location: Option<Value>,
}

impl Place {
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, id: &str, changes: &PlaceChanges) -> Result<Place, DatabaseError> {
        let (Some(name), Some(address), Some(latitude), Some(longitude)) =
            (changes.name.as_deref(), changes.address.as_deref(), changes.latitude, changes.longitude)
        else {
            return Err(DatabaseError::QueryError("place name, address and location are required".to_string()));
        };
        let place = sqlx::query_as::<_, Place>(
            "INSERT INTO places \
             (id, name, address, latitude, longitude, city_code, community_id, is_manual, map_location, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(address)
        .bind(latitude)
        .bind(longitude)
        .bind(&changes.city_code)
        .bind(&changes.community_id)
        .bind(changes.is_manual.unwrap_or(false))
        .bind(&changes.map_location)
        .fetch_one(executor)
        .await?;
        Ok(place)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        changes: &PlaceChanges,
    ) -> Result<Option<Place>, DatabaseError> {
        let place = sqlx::query_as::<_, Place>(
            "UPDATE places SET \
             name = COALESCE($2, name), \
             address = COALESCE($3, address), \
             latitude = COALESCE($4, latitude), \
             longitude = COALESCE($5, longitude), \
             city_code = COALESCE($6, city_code), \
             community_id = COALESCE($7, community_id), \
             is_manual = COALESCE($8, is_manual), \
             map_location = COALESCE($9, map_location), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.address)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(&changes.city_code)
        .bind(&changes.community_id)
        .bind(changes.is_manual)
        .bind(&changes.map_location)
        .fetch_optional(executor)
        .await?;
        Ok(place)
    }

    /// Places created before the map picker existed have no `map_location`
    pub async fn missing_map_location<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Place>, DatabaseError> {
        let places = sqlx::query_as::<_, Place>("SELECT * FROM places WHERE map_location IS NULL ORDER BY created_at")
            .fetch_all(executor)
            .await?;
        Ok(places)
    }

    pub async fn count_all<'e, E: PgExecutor<'e>>(executor: E) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM places").fetch_one(executor).await?;
        Ok(count)
    }

    pub async fn set_map_location<'e, E: PgExecutor<'e>>(
        executor: E,
        id: &str,
        location: &Value,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE places SET map_location = $2, updated_at = NOW() WHERE id = $1 AND map_location IS NULL")
            .bind(id)
            .bind(location)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
