//! One-off backfill of `places.map_location` for rows created before the map
//! picker stored it.

use std::fmt;

use serde_json::Value;
use sqlx::PgPool;

use crate::database::models::place::{map_location, Place};
use crate::database::DatabaseError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// All places in the table
    pub total: i64,
    /// Places that had no `map_location`
    pub candidates: usize,
    pub updated: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would update" } else { "updated" };
        write!(f, "{} {} of {}", verb, self.updated, self.total)?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// Location value for a place, or `None` when its coordinates are unusable
pub fn planned_location(place: &Place) -> Option<Value> {
    if !place.latitude.is_finite() || !place.longitude.is_finite() {
        return None;
    }
    Some(map_location(place.latitude, place.longitude, &place.address))
}

pub async fn migrate_locations(pool: &PgPool, dry_run: bool) -> Result<MigrationReport, DatabaseError> {
    let total = Place::count_all(pool).await?;
    let places = Place::missing_map_location(pool).await?;
    let mut report = MigrationReport {
        total,
        candidates: places.len(),
        dry_run,
        ..Default::default()
    };
    tracing::info!(total, candidates = places.len(), dry_run, "Migrating place locations");

    for place in &places {
        let Some(location) = planned_location(place) else {
            tracing::warn!(place_id = %place.id, "Place has no usable coordinates");
            report.failed += 1;
            continue;
        };
        if dry_run {
            tracing::info!(place_id = %place.id, %location, "Would set map location");
            report.updated += 1;
            continue;
        }
        match Place::set_map_location(pool, &place.id, &location).await {
            Ok(true) => report.updated += 1,
            // Filled in by someone else since the scan
            Ok(false) => tracing::debug!(place_id = %place.id, "Map location already set"),
            Err(e) => {
                tracing::error!(place_id = %place.id, error = %e, "Failed to set map location");
                report.failed += 1;
            }
        }
    }

    tracing::info!(%report, "Place location migration finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn place(latitude: f64, longitude: f64) -> Place {
        Place {
            id: "pl-1".to_string(),
            name: "Dogo Onsen".to_string(),
            address: "5-6 Dogoyunomachi, Matsuyama".to_string(),
            latitude,
            longitude,
            city_code: Some("38201".to_string()),
            community_id: None,
            is_manual: false,
            map_location: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn builds_location_from_coordinates() {
        assert_eq!(
            planned_location(&place(33.85, 132.79)),
            Some(json!({ "lat": 33.85, "lng": 132.79, "address": "5-6 Dogoyunomachi, Matsuyama" }))
        );
        assert_eq!(planned_location(&place(f64::NAN, 132.79)), None);
    }

    #[test]
    fn report_reads_updated_of_total() {
        let report = MigrationReport { total: 12, candidates: 4, updated: 3, failed: 1, dry_run: false };
        assert_eq!(report.to_string(), "updated 3 of 12 (1 failed)");

        let report = MigrationReport { total: 5, candidates: 2, updated: 2, failed: 0, dry_run: true };
        assert_eq!(report.to_string(), "would update 2 of 5");
    }
}
