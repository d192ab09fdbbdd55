use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, fetch_row, list_rows, new_id, not_found, respond, write_failed};
use crate::api::{FindOneResponse, FindResponse, ListQuery, MutationResponse, Node, RelationInput};
use crate::context::AppContext;
use crate::database::models::place::{map_location, Place, PlaceChanges};
use crate::error::ApiError;
use crate::i18n::Locale;
use crate::types::{ContentType, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceFields {
    pub name: String,
    pub display_name: String,
    pub address: String,
    pub location: Location,
    pub city_code: Option<String>,
    pub community_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationInput {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub location: Option<LocationInput>,
    pub city: Option<RelationInput>,
    pub community: Option<RelationInput>,
    pub is_manual: Option<bool>,
}

impl PlaceInput {
    fn into_changes(self) -> PlaceChanges {
        let (latitude, longitude) = match &self.location {
            Some(location) => (location.lat, location.lng),
            None => (None, None),
        };
        PlaceChanges {
            latitude,
            longitude,
            city_code: self.city.as_ref().and_then(RelationInput::first_connect),
            community_id: self.community.as_ref().and_then(RelationInput::first_connect),
            is_manual: self.is_manual,
            name: self.name.filter(|n| !n.is_empty()),
            address: self.address.filter(|a| !a.is_empty()),
            map_location: None,
        }
    }
}

pub fn node(place: Place) -> Node<PlaceFields> {
    Node::new(
        place.id,
        PlaceFields {
            display_name: place.name.clone(),
            name: place.name,
            address: place.address,
            location: Location { lat: place.latitude, lng: place.longitude },
            city_code: place.city_code,
            community_id: place.community_id,
            created_at: place.created_at,
            updated_at: place.updated_at,
        },
    )
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<Place>(ctx, ContentType::Place, query, scope).await?;
    Ok(respond(FindResponse {
        results: rows.into_iter().map(node).collect(),
        pagination,
    }))
}

pub async fn find_one(ctx: &AppContext, id: &str, locale: Locale) -> Result<Response, ApiError> {
    let place = fetch_row::<Place>(ctx, ContentType::Place, id, locale).await?;
    Ok(respond(FindOneResponse::new(node(place))))
}

pub async fn create(ctx: &AppContext, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: PlaceInput = decode(payload)?;
    let mut changes = input.into_changes();
    changes.is_manual = Some(changes.is_manual.unwrap_or(false));
    if let (Some(lat), Some(lng), Some(address)) = (changes.latitude, changes.longitude, changes.address.as_deref()) {
        changes.map_location = Some(map_location(lat, lng, address));
    }

    let place = Place::insert(&ctx.pool, &new_id(), &changes)
        .await
        .map_err(write_failed(Operation::Create, locale))?;
    tracing::info!(id = %place.id, "Created place");
    Ok(respond(MutationResponse::new(node(place))))
}

pub async fn update(ctx: &AppContext, id: &str, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: PlaceInput = decode(payload)?;
    let place = Place::update(&ctx.pool, id, &input.into_changes())
        .await
        .map_err(write_failed(Operation::Update, locale))?
        .ok_or_else(|| not_found(ContentType::Place, id, locale))?;
    Ok(respond(MutationResponse::new(node(place))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_latitude_and_longitude_in_place() {
        let input: PlaceInput = serde_json::from_value(json!({
            "name": "Ritsurin Garden",
            "address": "1-20-16 Ritsurin-cho, Takamatsu",
            "location": { "lat": 34.33, "lng": 134.04 },
            "city": { "connect": [{ "id": "37201" }] },
            "community": { "connect": [{ "id": "c-1" }] }
        }))
        .unwrap();
        let changes = input.into_changes();
        assert_eq!(changes.latitude, Some(34.33));
        assert_eq!(changes.longitude, Some(134.04));
        assert_eq!(changes.city_code.as_deref(), Some("37201"));
        assert_eq!(changes.community_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn partial_update_leaves_absent_fields() {
        let input: PlaceInput = serde_json::from_value(json!({ "name": "", "address": "new" })).unwrap();
        let changes = input.into_changes();
        assert_eq!(changes.name, None);
        assert_eq!(changes.address.as_deref(), Some("new"));
        assert_eq!(changes.latitude, None);
        assert_eq!(changes.city_code, None);
    }
}
