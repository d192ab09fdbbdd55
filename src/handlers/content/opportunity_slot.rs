use std::collections::HashMap;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::opportunity::{self, OpportunityFields};
use super::{decode, fetch_row, list_rows, new_id, not_found, respond, write_failed};
use crate::api::{FindOneResponse, FindResponse, ListQuery, MutationResponse, Node, RelationInput};
use crate::context::AppContext;
use crate::database::models::opportunity_slot::{OpportunitySlot, SlotChanges};
use crate::database::models::Opportunity;
use crate::database::Repository;
use crate::error::ApiError;
use crate::i18n::{Locale, Message};
use crate::types::{ContentType, Operation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotFields {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    /// Absent on write responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity: Option<Node<OpportunityFields>>,
    pub opportunity_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInput {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub opportunity: Option<RelationInput>,
}

impl SlotInput {
    fn into_changes(self) -> SlotChanges {
        SlotChanges {
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            capacity: self.capacity,
            opportunity_id: self.opportunity.as_ref().and_then(RelationInput::first_connect),
        }
    }
}

/// A slot must start strictly before it ends
fn check_range(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>, locale: Locale) -> Result<(), ApiError> {
    match (starts_at, ends_at) {
        (Some(start), Some(end)) if start >= end => Err(ApiError::bad_request(Message::SlotRange.text(locale))),
        _ => Ok(()),
    }
}

fn node(slot: OpportunitySlot, opportunity: Option<Opportunity>) -> Node<SlotFields> {
    Node::new(
        slot.id,
        SlotFields {
            starts_at: slot.starts_at,
            ends_at: slot.ends_at,
            capacity: slot.capacity,
            opportunity: opportunity.map(|o| opportunity::node(o, Vec::new())),
            opportunity_id: slot.opportunity_id,
            created_at: slot.created_at,
            updated_at: slot.updated_at,
        },
    )
}

async fn opportunities_for(ctx: &AppContext, slots: &[OpportunitySlot]) -> Result<HashMap<String, Opportunity>, ApiError> {
    let ids: Vec<String> = slots.iter().map(|s| s.opportunity_id.clone()).collect();
    let rows = Repository::<Opportunity>::new(ContentType::Opportunity.table(), ctx.pool.clone())
        .select_in("id", &ids)
        .await?;
    Ok(rows.into_iter().map(|o| (o.id.clone(), o)).collect())
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<OpportunitySlot>(ctx, ContentType::OpportunitySlot, query, scope).await?;
    let mut opportunities = opportunities_for(ctx, &rows).await?;
    let results = rows
        .into_iter()
        .map(|slot| {
            let opportunity = opportunities.remove(&slot.opportunity_id);
            node(slot, opportunity)
        })
        .collect();
    Ok(respond(FindResponse { results, pagination }))
}

pub async fn find_one(ctx: &AppContext, id: &str, locale: Locale) -> Result<Response, ApiError> {
    let slot = fetch_row::<OpportunitySlot>(ctx, ContentType::OpportunitySlot, id, locale).await?;
    let mut opportunities = opportunities_for(ctx, std::slice::from_ref(&slot)).await?;
    let opportunity = opportunities.remove(&slot.opportunity_id);
    Ok(respond(FindOneResponse::new(node(slot, opportunity))))
}

pub async fn create(ctx: &AppContext, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: SlotInput = decode(payload)?;
    check_range(input.starts_at, input.ends_at, locale)?;

    let slot = OpportunitySlot::insert(&ctx.pool, &new_id(), &input.into_changes())
        .await
        .map_err(write_failed(Operation::Create, locale))?;
    tracing::info!(id = %slot.id, opportunity_id = %slot.opportunity_id, "Created slot");
    Ok(respond(MutationResponse::new(node(slot, None))))
}

pub async fn update(ctx: &AppContext, id: &str, payload: Value, locale: Locale) -> Result<Response, ApiError> {
    let input: SlotInput = decode(payload)?;
    let existing = fetch_row::<OpportunitySlot>(ctx, ContentType::OpportunitySlot, id, locale).await?;
    check_range(
        input.starts_at.or(Some(existing.starts_at)),
        input.ends_at.or(Some(existing.ends_at)),
        locale,
    )?;

    let slot = OpportunitySlot::update(&ctx.pool, id, &input.into_changes())
        .await
        .map_err(write_failed(Operation::Update, locale))?
        .ok_or_else(|| not_found(ContentType::OpportunitySlot, id, locale))?;
    Ok(respond(MutationResponse::new(node(slot, None))))
}
