use std::collections::HashMap;

use axum::response::Response;
use serde::Serialize;
use serde_json::Value;

use super::{fetch_row, list_rows, respond};
use crate::api::{FindOneResponse, FindResponse, ListQuery, Node};
use crate::context::AppContext;
use crate::database::models::{City, State};
use crate::database::Repository;
use crate::error::ApiError;
use crate::i18n::Locale;
use crate::types::ContentType;

#[derive(Debug, Serialize)]
pub struct CityFields {
    pub name: String,
}

fn node(city: &City, states: &HashMap<String, State>) -> Node<CityFields> {
    Node::new(
        city.code.clone(),
        CityFields { name: city.full_name(states.get(&city.state_code)) },
    )
}

async fn states_for(ctx: &AppContext, cities: &[City]) -> Result<HashMap<String, State>, ApiError> {
    let mut codes: Vec<String> = cities.iter().map(|c| c.state_code.clone()).collect();
    codes.sort();
    codes.dedup();
    let states = Repository::<State>::new("states", ctx.pool.clone())
        .select_in("code", &codes)
        .await?;
    Ok(states.into_iter().map(|s| (s.code.clone(), s)).collect())
}

pub async fn find(ctx: &AppContext, query: &ListQuery, scope: Option<Value>) -> Result<Response, ApiError> {
    let (rows, pagination) = list_rows::<City>(ctx, ContentType::City, query, scope).await?;
    let states = states_for(ctx, &rows).await?;
    Ok(respond(FindResponse {
        results: rows.iter().map(|city| node(city, &states)).collect(),
        pagination,
    }))
}

pub async fn find_one(ctx: &AppContext, code: &str, locale: Locale) -> Result<Response, ApiError> {
    let city = fetch_row::<City>(ctx, ContentType::City, code, locale).await?;
    let states = states_for(ctx, std::slice::from_ref(&city)).await?;
    Ok(respond(FindOneResponse::new(node(&city, &states))))
}
