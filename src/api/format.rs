//! Response envelopes the admin UI expects from content-manager routes.

use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub page_count: i64,
    pub total: i64,
}

impl Pagination {
    pub fn new(page: i64, page_size: i64, total: i64) -> Self {
        let page_count = if page_size > 0 { (total + page_size - 1) / page_size } else { 0 };
        Self { page, page_size, page_count, total }
    }
}

/// `find`: `{ results, pagination }`
#[derive(Debug, Serialize)]
pub struct FindResponse<T: Serialize> {
    pub results: Vec<T>,
    pub pagination: Pagination,
}

/// `findOne`: `{ data, meta: { availableLocales, availableStatus } }`
#[derive(Debug, Serialize)]
pub struct FindOneResponse<T: Serialize> {
    pub data: T,
    pub meta: FindOneMeta,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOneMeta {
    pub available_locales: Vec<Value>,
    pub available_status: Vec<Value>,
}

impl<T: Serialize> FindOneResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: FindOneMeta::default() }
    }
}

/// create / update / delete: `{ data, meta: {} }`
#[derive(Debug, Serialize)]
pub struct MutationResponse<T: Serialize> {
    pub data: Option<T>,
    pub meta: Map<String, Value>,
}

impl<T: Serialize> MutationResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data: Some(data), meta: Map::new() }
    }
}

impl MutationResponse<Value> {
    pub fn deleted() -> Self {
        Self { data: None, meta: Map::new() }
    }
}

/// Every node carries its key twice, as `id` and `documentId`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node<T: Serialize> {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub fields: T,
}

impl<T: Serialize> Node<T> {
    pub fn new(id: impl Into<String>, fields: T) -> Self {
        let id = id.into();
        Self { document_id: id.clone(), id, fields }
    }
}

pub fn count_draft_relations() -> Value {
    json!({ "data": 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Fields {
        point_name: &'static str,
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).page_count, 0);
        assert_eq!(Pagination::new(1, 10, 10).page_count, 1);
        assert_eq!(Pagination::new(1, 10, 11).page_count, 2);
        assert_eq!(Pagination::new(1, 0, 11).page_count, 0);
    }

    #[test]
    fn envelopes_match_admin_shapes() {
        let node = Node::new("c-1", Fields { point_name: "pt" });
        let find = serde_json::to_value(FindResponse {
            results: vec![node.clone()],
            pagination: Pagination::new(2, 10, 25),
        })
        .unwrap();
        assert_eq!(
            find,
            json!({
                "results": [{ "id": "c-1", "documentId": "c-1", "pointName": "pt" }],
                "pagination": { "page": 2, "pageSize": 10, "pageCount": 3, "total": 25 }
            })
        );

        let one = serde_json::to_value(FindOneResponse::new(node.clone())).unwrap();
        assert_eq!(one["meta"], json!({ "availableLocales": [], "availableStatus": [] }));

        let created = serde_json::to_value(MutationResponse::new(node)).unwrap();
        assert_eq!(created["meta"], json!({}));
        assert_eq!(created["data"]["documentId"], "c-1");

        let deleted = serde_json::to_value(MutationResponse::deleted()).unwrap();
        assert_eq!(deleted, json!({ "data": null, "meta": {} }));
    }
}
