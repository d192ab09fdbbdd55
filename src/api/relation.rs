use serde::Deserialize;
use serde_json::Value;

/// Relation payload: `{ connect: [{ id }], disconnect: [{ id }] }`.
/// Entries may carry `id` (string or number) or `documentId`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationInput {
    #[serde(default)]
    pub connect: Vec<RelationRef>,
    #[serde(default)]
    pub disconnect: Vec<RelationRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRef {
    pub id: Option<Value>,
    pub document_id: Option<String>,
}

impl RelationRef {
    pub fn key(&self) -> Option<String> {
        if let Some(document_id) = self.document_id.as_deref().filter(|d| !d.is_empty()) {
            return Some(document_id.to_string());
        }
        match &self.id {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl RelationInput {
    pub fn connect_keys(&self) -> Vec<String> {
        self.connect.iter().filter_map(RelationRef::key).collect()
    }

    pub fn disconnect_keys(&self) -> Vec<String> {
        self.disconnect.iter().filter_map(RelationRef::key).collect()
    }

    /// To-one relations: the first connected key
    pub fn first_connect(&self) -> Option<String> {
        self.connect_keys().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_keys_from_id_or_document_id() {
        let input: RelationInput = serde_json::from_value(json!({
            "connect": [{ "id": "u-1" }, { "id": 7 }, { "documentId": "u-3" }, { "id": "" }],
            "disconnect": [{ "id": "u-9" }]
        }))
        .unwrap();
        assert_eq!(input.connect_keys(), vec!["u-1", "7", "u-3"]);
        assert_eq!(input.disconnect_keys(), vec!["u-9"]);
        assert_eq!(input.first_connect().as_deref(), Some("u-1"));

        let empty: RelationInput = serde_json::from_value(json!({})).unwrap();
        assert!(empty.first_connect().is_none());
    }
}
