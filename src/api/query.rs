use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::filter::filter_where::FilterWhere;
use crate::filter::{FilterData, SortDirection};
use crate::types::ContentType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid pageSize: {0}")]
    InvalidPageSize(String),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Cannot sort by {0}")]
    UnknownSortField(String),
}

/// Raw list parameters as the admin UI sends them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub sort: Option<String>,
    #[serde(rename = "_q")]
    pub q: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: i64,
    pub page_size: i64,
    /// API field name and direction
    pub sort: Option<(String, SortDirection)>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn from_params(params: &ListParams) -> Result<Self, QueryError> {
        let api = &crate::config::config().api;
        Self::parse(params, api.default_page_size, api.max_page_size)
    }

    pub fn parse(params: &ListParams, default_page_size: i64, max_page_size: i64) -> Result<Self, QueryError> {
        let page = match params.page.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| QueryError::InvalidPage(raw.to_string()))?,
            None => 1,
        };

        let page_size = match params.page_size.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| QueryError::InvalidPageSize(raw.to_string()))?,
            None => default_page_size,
        }
        .min(max_page_size);

        // offset() must fit in i64
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(QueryError::InvalidPage(page.to_string()));
        }

        let sort = match params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_sort(raw)?),
            None => None,
        };

        let search = params
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        Ok(Self { page, page_size, sort, search })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// Build the filter for one page of `content_type`. `scope` restricts rows,
    /// e.g. to those related to a source entity.
    pub fn to_filter_data(&self, content_type: ContentType, scope: Option<Value>) -> Result<FilterData, QueryError> {
        let mut clauses = Vec::new();

        let search = self.search.as_deref().and_then(|term| search_clause(content_type, term));
        let has_search = search.is_some();
        if let Some(clause) = search {
            clauses.push(clause);
        }
        if let Some(scope) = scope {
            // City pickers search across all cities
            if !(content_type == ContentType::City && has_search) {
                clauses.push(scope);
            }
        }

        let where_clause = match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(json!({ "$and": clauses })),
        };

        let order = match &self.sort {
            Some((field, direction)) => {
                let column = content_type
                    .sortable_fields()
                    .iter()
                    .find(|(name, _)| name == field)
                    .map(|(_, column)| *column)
                    .ok_or_else(|| QueryError::UnknownSortField(field.clone()))?;
                Some(json!(format!("{} {}", column, direction.to_sql())))
            }
            None => content_type.default_sort().map(|column| json!(format!("{} asc", column))),
        };

        Ok(FilterData {
            select: None,
            where_clause,
            order,
            limit: Some(self.page_size),
            offset: Some(self.offset()),
        })
    }
}

fn parse_sort(raw: &str) -> Result<(String, SortDirection), QueryError> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, direction)) => (field.trim(), direction.trim()),
        None => (raw, "asc"),
    };
    if field.is_empty() {
        return Err(QueryError::InvalidSort(raw.to_string()));
    }
    let direction = if direction.eq_ignore_ascii_case("asc") {
        SortDirection::Asc
    } else if direction.eq_ignore_ascii_case("desc") {
        SortDirection::Desc
    } else {
        return Err(QueryError::InvalidSort(raw.to_string()));
    };
    Ok((field.to_string(), direction))
}

fn search_clause(content_type: ContentType, term: &str) -> Option<Value> {
    let pattern = FilterWhere::contains_pattern(term);
    let mut alternatives: Vec<Value> = content_type
        .search_columns()
        .iter()
        .map(|column| json!({ *column: { "$ilike": pattern } }))
        .collect();

    if content_type == ContentType::City {
        alternatives.push(json!({
            "state_code": { "$related": {
                "table": "states",
                "select": "code",
                "where": { "name": { "$ilike": pattern } }
            }}
        }));
    }

    match alternatives.len() {
        0 => None,
        _ => Some(json!({ "$or": alternatives })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    fn params(page: Option<&str>, page_size: Option<&str>, sort: Option<&str>, q: Option<&str>) -> ListParams {
        ListParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            sort: sort.map(str::to_string),
            q: q.map(str::to_string),
        }
    }

    #[test]
    fn defaults_and_caps() {
        let q = ListQuery::parse(&ListParams::default(), 10, 100).unwrap();
        assert_eq!((q.page, q.page_size, q.offset()), (1, 10, 0));

        let q = ListQuery::parse(&params(Some("3"), Some("500"), None, None), 10, 100).unwrap();
        assert_eq!((q.page, q.page_size, q.offset()), (3, 100, 200));
    }

    #[test]
    fn rejects_page_past_addressable_offset() {
        let huge = i64::MAX.to_string();
        let err = ListQuery::parse(&params(Some(&huge), Some("10"), None, None), 10, 100).unwrap_err();
        assert!(matches!(err, QueryError::InvalidPage(_)));

        // Single-row pages can still reach the last offset
        let q = ListQuery::parse(&params(Some(&huge), Some("1"), None, None), 10, 100).unwrap();
        assert_eq!(q.offset(), i64::MAX - 1);
    }

    #[test]
    fn rejects_bad_numbers_and_sorts() {
        assert_eq!(
            ListQuery::parse(&params(Some("0"), None, None, None), 10, 100),
            Err(QueryError::InvalidPage("0".to_string()))
        );
        assert!(ListQuery::parse(&params(None, Some("ten"), None, None), 10, 100).is_err());
        assert!(ListQuery::parse(&params(None, None, Some("name:sideways"), None), 10, 100).is_err());

        let q = ListQuery::parse(&params(None, None, Some("password:ASC"), None), 10, 100).unwrap();
        assert_eq!(
            q.to_filter_data(ContentType::User, None).unwrap_err(),
            QueryError::UnknownSortField("password".to_string())
        );
    }

    #[test]
    fn builds_search_and_sort() {
        let q = ListQuery::parse(&params(Some("2"), Some("5"), Some("pointName:DESC"), Some("高松")), 10, 100).unwrap();
        let data = q.to_filter_data(ContentType::Community, None).unwrap();
        let mut filter = Filter::new("communities").unwrap();
        filter.assign(data).unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"communities\" WHERE ((\"name\" ILIKE $1) OR (\"point_name\" ILIKE $2)) \
             ORDER BY \"point_name\" DESC LIMIT 5 OFFSET 5"
        );
        assert_eq!(sql.params, vec![json!("%高松%"), json!("%高松%")]);
    }

    #[test]
    fn default_sort_is_created_at_except_cities() {
        let q = ListQuery::parse(&ListParams::default(), 10, 100).unwrap();
        let data = q.to_filter_data(ContentType::Place, None).unwrap();
        assert_eq!(data.order, Some(json!("created_at asc")));
        let data = q.to_filter_data(ContentType::City, None).unwrap();
        assert_eq!(data.order, None);
    }

    #[test]
    fn city_search_overrides_relation_scope() {
        let scope = json!({ "code": "37201" });
        let q = ListQuery::parse(&params(None, None, None, Some("香川")), 10, 100).unwrap();
        let data = q.to_filter_data(ContentType::City, Some(scope.clone())).unwrap();
        let where_clause = data.where_clause.unwrap();
        assert!(where_clause.get("$or").is_some());
        assert!(where_clause.get("$and").is_none());

        // Other types combine both
        let data = q.to_filter_data(ContentType::Place, Some(scope)).unwrap();
        assert!(data.where_clause.unwrap().get("$and").is_some());
    }

    #[test]
    fn unsearchable_types_ignore_term() {
        let q = ListQuery::parse(&params(None, None, None, Some("beach")), 10, 100).unwrap();
        let data = q.to_filter_data(ContentType::Opportunity, None).unwrap();
        assert!(data.where_clause.is_none());
    }
}
