use serde_json::{Map, Value};

use super::error::FilterError;
use super::is_valid_identifier;
use super::types::{FilterOp, FilterWhereInfo};

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            conditions: vec![],
        }
    }

    /// Render `where_data` to a SQL predicate. Placeholders are numbered from
    /// `starting_param_index + 1`. An empty predicate means "no WHERE".
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Case-insensitive substring pattern for `$ilike`, with LIKE wildcards escaped
    pub fn contains_pattern(term: &str) -> String {
        let mut escaped = String::with_capacity(term.len() + 2);
        escaped.push('%');
        for c in term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped.push('%');
        escaped
    }

    fn build(&mut self, where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        self.parse_where_data(where_data)?;

        let mut sql_conditions = vec![];
        let conditions_snapshot = std::mem::take(&mut self.conditions);
        for condition in &conditions_snapshot {
            if let Some(sql) = self.build_sql_condition(condition)? {
                sql_conditions.push(sql);
            }
        }
        Ok((sql_conditions.join(" AND "), std::mem::take(&mut self.param_values)))
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    let sql = self.subclause(v)?;
                    if !sql.is_empty() {
                        sql_parts.push(format!("({})", sql));
                    }
                }
                if sql_parts.is_empty() {
                    return Ok(());
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                let combined = format!("({})", sql_parts.join(joiner));
                self.conditions.push(FilterWhereInfo { column: combined, operator: FilterOp::Text, data: Value::Null });
                Ok(())
            }
            "$not" => {
                let sql = self.subclause(value)?;
                if !sql.is_empty() {
                    self.conditions.push(FilterWhereInfo { column: format!("NOT ({})", sql), operator: FilterOp::Text, data: Value::Null });
                }
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    /// Render a nested clause, continuing this clause's placeholder numbering
    fn subclause(&mut self, value: &Value) -> Result<String, FilterError> {
        let (sql, params) = Self::generate(value, self.param_index)?;
        self.param_index += params.len();
        self.param_values.extend(params);
        Ok(sql)
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                self.conditions.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() });
            }
        } else {
            // Implicit equality: { field: value }
            self.conditions.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() });
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$related" => FilterOp::Related,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<Option<String>, FilterError> {
        // Pseudo conditions where column already contains SQL (logical operators)
        if matches!(condition.operator, FilterOp::Text) {
            return Ok(Some(condition.column.clone()));
        }

        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() { Ok(Some(format!("{} IS NULL", quoted_column))) }
                else { Ok(Some(format!("{} = {}", quoted_column, self.param(condition.data.clone())))) }
            }
            FilterOp::Ne => {
                if condition.data.is_null() { Ok(Some(format!("{} IS NOT NULL", quoted_column))) }
                else { Ok(Some(format!("{} <> {}", quoted_column, self.param(condition.data.clone())))) }
            }
            FilterOp::Gt => Ok(Some(format!("{} > {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Gte => Ok(Some(format!("{} >= {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Lt => Ok(Some(format!("{} < {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Lte => Ok(Some(format!("{} <= {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Like => Ok(Some(format!("{} LIKE {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::ILike => Ok(Some(format!("{} ILIKE {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() { return Ok(Some("1=0".to_string())); }
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(Some(format!("{} IN ({})", quoted_column, params.join(", "))))
                } else {
                    Ok(Some(format!("{} = {}", quoted_column, self.param(condition.data.clone()))))
                }
            }
            FilterOp::Related => {
                let spec = condition
                    .data
                    .as_object()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$related requires an object".to_string()))?;
                let subquery = self.related_subquery(spec)?;
                Ok(Some(format!("{} IN ({})", quoted_column, subquery)))
            }
            _ => Ok(None),
        }
    }

    /// `{ "table": t, "select": c, "where": {...} }` → `SELECT "c" FROM "t" WHERE ...`
    fn related_subquery(&mut self, spec: &Map<String, Value>) -> Result<String, FilterError> {
        let table = spec
            .get("table")
            .and_then(Value::as_str)
            .ok_or_else(|| FilterError::InvalidOperatorData("$related requires \"table\"".to_string()))?;
        let select = spec
            .get("select")
            .and_then(Value::as_str)
            .ok_or_else(|| FilterError::InvalidOperatorData("$related requires \"select\"".to_string()))?;
        if !is_valid_identifier(table) {
            return Err(FilterError::InvalidTableName(table.to_string()));
        }
        if !is_valid_identifier(select) {
            return Err(FilterError::InvalidColumn(select.to_string()));
        }

        let inner = match spec.get("where") {
            Some(w) => self.subclause(w)?,
            None => String::new(),
        };
        if inner.is_empty() {
            Ok(format!("SELECT \"{}\" FROM \"{}\"", select, table))
        } else {
            Ok(format!("SELECT \"{}\" FROM \"{}\" WHERE {}", select, table, inner))
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_null() {
        let (sql, params) = FilterWhere::generate(&json!({ "id": "abc", "place_id": null }), 0).unwrap();
        assert_eq!(sql, "\"id\" = $1 AND \"place_id\" IS NULL");
        assert_eq!(params, vec![json!("abc")]);
    }

    #[test]
    fn or_clauses_continue_numbering() {
        let where_data = json!({
            "$or": [
                { "title": { "$ilike": "%a%" } },
                { "body": { "$ilike": "%a%" } }
            ],
            "category": "EVENT"
        });
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(sql, "((\"title\" ILIKE $1) OR (\"body\" ILIKE $2)) AND \"category\" = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn related_renders_subquery() {
        let where_data = json!({
            "id": { "$related": {
                "table": "article_opportunities",
                "select": "opportunity_id",
                "where": { "article_id": "art-1" }
            }}
        });
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(
            sql,
            "\"id\" IN (SELECT \"opportunity_id\" FROM \"article_opportunities\" WHERE \"article_id\" = $1)"
        );
        assert_eq!(params, vec![json!("art-1")]);
    }

    #[test]
    fn rejects_injection_in_identifiers() {
        assert!(FilterWhere::generate(&json!({ "id; DROP TABLE x": 1 }), 0).is_err());
        let bad = json!({ "id": { "$related": { "table": "x\" y", "select": "id" } } });
        assert!(FilterWhere::generate(&bad, 0).is_err());
    }

    #[test]
    fn comparison_operators_number_in_order() {
        let where_data = json!({
            "capacity": { "$gte": 1, "$lt": 10 },
            "start_at": { "$gt": "2024-01-01", "$lte": "2024-12-31" },
            "title": { "$like": "Beach%" }
        });
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(
            sql,
            "\"capacity\" >= $1 AND \"capacity\" < $2 AND \"start_at\" > $3 AND \"start_at\" <= $4 AND \"title\" LIKE $5"
        );
        assert_eq!(params, vec![json!(1), json!(10), json!("2024-01-01"), json!("2024-12-31"), json!("Beach%")]);
    }

    #[test]
    fn not_equal_handles_null() {
        let where_data = json!({ "id": { "$ne": "opp-1" }, "place_id": { "$neq": null } });
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(sql, "\"id\" <> $1 AND \"place_id\" IS NOT NULL");
        assert_eq!(params, vec![json!("opp-1")]);
    }

    #[test]
    fn not_wraps_nested_clause() {
        let where_data = json!({ "$not": { "category": "EVENT" }, "id": "opp-1" });
        let (sql, params) = FilterWhere::generate(&where_data, 2).unwrap();
        assert_eq!(sql, "NOT (\"category\" = $3) AND \"id\" = $4");
        assert_eq!(params, vec![json!("EVENT"), json!("opp-1")]);

        let (sql, _) = FilterWhere::generate(&json!({ "$not": {} }), 0).unwrap();
        assert!(sql.is_empty());
        assert!(FilterWhere::generate(&json!({ "id": { "$regex": "x" } }), 0).is_err());
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({ "id": { "$in": [] } }), 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(FilterWhere::contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(FilterWhere::contains_pattern("高松"), "%高松%");
    }
}
