use serde_json::json;
use sqlx::{self, postgres::PgRow, FromRow, PgPool};

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;

/// Read access to one table through the filter layer
pub struct Repository<T> {
    table_name: String,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            table_name: table_name.into(),
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .select_optional(&self.pool)
            .await
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .count(&self.pool)
            .await
    }

    /// Count and fetch one page with the same WHERE, concurrently
    pub async fn select_page(&self, filter_data: FilterData) -> Result<(i64, Vec<T>), DatabaseError> {
        let count_filter = FilterData {
            where_clause: filter_data.where_clause.clone(),
            ..Default::default()
        };
        tokio::try_join!(self.count(count_filter), self.select_any(filter_data))
    }

    /// Find a single row by a key column
    pub async fn select_by(&self, column: &str, value: &str) -> Result<Option<T>, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(json!({ column: value })),
            ..Default::default()
        };
        self.select_one(filter).await
    }

    pub async fn select_in(&self, column: &str, values: &[String]) -> Result<Vec<T>, DatabaseError> {
        if values.is_empty() {
            return Ok(vec![]);
        }
        let filter = FilterData {
            where_clause: Some(json!({ column: { "$in": values } })),
            ..Default::default()
        };
        self.select_any(filter).await
    }
}
