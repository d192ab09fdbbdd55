pub mod images;
pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::Repository;

use sqlx::PgExecutor;

/// Delete one row by key column. `table` and `key_column` come from static
/// content-type metadata, never from the request.
pub async fn delete_row<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &str,
    key_column: &str,
    key: &str,
) -> Result<bool, DatabaseError> {
    let sql = format!("DELETE FROM \"{}\" WHERE \"{}\" = $1", table, key_column);
    let result = sqlx::query(&sql).bind(key).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
