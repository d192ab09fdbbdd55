use sqlx::PgPool;

use crate::storage::StorageClient;

/// Shared per-process dependencies, handed to handlers as an `Extension`
#[derive(Clone)]
pub struct AppContext {
    pub pool: PgPool,
    pub storage: StorageClient,
}

impl AppContext {
    pub fn new(pool: PgPool, storage: StorageClient) -> Self {
        Self { pool, storage }
    }
}
