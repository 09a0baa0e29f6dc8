mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Per-provider webhook secrets. A None secret means the endpoint rejects
    /// all deliveries for that provider.
    pub workos_webhook_secret: Option<String>,
    pub clerk_webhook_secret: Option<String>,
}

impl AppState {
    pub fn secret_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "workos" => self.workos_webhook_secret.as_deref(),
            "clerk" => self.clerk_webhook_secret.as_deref(),
            _ => None,
        }
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
