use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Shared secret for the WorkOS webhook endpoint. None = endpoint rejects
    /// every delivery (never "verification skipped").
    pub workos_webhook_secret: Option<String>,
    /// Shared secret for the Clerk webhook endpoint (svix `whsec_...` form).
    pub clerk_webhook_secret: Option<String>,
    /// How long processed-event ids are kept for duplicate detection.
    pub webhook_retention_days: i64,
    /// Interval between dead-letter sweep runs.
    pub sweep_interval_secs: u64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("ROLLCALL_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "rollcall.db".to_string()),
            workos_webhook_secret: env::var("WORKOS_WEBHOOK_SECRET").ok(),
            clerk_webhook_secret: env::var("CLERK_WEBHOOK_SECRET").ok(),
            webhook_retention_days: env::var("WEBHOOK_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            sweep_interval_secs: env::var("DEAD_LETTER_SWEEP_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 60),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
