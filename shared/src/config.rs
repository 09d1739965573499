use anyhow::Result;

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            host: std::env::var("DATABASE_HOST")?,
            port: std::env::var("DATABASE_PORT")?.parse()?,
            username: std::env::var("DATABASE_USERNAME")?,
            password: std::env::var("DATABASE_PASSWORD")?,
            database: std::env::var("DATABASE_NAME")?,
        };
        let payment = PaymentConfig {
            base_url: std::env::var("PAYMENT_API_BASE_URL")?,
            api_key: std::env::var("PAYMENT_API_KEY")?,
        };
        let scheduler = SchedulerConfig {
            // 自動完了・送金解放を確認する間隔（秒）
            tick_interval_secs: std::env::var("LIFECYCLE_TICK_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        };
        Ok(Self {
            database,
            payment,
            scheduler,
        })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

pub struct PaymentConfig {
    pub base_url: String,
    pub api_key: String,
}

pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
}
