use reqwest::Client;
use shared::config::PaymentConfig;

pub mod deposit;
pub mod payment;
pub mod payout;

// 決済プロバイダの REST API を呼ぶための共有クライアント
#[derive(Clone)]
pub struct PaymentApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PaymentApiClient {
    pub fn new(cfg: &PaymentConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }
}
