use async_trait::async_trait;
use derive_new::new;
use serde::Deserialize;

use kernel::gateway::payment::PaymentGateway;
use kernel::model::id::RentalId;
use shared::error::{AppError, AppResult};

use super::PaymentApiClient;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargeStatusResponse {
    confirmed: bool,
}

#[derive(new)]
pub struct PaymentGatewayImpl {
    api: PaymentApiClient,
}

#[async_trait]
impl PaymentGateway for PaymentGatewayImpl {
    async fn charge_confirmed(&self, rental_id: RentalId) -> AppResult<bool> {
        let url = self.api.url(&format!("/charges/{}", rental_id));
        let res = self
            .api
            .client()
            .get(&url)
            .bearer_auth(self.api.api_key())
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("決済 API の呼び出しに失敗しました: {e}"))
            })?;

        if !res.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "決済 API がエラーを返しました: {}",
                res.status()
            )));
        }

        let body: ChargeStatusResponse = res.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("決済 API の応答を解釈できませんでした: {e}"))
        })?;

        Ok(body.confirmed)
    }
}
