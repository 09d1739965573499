use async_trait::async_trait;
use derive_new::new;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use kernel::gateway::payout::{PayoutGateway, PayoutTransfer};
use kernel::model::id::{RentalId, UserId};
use shared::error::{AppError, AppResult};

use super::PaymentApiClient;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferResponse {
    transfer_id: String,
}

#[derive(new)]
pub struct PayoutGatewayImpl {
    api: PaymentApiClient,
}

#[async_trait]
impl PayoutGateway for PayoutGatewayImpl {
    async fn transfer(
        &self,
        rental_id: RentalId,
        owner_id: UserId,
        amount: Decimal,
    ) -> AppResult<PayoutTransfer> {
        let url = self.api.url("/transfers");
        let res = self
            .api
            .client()
            .post(&url)
            .bearer_auth(self.api.api_key())
            .json(&json!({
                "rentalId": rental_id.to_string(),
                "ownerId": owner_id.to_string(),
                "amount": amount,
            }))
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("送金 API の呼び出しに失敗しました: {e}"))
            })?;

        if !res.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "送金 API がエラーを返しました: {}",
                res.status()
            )));
        }

        let body: TransferResponse = res.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("送金 API の応答を解釈できませんでした: {e}"))
        })?;

        Ok(PayoutTransfer {
            transfer_id: body.transfer_id,
        })
    }
}
