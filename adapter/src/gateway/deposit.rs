use async_trait::async_trait;
use derive_new::new;

use kernel::gateway::deposit::DepositService;
use kernel::model::id::RentalId;
use shared::error::{AppError, AppResult};

use super::PaymentApiClient;

#[derive(new)]
pub struct DepositServiceImpl {
    api: PaymentApiClient,
}

#[async_trait]
impl DepositService for DepositServiceImpl {
    async fn release(&self, rental_id: RentalId) -> AppResult<()> {
        let url = self.api.url(&format!("/deposits/{}/release", rental_id));
        let res = self
            .api
            .client()
            .post(&url)
            .bearer_auth(self.api.api_key())
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!(
                    "デポジット API の呼び出しに失敗しました: {e}"
                ))
            })?;

        if !res.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "デポジット API がエラーを返しました: {}",
                res.status()
            )));
        }

        Ok(())
    }
}
