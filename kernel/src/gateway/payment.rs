use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::id::RentalId;

// 決済プロバイダへの照会。approved -> active の遷移は決済確認が前提になる
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge_confirmed(&self, rental_id: RentalId) -> AppResult<bool>;
}
