use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::error::AppResult;

use crate::model::id::{RentalId, UserId};

#[derive(Debug)]
pub struct PayoutTransfer {
    pub transfer_id: String,
}

#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn transfer(
        &self,
        rental_id: RentalId,
        owner_id: UserId,
        amount: Decimal,
    ) -> AppResult<PayoutTransfer>;
}
