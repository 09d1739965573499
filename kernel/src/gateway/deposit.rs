use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::id::RentalId;

// デポジットの解放。双方確認がそろった完了時に呼ぶ。失敗しても完了は妨げない
#[async_trait]
pub trait DepositService: Send + Sync {
    async fn release(&self, rental_id: RentalId) -> AppResult<()>;
}
