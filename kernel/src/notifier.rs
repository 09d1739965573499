use async_trait::async_trait;
use serde_json::Value;
use shared::error::AppResult;

use crate::model::id::UserId;

// 通知の送達。呼び出し側は失敗をログに落とすだけで、業務処理は巻き戻さない
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: UserId,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> AppResult<()>;
}
