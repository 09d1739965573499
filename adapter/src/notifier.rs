use async_trait::async_trait;
use derive_new::new;
use serde_json::Value;
use uuid::Uuid;

use kernel::model::id::UserId;
use kernel::notifier::Notifier;
use shared::error::{AppError, AppResult};

use crate::database::ConnectionPool;

// 通知をアプリ内通知テーブルへ書き込む実装。
// 端末への配信はこのテーブルを購読する外部ワーカーの仕事とする
#[derive(new)]
pub struct NotifierImpl {
    db: ConnectionPool,
}

#[async_trait]
impl Notifier for NotifierImpl {
    async fn notify(
        &self,
        user_id: UserId,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> AppResult<()> {
        let res = sqlx::query(
            r#"
            INSERT INTO notifications (notification_id, user_id, title, body, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(body)
        .bind(metadata)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No notification record has been created".into(),
            ));
        }

        Ok(())
    }
}
