use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::error::AppResult;

use crate::model::{
    id::{RentalId, UserId},
    rental::{
        event::{
            BeginCompletion, ConfirmReturn, CreateRental, FinalizeCompletion, SettlePayout,
            UpdatePayoutStatus, UpdateStatus,
        },
        Rental,
    },
};

// Rental レコードを保持する台帳。1 レコード単位の原子的な書き込みを前提とし、
// 状態付き UPDATE が 0 行だった場合は実装側で NotFound / InvalidStateTransition
// に振り分けて返す
#[async_trait]
pub trait RentalRepository: Send + Sync {
    // リクエスト作成。対象アイテムの存在・受付状態・期間重複を検査してから登録する
    async fn create(&self, event: CreateRental) -> AppResult<RentalId>;
    async fn find_by_id(&self, rental_id: RentalId) -> AppResult<Rental>;
    async fn find_all(&self) -> AppResult<Vec<Rental>>;
    async fn find_by_renter_id(&self, user_id: UserId) -> AppResult<Vec<Rental>>;
    // ロイヤルティ割引の判定に使う完了済み件数
    async fn count_completed_by_renter(&self, user_id: UserId) -> AppResult<i64>;

    async fn update_status(&self, event: UpdateStatus) -> AppResult<()>;
    // active -> pending_completion。貸し手確認フラグと自動完了期限を書く
    async fn begin_completion(&self, event: BeginCompletion) -> AppResult<()>;
    // 借り手フラグを書き、同一トランザクションで読み直した結果を返す。
    // 完了させるかどうかの判断はこの戻り値（書き込み後の状態）で行うこと
    async fn set_renter_confirmation(&self, event: ConfirmReturn) -> AppResult<Rental>;
    // completed_at 未設定のときだけ成立する。勝者だけが true を受け取る
    async fn finalize_completion(&self, event: FinalizeCompletion) -> AppResult<bool>;
    // 非終端状態からのみ。終端状態に対しては InvalidStateTransition
    async fn cancel(&self, rental_id: RentalId) -> AppResult<()>;

    // 異議申し立てによる送金凍結。ステータス自体は変えない
    async fn freeze_payout(&self, rental_id: RentalId) -> AppResult<()>;
    async fn update_payout_status(&self, event: UpdatePayoutStatus) -> AppResult<()>;
    // 送金成功の確定。キャンセル等と競合した場合は false
    async fn settle_payout(&self, event: SettlePayout) -> AppResult<bool>;

    // スケジューラ用の抽出。確認済み・凍結済み・失敗済みは含めない
    async fn find_auto_complete_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Rental>>;
    async fn find_payout_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Rental>>;
}
