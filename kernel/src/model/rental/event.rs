use chrono::{DateTime, Utc};
use derive_new::new;
use rust_decimal::Decimal;

use crate::model::id::{ItemId, RentalId, UserId};
use crate::model::rental::{PayoutStatus, RentalStatus};

#[derive(new)]
pub struct CreateRental {
    pub item_id: ItemId,
    pub rented_by: UserId,
    pub requested_at: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_price: Decimal,
    pub fee_percent: Decimal,
}

// 現在の状態が from のときだけ to へ進める
#[derive(new)]
pub struct UpdateStatus {
    pub rental_id: RentalId,
    pub from: RentalStatus,
    pub to: RentalStatus,
}

// active -> pending_completion。貸し手の確認フラグと自動完了期限を同時に書く
#[derive(new)]
pub struct BeginCompletion {
    pub rental_id: RentalId,
    pub auto_complete_at: DateTime<Utc>,
}

// 借り手の返却確認。auto_completed はタイマー起動時のみ true
#[derive(new)]
pub struct ConfirmReturn {
    pub rental_id: RentalId,
    pub auto_completed: bool,
}

// 両者確認後の完了確定。completed_at は一度だけ書かれる
#[derive(new)]
pub struct FinalizeCompletion {
    pub rental_id: RentalId,
    pub completed_at: DateTime<Utc>,
    pub payout_eligible_at: DateTime<Utc>,
    pub auto_completed: bool,
}

#[derive(new)]
pub struct UpdatePayoutStatus {
    pub rental_id: RentalId,
    pub payout_status: PayoutStatus,
}

// 送金成功の確定。completed_pending_payout -> completed
#[derive(new)]
pub struct SettlePayout {
    pub rental_id: RentalId,
    pub transfer_id: String,
}
