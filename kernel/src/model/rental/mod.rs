use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use strum::{AsRefStr, Display, EnumString};

use crate::model::id::{ItemId, RentalId, UserId};
use crate::model::user::RentalParty;

pub mod event;

// 送金解放までの保留時間。completed_at からの不正利用対策のための猶予
pub const PAYOUT_HOLD_HOURS: i64 = 48;
// 借り手の返却確認を待つ猶予。end_date + 72h を過ぎたら自動確認する
pub const AUTO_COMPLETE_GRACE_HOURS: i64 = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RentalStatus {
    Pending,
    Approved,
    Declined,
    Active,
    PendingCompletion,
    CompletedPendingPayout,
    Completed,
    Cancelled,
}

impl RentalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Rental {
    pub rental_id: RentalId,
    pub item: RentalItem,
    pub renter: RentalParty,
    pub status: RentalStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    // 借り手が支払う総額。手数料は送金時に差し引く
    pub total_price: Decimal,
    // リクエスト時点の手数料率（パーセント）。以後再計算しない
    pub fee_percent: Decimal,
    pub owner_confirmed_return: bool,
    pub renter_confirmed_return: bool,
    pub auto_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub payout_eligible_at: Option<DateTime<Utc>>,
    pub auto_complete_at: Option<DateTime<Utc>>,
    pub payout_frozen: bool,
    pub payout_status: PayoutStatus,
    pub payout_transfer_id: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RentalItem {
    pub item_id: ItemId,
    pub item_name: String,
    pub owner_id: UserId,
    pub owner_name: String,
}

impl Rental {
    pub fn both_confirmed(&self) -> bool {
        self.owner_confirmed_return && self.renter_confirmed_return
    }

    // 貸し手が完了報告できるのは end_date 以降（タイムロック）
    pub fn completion_unlocked(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }

    pub fn auto_complete_deadline(end_date: DateTime<Utc>) -> DateTime<Utc> {
        end_date + Duration::hours(AUTO_COMPLETE_GRACE_HOURS)
    }

    pub fn payout_hold_until(completed_at: DateTime<Utc>) -> DateTime<Utc> {
        completed_at + Duration::hours(PAYOUT_HOLD_HOURS)
    }

    // 凍結されておらず、保留期間を過ぎていれば送金できる
    pub fn payout_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == RentalStatus::CompletedPendingPayout
            && !self.payout_frozen
            && self
                .payout_eligible_at
                .map_or(false, |eligible_at| now >= eligible_at)
    }

    // 貸し手へ送金する額。手数料率ぶんを差し引く
    pub fn payout_amount(&self) -> Decimal {
        let rate = (Decimal::ONE_HUNDRED - self.fee_percent) / Decimal::ONE_HUNDRED;
        self.total_price * rate
    }
}
