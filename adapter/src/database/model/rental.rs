use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::error::AppError;
use sqlx::FromRow;

use kernel::model::{
    id::{ItemId, RentalId, UserId},
    rental::{PayoutStatus, Rental, RentalItem, RentalStatus},
    user::RentalParty,
};

// レンタル一覧・詳細を取得する際に使う型。
// items / users と JOIN した結果を受ける
#[derive(FromRow)]
pub struct RentalRow {
    pub rental_id: RentalId,
    pub item_id: ItemId,
    pub item_name: String,
    pub owner_id: UserId,
    pub owner_name: String,
    pub renter_id: UserId,
    pub renter_name: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_price: Decimal,
    pub fee_percent: Decimal,
    pub owner_confirmed_return: bool,
    pub renter_confirmed_return: bool,
    pub auto_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub payout_eligible_at: Option<DateTime<Utc>>,
    pub auto_complete_at: Option<DateTime<Utc>>,
    pub payout_frozen: bool,
    pub payout_status: String,
    pub payout_transfer_id: Option<String>,
    pub requested_at: DateTime<Utc>,
}

// DB のレコードをそのまま信用せず、ここで型付きの値へ落とす。
// 未知のステータス文字列は変換エラーとして弾く
impl TryFrom<RentalRow> for Rental {
    type Error = AppError;

    fn try_from(value: RentalRow) -> Result<Self, Self::Error> {
        let RentalRow {
            rental_id,
            item_id,
            item_name,
            owner_id,
            owner_name,
            renter_id,
            renter_name,
            status,
            start_date,
            end_date,
            total_price,
            fee_percent,
            owner_confirmed_return,
            renter_confirmed_return,
            auto_completed,
            completed_at,
            payout_eligible_at,
            auto_complete_at,
            payout_frozen,
            payout_status,
            payout_transfer_id,
            requested_at,
        } = value;

        let status = status.parse::<RentalStatus>().map_err(|_| {
            AppError::ConversionEntityError(format!("不正なステータス値です: {}", status))
        })?;
        let payout_status = payout_status.parse::<PayoutStatus>().map_err(|_| {
            AppError::ConversionEntityError(format!("不正な送金ステータス値です: {}", payout_status))
        })?;

        Ok(Rental {
            rental_id,
            item: RentalItem {
                item_id,
                item_name,
                owner_id,
                owner_name,
            },
            renter: RentalParty {
                user_id: renter_id,
                user_name: renter_name,
            },
            status,
            start_date,
            end_date,
            total_price,
            fee_percent,
            owner_confirmed_return,
            renter_confirmed_return,
            auto_completed,
            completed_at,
            payout_eligible_at,
            auto_complete_at,
            payout_frozen,
            payout_status,
            payout_transfer_id,
            requested_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(status: &str, payout_status: &str) -> RentalRow {
        RentalRow {
            rental_id: RentalId::new(),
            item_id: ItemId::new(),
            item_name: "test item".into(),
            owner_id: UserId::new(),
            owner_name: "owner".into(),
            renter_id: UserId::new(),
            renter_name: "renter".into(),
            status: status.into(),
            start_date: "2025-06-10T00:00:00Z".parse().unwrap(),
            end_date: "2025-06-13T00:00:00Z".parse().unwrap(),
            total_price: Decimal::from(150),
            fee_percent: Decimal::from(10),
            owner_confirmed_return: false,
            renter_confirmed_return: false,
            auto_completed: false,
            completed_at: None,
            payout_eligible_at: None,
            auto_complete_at: None,
            payout_frozen: false,
            payout_status: payout_status.into(),
            payout_transfer_id: None,
            requested_at: "2025-06-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn known_status_strings_decode() {
        let rental = Rental::try_from(sample_row("completed_pending_payout", "pending")).unwrap();
        assert_eq!(rental.status, RentalStatus::CompletedPendingPayout);
        assert_eq!(rental.payout_status, PayoutStatus::Pending);
    }

    #[test]
    fn unknown_status_string_is_a_typed_decode_error() {
        let res = Rental::try_from(sample_row("archived", "pending"));
        assert!(matches!(res, Err(AppError::ConversionEntityError(_))));
    }
}
