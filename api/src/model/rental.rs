use chrono::{DateTime, Utc};
use garde::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kernel::model::{
    id::{ItemId, RentalId, UserId},
    rental::{Rental, RentalItem},
    user::RentalParty,
};
use kernel::service::rental::PayoutCheckOutcome;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRentalRequest {
    #[garde(skip)]
    pub rented_by: UserId,
    #[garde(skip)]
    pub start_date: DateTime<Utc>,
    #[garde(skip)]
    pub end_date: DateTime<Utc>,
}

// 承認・辞退・完了報告などの操作で、操作主体を受け渡すための型。
// 認証そのものはこのコアの範囲外で、周辺アプリケーションが担う
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalActionRequest {
    pub requested_user: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalsResponse {
    pub items: Vec<RentalResponse>,
}

impl From<Vec<Rental>> for RentalsResponse {
    fn from(value: Vec<Rental>) -> Self {
        Self {
            items: value.into_iter().map(RentalResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalResponse {
    pub rental_id: RentalId,
    pub item: RentalItemResponse,
    pub renter: RentalPartyResponse,
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

impl From<Rental> for RentalResponse {
    fn from(value: Rental) -> Self {
        let Rental {
            rental_id,
            item,
            renter,
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
        Self {
            rental_id,
            item: item.into(),
            renter: renter.into(),
            status: status.to_string(),
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
            payout_status: payout_status.to_string(),
            payout_transfer_id,
            requested_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalItemResponse {
    pub item_id: ItemId,
    pub item_name: String,
    pub owner_id: UserId,
    pub owner_name: String,
}

impl From<RentalItem> for RentalItemResponse {
    fn from(value: RentalItem) -> Self {
        let RentalItem {
            item_id,
            item_name,
            owner_id,
            owner_name,
        } = value;
        Self {
            item_id,
            item_name,
            owner_id,
            owner_name,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalPartyResponse {
    pub user_id: UserId,
    pub user_name: String,
}

impl From<RentalParty> for RentalPartyResponse {
    fn from(value: RentalParty) -> Self {
        let RentalParty { user_id, user_name } = value;
        Self { user_id, user_name }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutCheckResponse {
    pub outcome: String,
}

impl From<PayoutCheckOutcome> for PayoutCheckResponse {
    fn from(value: PayoutCheckOutcome) -> Self {
        let outcome = match value {
            PayoutCheckOutcome::NotYetEligible => "not_yet_eligible",
            PayoutCheckOutcome::Settled => "settled",
        };
        Self {
            outcome: outcome.into(),
        }
    }
}
