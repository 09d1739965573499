use rust_decimal::Decimal;

use crate::model::id::{ItemId, UserId};

#[derive(Debug)]
pub struct CreateItem {
    pub item_name: String,
    pub description: String,
    pub price_per_day: Decimal,
    pub deposit_amount: Decimal,
    pub address: String,
    pub owned_by: UserId,
}

#[derive(Debug)]
pub struct DeactivateItem {
    pub item_id: ItemId,
    pub requested_user: UserId,
}
