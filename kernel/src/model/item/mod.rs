use rust_decimal::Decimal;

use crate::model::{id::ItemId, user::ItemOwner};

pub mod event;

#[derive(Debug)]
pub struct Item {
    pub item_id: ItemId,
    pub item_name: String,
    pub description: String,
    // 1 日あたりの貸出価格
    pub price_per_day: Decimal,
    // 別途預かるデポジット額。返金処理は外部サービスが担う
    pub deposit_amount: Decimal,
    pub address: String,
    pub is_active: bool,
    pub owner: ItemOwner,
}
