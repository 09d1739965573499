use rust_decimal::Decimal;
use sqlx::FromRow;

use kernel::model::{
    id::{ItemId, UserId},
    item::Item,
    user::ItemOwner,
};

#[derive(FromRow)]
pub struct ItemRow {
    pub item_id: ItemId,
    pub item_name: String,
    pub description: String,
    pub price_per_day: Decimal,
    pub deposit_amount: Decimal,
    pub address: String,
    pub is_active: bool,
    pub owned_by: UserId,
    pub owner_name: String,
}

impl From<ItemRow> for Item {
    fn from(value: ItemRow) -> Self {
        let ItemRow {
            item_id,
            item_name,
            description,
            price_per_day,
            deposit_amount,
            address,
            is_active,
            owned_by,
            owner_name,
        } = value;
        Item {
            item_id,
            item_name,
            description,
            price_per_day,
            deposit_amount,
            address,
            is_active,
            owner: ItemOwner {
                owner_id: owned_by,
                owner_name,
            },
        }
    }
}
