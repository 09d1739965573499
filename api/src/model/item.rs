use garde::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kernel::model::{
    id::{ItemId, UserId},
    item::{event::CreateItem, Item},
    user::ItemOwner,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[garde(length(min = 1))]
    pub item_name: String,
    #[garde(skip)]
    pub description: String,
    #[garde(skip)]
    pub price_per_day: Decimal,
    #[garde(skip)]
    pub deposit_amount: Decimal,
    #[garde(skip)]
    pub address: String,
    #[garde(skip)]
    pub owned_by: UserId,
}

impl From<CreateItemRequest> for CreateItem {
    fn from(value: CreateItemRequest) -> Self {
        let CreateItemRequest {
            item_name,
            description,
            price_per_day,
            deposit_amount,
            address,
            owned_by,
        } = value;
        CreateItem {
            item_name,
            description,
            price_per_day,
            deposit_amount,
            address,
            owned_by,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateItemRequest {
    pub requested_user: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsResponse {
    pub items: Vec<ItemResponse>,
}

impl From<Vec<Item>> for ItemsResponse {
    fn from(value: Vec<Item>) -> Self {
        Self {
            items: value.into_iter().map(ItemResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub item_id: ItemId,
    pub item_name: String,
    pub description: String,
    pub price_per_day: Decimal,
    pub deposit_amount: Decimal,
    pub address: String,
    pub is_active: bool,
    pub owner: ItemOwnerResponse,
}

impl From<Item> for ItemResponse {
    fn from(value: Item) -> Self {
        let Item {
            item_id,
            item_name,
            description,
            price_per_day,
            deposit_amount,
            address,
            is_active,
            owner,
        } = value;
        Self {
            item_id,
            item_name,
            description,
            price_per_day,
            deposit_amount,
            address,
            is_active,
            owner: owner.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOwnerResponse {
    pub owner_id: UserId,
    pub owner_name: String,
}

impl From<ItemOwner> for ItemOwnerResponse {
    fn from(value: ItemOwner) -> Self {
        let ItemOwner {
            owner_id,
            owner_name,
        } = value;
        Self {
            owner_id,
            owner_name,
        }
    }
}
