use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use garde::Validate;

use kernel::model::{id::ItemId, item::event::DeactivateItem};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::model::item::{CreateItemRequest, DeactivateItemRequest, ItemResponse, ItemsResponse};

pub async fn register_item(
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateItemRequest>,
) -> Result<StatusCode, AppError> {
    req.validate(&())?;

    registry
        .item_repository()
        .create(req.into())
        .await
        .map(|_| StatusCode::CREATED)
}

pub async fn show_item_list(
    State(registry): State<AppRegistry>,
) -> AppResult<Json<ItemsResponse>> {
    registry
        .item_repository()
        .find_all()
        .await
        .map(ItemsResponse::from)
        .map(Json)
}

pub async fn show_item(
    Path(item_id): Path<ItemId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<ItemResponse>> {
    registry
        .item_repository()
        .find_by_id(item_id)
        .await
        .and_then(|item| match item {
            Some(item) => Ok(Json(item.into())),
            None => Err(AppError::EntityNotFound("not found".into())),
        })
}

pub async fn deactivate_item(
    Path(item_id): Path<ItemId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<DeactivateItemRequest>,
) -> AppResult<StatusCode> {
    let deactivate_item = DeactivateItem {
        item_id,
        requested_user: req.requested_user,
    };
    registry
        .item_repository()
        .deactivate(deactivate_item)
        .await
        .map(|_| StatusCode::OK)
}
