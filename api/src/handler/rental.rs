use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use garde::Validate;

use kernel::model::id::{ItemId, RentalId, UserId};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::model::rental::{
    CreateRentalRequest, PayoutCheckResponse, RentalActionRequest, RentalResponse, RentalsResponse,
};

// 借り手がアイテムに対してレンタルをリクエストする
pub async fn request_rental(
    Path(item_id): Path<ItemId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateRentalRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate(&())?;

    let rental_id = registry
        .rental_lifecycle_service()
        .request_rental(item_id, req.rented_by, req.start_date, req.end_date)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "rentalId": rental_id.to_string() })),
    ))
}

pub async fn approve_rental(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<RentalActionRequest>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .approve_rental(rental_id, req.requested_user)
        .await
        .map(|_| StatusCode::OK)
}

pub async fn decline_rental(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<RentalActionRequest>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .decline_rental(rental_id, req.requested_user)
        .await
        .map(|_| StatusCode::OK)
}

pub async fn cancel_rental(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<RentalActionRequest>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .cancel_rental(rental_id, req.requested_user)
        .await
        .map(|_| StatusCode::OK)
}

// 決済プロバイダからの Webhook。決済の確認が取れたレンタルを開始する
pub async fn payment_confirmed(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .activate_rental(rental_id)
        .await
        .map(|_| StatusCode::OK)
}

// 貸し手による完了報告。終了日時前は 422 で弾かれる
pub async fn complete_rental(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<RentalActionRequest>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .mark_complete(rental_id, req.requested_user)
        .await
        .map(|_| StatusCode::OK)
}

// 借り手による返却確認
pub async fn confirm_return(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<RentalActionRequest>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .confirm_return(rental_id, req.requested_user)
        .await
        .map(|_| StatusCode::OK)
}

// 異議申し立て。送金を凍結する
pub async fn file_dispute(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .file_dispute(rental_id)
        .await
        .map(|_| StatusCode::OK)
}

// 送金適格性の確認。適格なら送金まで行う
pub async fn check_payout(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<PayoutCheckResponse>> {
    registry
        .rental_lifecycle_service()
        .check_payout(rental_id)
        .await
        .map(PayoutCheckResponse::from)
        .map(Json)
}

// 失敗した送金の手動再試行
pub async fn retry_payout(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    registry
        .rental_lifecycle_service()
        .retry_payout(rental_id)
        .await
        .map(|_| StatusCode::OK)
}

pub async fn show_rental_list(
    State(registry): State<AppRegistry>,
) -> AppResult<Json<RentalsResponse>> {
    registry
        .rental_repository()
        .find_all()
        .await
        .map(RentalsResponse::from)
        .map(Json)
}

pub async fn show_rental(
    Path(rental_id): Path<RentalId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<RentalResponse>> {
    registry
        .rental_repository()
        .find_by_id(rental_id)
        .await
        .map(RentalResponse::from)
        .map(Json)
}

pub async fn show_rentals_by_user(
    Path(user_id): Path<UserId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<RentalsResponse>> {
    registry
        .rental_repository()
        .find_by_renter_id(user_id)
        .await
        .map(RentalsResponse::from)
        .map(Json)
}
