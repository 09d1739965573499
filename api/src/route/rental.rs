use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::rental::{
    approve_rental, cancel_rental, check_payout, complete_rental, confirm_return, decline_rental,
    file_dispute, payment_confirmed, retry_payout, show_rental, show_rental_list,
    show_rentals_by_user,
};

pub fn build_rental_routers() -> Router<AppRegistry> {
    let rentals_routers = Router::new()
        .route("/", get(show_rental_list))
        .route("/users/:user_id", get(show_rentals_by_user))
        .route("/:rental_id", get(show_rental))
        .route("/:rental_id/approve", put(approve_rental))
        .route("/:rental_id/decline", put(decline_rental))
        .route("/:rental_id/cancel", put(cancel_rental))
        .route("/:rental_id/payment-confirmed", post(payment_confirmed))
        .route("/:rental_id/complete", put(complete_rental))
        .route("/:rental_id/return", put(confirm_return))
        .route("/:rental_id/disputes", post(file_dispute))
        .route("/:rental_id/payout/check", post(check_payout))
        .route("/:rental_id/payout/retry", post(retry_payout));

    Router::new().nest("/rentals", rentals_routers)
}
