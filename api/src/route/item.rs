use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::item::{deactivate_item, register_item, show_item, show_item_list};
use crate::handler::rental::request_rental;

pub fn build_item_routers() -> Router<AppRegistry> {
    let items_routers = Router::new()
        .route("/", post(register_item))
        .route("/", get(show_item_list))
        .route("/:item_id", get(show_item))
        .route("/:item_id/deactivate", put(deactivate_item))
        .route("/:item_id/rentals", post(request_rental));

    Router::new().nest("/items", items_routers)
}
