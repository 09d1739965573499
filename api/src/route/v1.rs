use axum::Router;
use registry::AppRegistry;

use super::{
    health::build_health_check_routers, item::build_item_routers, rental::build_rental_routers,
    user::build_user_routers,
};

pub fn routes() -> Router<AppRegistry> {
    let router = Router::new()
        .merge(build_health_check_routers())
        .merge(build_item_routers())
        .merge(build_rental_routers())
        .merge(build_user_routers());
    Router::new().nest("/api/v1", router)
}
