use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use super::{handlers, middleware::identity_middleware, websocket::handle_websocket};
use crate::AppState;

pub fn create_router(state: AppState) -> Router<AppState> {
    // Routes that read the caller identity forwarded by the gateway
    let identity_routes = Router::new()
        .route("/conversations", get(handlers::chat::get_conversations))
        .route("/entities", get(handlers::chat::get_entities))
        .route("/group", post(handlers::chat::create_group))
        .layer(middleware::from_fn(identity_middleware));

    // Exposed without an identity requirement
    let open_routes = Router::new()
        .route("/conversation", post(handlers::chat::create_direct_conversation))
        .route("/group/:group_id", put(handlers::chat::update_group))
        .route("/group/:group_id", delete(handlers::chat::delete_group));

    // WebSocket route; connection identity arrives with join_room events
    let ws_route = Router::new().route("/ws", get(handle_websocket));

    Router::new()
        .nest("/chat", identity_routes.merge(open_routes).merge(ws_route))
        .with_state(state)
}
