pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::{IntoResponse, Redirect},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wikichat_api::chat;
use wikichat_api::{AppState, AppStateInner};
use wikichat_gateway::{BroadcastDispatcher, ConnectionConfig, ConnectionRegistry, connection};
use wikichat_log::{ChatLog, ChatLogStore};

use crate::config::Config;

/// State for the WebSocket upgrade route.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: BroadcastDispatcher,
    pub connection: Arc<ConnectionConfig>,
    pub max_frame_bytes: usize,
}

/// Everything the server owns, composed once at startup.
pub struct App {
    pub router: Router,
    pub state: AppState,
    pub dispatcher: BroadcastDispatcher,
}

/// Open the chat log and wire up the hub.
pub async fn build(config: &Config) -> anyhow::Result<App> {
    let store = ChatLogStore::open(&config.log_path, config.io_timeout).await?;
    let chat_log = ChatLog::open(store).await?;

    let state: AppState = Arc::new(AppStateInner {
        chat_log,
        anonymous_name: config.anonymous_name.clone(),
    });

    let dispatcher = BroadcastDispatcher::new(ConnectionRegistry::new());
    let gateway = GatewayState {
        dispatcher: dispatcher.clone(),
        connection: Arc::new(config.connection_config()),
        max_frame_bytes: config.max_frame_bytes,
    };

    Ok(App {
        router: router(state.clone(), gateway),
        state,
        dispatcher,
    })
}

pub fn router(app: AppState, gateway: GatewayState) -> Router {
    let chat_routes = Router::new()
        .route("/chat", get(chat::get_chat).post(chat::post_chat))
        .with_state(app);

    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(gateway);

    Router::new()
        .route("/", get(|| async { Redirect::to("/chat") }))
        .route("/health", get(|| async { "ok" }))
        .merge(chat_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.max_message_size(state.max_frame_bytes)
        .on_upgrade(move |socket| {
            connection::handle_connection(socket, state.dispatcher, state.connection)
        })
}
