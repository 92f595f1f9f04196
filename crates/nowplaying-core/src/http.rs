use crate::bridge::SyncBridge;
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use nowplaying_proto::catalog::{Album, Artist, CatalogAccessor};
use nowplaying_proto::protocol::{Command, PlayerSnapshot, ViewEvent};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

struct HttpState<C> {
    bridge: SyncBridge,
    catalog: Arc<C>,
}

impl<C> Clone for HttpState<C> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

pub fn router<C: CatalogAccessor + 'static>(bridge: SyncBridge, catalog: Arc<C>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/state", get(get_state::<C>))
        .route("/api/albums", get(get_albums::<C>))
        .route("/api/albums/:id", get(get_album::<C>))
        .route("/api/artists/:id", get(get_artist::<C>))
        .route("/api/play/:album_id/:song_id", post(play_song::<C>))
        .route("/api/toggle", post(toggle::<C>))
        .route("/api/next", post(next::<C>))
        .route("/api/prev", post(prev::<C>))
        .route("/api/seek/:seconds", post(seek::<C>))
        .route("/api/volume/:percent", post(set_volume::<C>))
        .route("/api/view/:event", post(view::<C>))
        .route("/api/viewport/:width/:height", post(viewport::<C>))
        .layer(cors)
        .with_state(HttpState { bridge, catalog })
}

pub fn start_server<C: CatalogAccessor + 'static>(
    bind_address: String,
    port: u16,
    bridge: SyncBridge,
    catalog: Arc<C>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(bridge, catalog);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward<C>(state: &HttpState<C>, cmd: Command) -> StatusCode {
    if state.bridge.send(cmd).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn get_state<C>(State(state): State<HttpState<C>>) -> Json<PlayerSnapshot> {
    Json(state.bridge.snapshot().await)
}

async fn get_albums<C: CatalogAccessor>(State(state): State<HttpState<C>>) -> Json<Vec<Album>> {
    Json(state.catalog.get_albums().await)
}

async fn get_album<C: CatalogAccessor>(
    State(state): State<HttpState<C>>,
    Path(id): Path<String>,
) -> Result<Json<Album>, StatusCode> {
    state
        .catalog
        .get_album_by_id(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_artist<C: CatalogAccessor>(
    State(state): State<HttpState<C>>,
    Path(id): Path<String>,
) -> Result<Json<Artist>, StatusCode> {
    state
        .catalog
        .get_artist_by_id(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn play_song<C>(
    State(state): State<HttpState<C>>,
    Path((album_id, song_id)): Path<(String, String)>,
) -> StatusCode {
    info!("HTTP API: play {}/{}", album_id, song_id);
    forward(&state, Command::PlaySong { album_id, song_id }).await
}

async fn toggle<C>(State(state): State<HttpState<C>>) -> StatusCode {
    info!("HTTP API: toggle");
    forward(&state, Command::PlayPause).await
}

async fn next<C>(State(state): State<HttpState<C>>) -> StatusCode {
    info!("HTTP API: next");
    forward(&state, Command::Next).await
}

async fn prev<C>(State(state): State<HttpState<C>>) -> StatusCode {
    info!("HTTP API: previous");
    forward(&state, Command::Previous).await
}

async fn seek<C>(State(state): State<HttpState<C>>, Path(seconds): Path<f64>) -> StatusCode {
    info!("HTTP API: seek {}", seconds);
    forward(&state, Command::Seek { seconds }).await
}

async fn set_volume<C>(State(state): State<HttpState<C>>, Path(percent): Path<f64>) -> StatusCode {
    info!("HTTP API: volume {}%", percent);
    forward(&state, Command::SetVolume { percent }).await
}

async fn view<C>(State(state): State<HttpState<C>>, Path(event): Path<String>) -> StatusCode {
    let Some(event) = ViewEvent::parse(&event) else {
        return StatusCode::BAD_REQUEST;
    };
    info!("HTTP API: view {:?}", event);
    forward(&state, Command::View { event }).await
}

async fn viewport<C>(
    State(state): State<HttpState<C>>,
    Path((width, height)): Path<(f64, f64)>,
) -> StatusCode {
    forward(&state, Command::ViewportResize { width, height }).await
}
