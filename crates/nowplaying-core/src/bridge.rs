//! The one handle every surface holds.
//!
//! Reads go straight to the shared `StateStore`; writes become `CoreEvent`s
//! and are applied by the core in the order they were sent.  Surfaces never
//! see a `PlayerError`: failures are logged by the core and, for playback
//! start failures, show up as the snapshot's `notice`.

use std::sync::Arc;

use nowplaying_proto::protocol::{Command, PlayerSnapshot, Point, Size, ViewEvent};
use nowplaying_proto::state::StateStore;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::core::CoreEvent;
use crate::BroadcastMessage;

#[derive(Clone)]
pub struct SyncBridge {
    store: Arc<StateStore>,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl SyncBridge {
    pub fn new(
        store: Arc<StateStore>,
        event_tx: mpsc::Sender<CoreEvent>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
    ) -> Self {
        Self {
            store,
            event_tx,
            broadcast_tx,
        }
    }

    /// The state as of now.  Call this when handling an event rather than
    /// caching an earlier copy.
    pub async fn snapshot(&self) -> PlayerSnapshot {
        self.store.get_state().await
    }

    /// Change notifications; fetch a fresh `snapshot()` on each one.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Queue `cmd` for the core.  `false` only when the core has stopped.
    pub async fn send(&self, cmd: Command) -> bool {
        if self.event_tx.send(CoreEvent::Command(cmd)).await.is_err() {
            warn!("bridge: player core is gone, command dropped");
            return false;
        }
        true
    }

    pub async fn play_song(&self, album_id: impl Into<String>, song_id: impl Into<String>) {
        self.send(Command::PlaySong {
            album_id: album_id.into(),
            song_id: song_id.into(),
        })
        .await;
    }

    pub async fn play_pause(&self) {
        self.send(Command::PlayPause).await;
    }

    pub async fn next(&self) {
        self.send(Command::Next).await;
    }

    pub async fn previous(&self) {
        self.send(Command::Previous).await;
    }

    pub async fn seek(&self, seconds: f64) {
        self.send(Command::Seek { seconds }).await;
    }

    /// `percent` in `0..=100`.
    pub async fn set_volume(&self, percent: f64) {
        self.send(Command::SetVolume { percent }).await;
    }

    pub async fn request_view_state(&self, event: ViewEvent) {
        self.send(Command::View { event }).await;
    }

    pub async fn pointer_down(&self, p: Point) {
        self.send(Command::PointerDown { x: p.x, y: p.y }).await;
    }

    pub async fn pointer_move(&self, p: Point) {
        self.send(Command::PointerMove { x: p.x, y: p.y }).await;
    }

    pub async fn pointer_up(&self) {
        self.send(Command::PointerUp).await;
    }

    pub async fn viewport_resized(&self, viewport: Size) {
        self.send(Command::ViewportResize {
            width: viewport.width,
            height: viewport.height,
        })
        .await;
    }

    pub async fn shutdown(&self) {
        let _ = self.event_tx.send(CoreEvent::Shutdown).await;
    }
}
