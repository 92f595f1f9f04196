/// PlayerCore: single-owner event loop for all mutable player state.
///
/// Every surface (persistent bar, floating widget, HTTP API, console) sends
/// `CoreEvent`s to this loop through the `SyncBridge`.  PlayerCore owns the
/// playback controller (and through it the one audio resource), the view
/// state machine and the drag positioner exclusively; no other task touches
/// them.
///
/// After each event the core writes one complete `PlayerSnapshot` into the
/// `StateStore` and, if anything changed, broadcasts
/// `BroadcastMessage::StateUpdated`.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nowplaying_proto::catalog::CatalogAccessor;
use nowplaying_proto::config::{Config, WidgetConfig};
use nowplaying_proto::protocol::{
    Command, Notice, Point, Size, ViewEvent, ViewState, WidgetLayout,
};
use nowplaying_proto::state::StateStore;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::drag::{check_viewport, DragPositioner};
use crate::error::{PlayerError, PlayerResult};
use crate::playback::PlaybackController;
use crate::resource::{AudioResource, ResourceEvent};
use crate::view::ViewMachine;
use crate::BroadcastMessage;

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// A command from one of the surfaces.
    Command(Command),
    /// Something the audio resource reported.
    Resource(ResourceEvent),
    /// Periodic housekeeping (notice expiry).
    HeartbeatTick,
    Shutdown,
}

/// Top-left corner for a `size` panel pinned to the bottom-right of
/// `viewport`, inset by `margin` and never negative.
pub fn dock_bottom_right(viewport: Size, size: Size, margin: f64) -> Point {
    Point::new(
        (viewport.width - size.width - margin).max(0.0),
        (viewport.height - size.height - margin).max(0.0),
    )
}

pub struct PlayerCore<R: AudioResource, C: CatalogAccessor> {
    controller: PlaybackController<R>,
    catalog: Arc<C>,
    view: ViewMachine,
    /// Present only while the view is `pip`.
    drag: Option<DragPositioner>,
    /// Last viewport that passed validation.
    viewport: Size,
    widget: WidgetConfig,
    notice: Option<Notice>,
    notice_ttl: chrono::Duration,
    store: Arc<StateStore>,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl<R: AudioResource, C: CatalogAccessor> PlayerCore<R, C> {
    pub fn new(
        controller: PlaybackController<R>,
        catalog: Arc<C>,
        config: &Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let view = ViewMachine::new(config.player.initial_view == ViewState::Hidden);
        let notice_ttl = chrono::Duration::seconds(config.player.notice_secs.min(86_400) as i64);
        let mut core = Self {
            store: Arc::new(StateStore::new(
                controller.state().clone(),
                view.state(),
                WidgetLayout::Hidden,
            )),
            controller,
            catalog,
            view,
            drag: None,
            viewport: config.widget.initial_viewport(),
            widget: config.widget.clone(),
            notice: None,
            notice_ttl,
            event_tx,
            broadcast_tx,
        };
        if core.view.state().is_draggable() {
            core.enter_pip();
        }
        // seed the store with the real initial layout
        core.store = Arc::new(StateStore::new(
            core.controller.state().clone(),
            core.view.state(),
            core.layout(),
        ));
        core
    }

    /// Shared read model for the bridge and the HTTP server.
    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    /// Run the core event loop until a `Shutdown` event arrives, then release
    /// the audio resource.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");
        self.publish().await;

        let heartbeat_tx = self.event_tx.clone();
        let heartbeat = tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        while let Some(evt) = event_rx.recv().await {
            if matches!(evt, CoreEvent::Shutdown) {
                info!("PlayerCore: shutdown requested");
                break;
            }
            self.handle_event(evt).await;
        }

        heartbeat.abort();
        self.controller.release();
        self.publish().await;
        info!("PlayerCore: stopped");
        Ok(())
    }

    /// Apply one event and publish the resulting snapshot.
    pub async fn handle_event(&mut self, evt: CoreEvent) {
        match evt {
            CoreEvent::Command(cmd) => {
                debug!("PlayerCore: command {:?}", cmd);
                if let Err(e) = self.handle_command(cmd).await {
                    self.report(e);
                }
            }
            CoreEvent::Resource(ev) => {
                if let Err(e) = self.controller.on_resource_event(ev) {
                    self.report(e);
                }
            }
            CoreEvent::HeartbeatTick => self.expire_notice(Utc::now()),
            CoreEvent::Shutdown => {
                self.controller.release();
            }
        }
        self.publish().await;
    }

    async fn handle_command(&mut self, cmd: Command) -> PlayerResult<()> {
        match cmd {
            Command::PlaySong { album_id, song_id } => self.play_song(&album_id, &song_id).await,
            Command::PlayPause => self.controller.play_pause(),
            Command::Next => self.controller.next(),
            Command::Previous => self.controller.previous(),
            Command::Seek { seconds } => self.controller.seek(seconds),
            Command::SetVolume { percent } => self.controller.set_volume(percent),
            Command::View { event } => self.request_view(event),
            Command::PointerDown { .. } | Command::PointerMove { .. } | Command::PointerUp
                if !self.view.state().is_draggable() =>
            {
                Ok(())
            }
            Command::PointerDown { x, y } => match self.drag.as_mut() {
                Some(drag) => drag.on_pointer_down(Point::new(x, y)),
                None => Ok(()),
            },
            Command::PointerMove { x, y } => match self.drag.as_mut() {
                Some(drag) => drag.on_pointer_move(Point::new(x, y)).map(|_| ()),
                None => Ok(()),
            },
            Command::PointerUp => {
                if let Some(drag) = self.drag.as_mut() {
                    drag.on_pointer_up();
                }
                Ok(())
            }
            Command::ViewportResize { width, height } => self.resize_viewport(Size::new(width, height)),
        }
    }

    async fn play_song(&mut self, album_id: &str, song_id: &str) -> PlayerResult<()> {
        let album = self
            .catalog
            .get_album_by_id(album_id)
            .await
            .ok_or_else(|| PlayerError::MissingCatalogData(format!("album {}", album_id)))?;
        let song = album.song(song_id).cloned().ok_or_else(|| {
            PlayerError::MissingCatalogData(format!("song {} on album {}", song_id, album_id))
        })?;
        self.notice = None;
        self.controller.play_song(song, album)
    }

    fn request_view(&mut self, event: ViewEvent) -> PlayerResult<()> {
        let change = self.view.apply(event)?;
        if change.is_noop() {
            return Ok(());
        }
        info!("PlayerCore: view {} -> {}", change.from.label(), change.to.label());
        if change.leaves_draggable() {
            if let Some(drag) = self.drag.take() {
                if drag.is_dragging() {
                    debug!("PlayerCore: drag discarded on leaving pip");
                }
            }
        }
        if change.enters_draggable() {
            self.enter_pip();
        }
        Ok(())
    }

    /// Fresh geometry on every pip entry.
    fn enter_pip(&mut self) {
        match DragPositioner::enter(self.viewport, self.widget.pip_size(), self.widget.margin) {
            Ok(drag) => self.drag = Some(drag),
            Err(e) => {
                self.drag = None;
                self.report(e);
            }
        }
    }

    fn resize_viewport(&mut self, viewport: Size) -> PlayerResult<()> {
        match self.drag.as_mut() {
            Some(drag) => {
                if drag.on_viewport_resize(viewport)? {
                    debug!("PlayerCore: pip pulled back inside {}x{}", viewport.width, viewport.height);
                }
            }
            None => check_viewport(viewport)?,
        }
        self.viewport = viewport;
        if self.view.state().is_draggable() && self.drag.is_none() {
            self.enter_pip();
        }
        Ok(())
    }

    /// Drop the notice once it has been up for the configured time.
    pub fn expire_notice(&mut self, now: DateTime<Utc>) {
        if let Some(notice) = &self.notice {
            if now - notice.raised_at >= self.notice_ttl {
                debug!("PlayerCore: notice expired");
                self.notice = None;
            }
        }
    }

    fn report(&mut self, e: PlayerError) {
        if e.is_user_visible() {
            warn!("PlayerCore: {}", e);
            let song_id = match &e {
                PlayerError::PlaybackStart { song_id, .. } => Some(song_id.clone()),
                _ => None,
            };
            self.notice = Some(Notice {
                message: e.to_string(),
                song_id,
                raised_at: Utc::now(),
            });
        } else if matches!(e, PlayerError::InvalidTransition { .. }) {
            debug!("PlayerCore: ignored: {}", e);
        } else {
            warn!("PlayerCore: {}", e);
        }
    }

    fn layout(&self) -> WidgetLayout {
        match self.view.state() {
            ViewState::Hidden => WidgetLayout::Hidden,
            ViewState::Full => WidgetLayout::Fullscreen,
            ViewState::Pip => match &self.drag {
                Some(drag) => {
                    let geometry = drag.geometry();
                    WidgetLayout::Floating {
                        position: geometry.position,
                        size: geometry.size,
                        dragging: drag.is_dragging(),
                    }
                }
                None => WidgetLayout::Floating {
                    position: Point::default(),
                    size: self.widget.pip_size(),
                    dragging: false,
                },
            },
            ViewState::Minimized => {
                let size = self.widget.minimized_size();
                WidgetLayout::Docked {
                    position: dock_bottom_right(self.viewport, size, self.widget.margin),
                    size,
                }
            }
        }
    }

    async fn publish(&mut self) {
        let layout = self.layout();
        let playback = self.controller.state().clone();
        let view_state = self.view.state();
        let notice = self.notice.clone();
        let store = Arc::clone(&self.store);
        let published = store
            .publish(&playback, view_state, &layout, notice.as_ref())
            .await;
        if published.is_some() {
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }
}

/// Feed events from the audio resource into the core loop.
pub fn forward_resource_events(
    mut resource_rx: mpsc::Receiver<ResourceEvent>,
    event_tx: mpsc::Sender<CoreEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = resource_rx.recv().await {
            if event_tx.send(CoreEvent::Resource(ev)).await.is_err() {
                break;
            }
        }
        debug!("PlayerCore: resource forwarder exiting");
    })
}
