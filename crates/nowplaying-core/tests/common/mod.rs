//! Shared fixtures: an in-memory audio resource and a small catalog.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use nowplaying_core::core::{CoreEvent, PlayerCore};
use nowplaying_core::playback::PlaybackController;
use nowplaying_core::resource::{AudioResource, LoadToken, ResourceEvent};
use nowplaying_core::BroadcastMessage;
use nowplaying_proto::catalog::Catalog;
use nowplaying_proto::config::Config;
use nowplaying_proto::protocol::{Command, PlayerSnapshot};
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(LoadToken, String),
    Play(LoadToken),
    Pause,
    Seek(f64),
    Volume(f32),
    Release,
}

/// Records every call; can be told to refuse `play`.
#[derive(Clone, Default)]
pub struct FakeResource {
    calls: Arc<Mutex<Vec<Call>>>,
    refuse_play: Arc<AtomicBool>,
}

impl FakeResource {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> LoadToken {
        self.calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Load(token, _) => Some(*token),
                _ => None,
            })
            .expect("nothing loaded")
    }

    pub fn refuse_play(&self, refuse: bool) {
        self.refuse_play.store(refuse, Ordering::SeqCst);
    }

    pub fn released(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Release).count()
    }
}

impl AudioResource for FakeResource {
    fn load(&mut self, token: LoadToken, source: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Load(token, source.to_string()));
        Ok(())
    }

    fn play(&mut self, token: LoadToken) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Play(token));
        if self.refuse_play.load(Ordering::SeqCst) {
            anyhow::bail!("NotAllowedError: play() requires a user gesture");
        }
        Ok(())
    }

    fn pause(&mut self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Pause);
        Ok(())
    }

    fn seek(&mut self, position_secs: f64) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Seek(position_secs));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Volume(volume));
        Ok(())
    }

    fn release(&mut self) {
        self.calls.lock().unwrap().push(Call::Release);
    }
}

pub const CATALOG: &str = r#"{
    "albums": [
        {
            "album_id": "A", "name": "Two Songs", "type": "EP",
            "cover": "https://cdn.example.org/A.jpg", "date": "2022-09-30",
            "artists": [{"artist_id": "ar1", "name": "Porch Light"}],
            "songs": [
                {"song_id": "s1", "title": "First", "audio_file": "https://cdn.example.org/s1.mp3", "album_id": "A", "duration": 200.0},
                {"song_id": "s2", "title": "Second", "audio_file": "https://cdn.example.org/s2.mp3", "album_id": "A", "duration": 150.0}
            ]
        },
        {
            "album_id": "B", "name": "Single", "type": "single",
            "cover": "https://cdn.example.org/B.jpg", "date": "2024-02-14",
            "songs": [
                {"song_id": "b1", "title": "Only", "audio_file": "https://cdn.example.org/b1.mp3", "album_id": "B"}
            ]
        }
    ]
}"#;

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::parse(CATALOG).expect("fixture catalog parses"))
}

pub struct Harness {
    pub core: PlayerCore<FakeResource, Catalog>,
    pub fake: FakeResource,
    pub event_rx: mpsc::Receiver<CoreEvent>,
    pub broadcast_rx: broadcast::Receiver<BroadcastMessage>,
}

impl Harness {
    pub fn new(config: &Config) -> Self {
        let fake = FakeResource::default();
        let controller = PlaybackController::new(fake.clone(), config.player.default_volume);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(64);
        let core = PlayerCore::new(controller, catalog(), config, broadcast_tx, event_tx);
        Self {
            core,
            fake,
            event_rx,
            broadcast_rx,
        }
    }

    pub async fn command(&mut self, cmd: Command) -> PlayerSnapshot {
        self.core.handle_event(CoreEvent::Command(cmd)).await;
        self.snapshot().await
    }

    pub async fn resource(&mut self, ev: ResourceEvent) -> PlayerSnapshot {
        self.core.handle_event(CoreEvent::Resource(ev)).await;
        self.snapshot().await
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        self.core.store().get_state().await
    }
}

pub fn play(album: &str, song: &str) -> Command {
    Command::PlaySong {
        album_id: album.to_string(),
        song_id: song.to_string(),
    }
}
