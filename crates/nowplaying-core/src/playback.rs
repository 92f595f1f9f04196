//! Playback controller: the only owner of the audio resource and the only
//! writer of `PlaybackState`.

use nowplaying_proto::catalog::{Album, Song};
use nowplaying_proto::protocol::PlaybackState;
use tracing::{debug, info, warn};

use crate::error::{PlayerError, PlayerResult};
use crate::resource::{AudioResource, LoadToken, ResourceEvent};

/// Clamp a requested position into `[0, duration]` (upper bound only when the
/// duration is known).
pub fn clamp_position(t: f64, duration: Option<f64>) -> f64 {
    let t = t.max(0.0);
    match duration {
        Some(d) => t.min(d),
        None => t,
    }
}

pub struct PlaybackController<R: AudioResource> {
    resource: R,
    state: PlaybackState,
    /// Token of the source currently assigned to the resource.
    token: LoadToken,
    /// The current source played to its end and was unloaded by the resource.
    source_ended: bool,
    released: bool,
}

impl<R: AudioResource> PlaybackController<R> {
    pub fn new(mut resource: R, volume: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        if let Err(e) = resource.set_volume(volume) {
            warn!("playback: initial volume not applied: {:#}", e);
        }
        Self {
            resource,
            state: PlaybackState {
                volume,
                ..PlaybackState::default()
            },
            token: LoadToken::default(),
            source_ended: false,
            released: false,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn token(&self) -> LoadToken {
        self.token
    }

    /// Replace whatever is playing with `song` from `album`.
    pub fn play_song(&mut self, song: Song, album: Album) -> PlayerResult<()> {
        if song.album_id != album.album_id || album.position_of(&song.song_id).is_none() {
            return Err(PlayerError::MissingCatalogData(format!(
                "song {} is not on album {}",
                song.song_id, album.album_id
            )));
        }

        if self.state.is_playing {
            if let Err(e) = self.resource.pause() {
                debug!("playback: pause before reload failed: {:#}", e);
            }
        }

        self.token = self.token.next();
        let token = self.token;
        info!(
            "playback: {} '{}' from '{}' ({})",
            token, song.title, album.name, song.audio_file
        );

        self.source_ended = false;
        self.state.current_time = 0.0;
        self.state.duration = song.duration.filter(|d| d.is_finite() && *d > 0.0);
        self.state.is_playing = true;
        let source = song.audio_file.clone();
        let song_id = song.song_id.clone();
        self.state.current_song = Some(song);
        self.state.current_album = Some(album);

        let requested = self
            .resource
            .load(token, &source)
            .and_then(|_| self.resource.play(token));
        if let Err(e) = requested {
            self.state.is_playing = false;
            return Err(PlayerError::PlaybackStart {
                song_id,
                reason: format!("{:#}", e),
            });
        }
        Ok(())
    }

    pub fn play_pause(&mut self) -> PlayerResult<()> {
        let Some(song) = self.state.current_song.clone() else {
            debug!("playback: toggle with nothing loaded");
            return Ok(());
        };

        if self.state.is_playing {
            if let Err(e) = self.resource.pause() {
                warn!("playback: pause failed: {:#}", e);
            }
            self.state.is_playing = false;
            info!("playback: paused at {:.1}s", self.state.current_time);
            return Ok(());
        }

        if self.source_ended {
            if let Some(album) = self.state.current_album.clone() {
                info!("playback: restarting '{}' after it ended", song.title);
                return self.play_song(song, album);
            }
        }

        self.state.is_playing = true;
        if let Err(e) = self.resource.play(self.token) {
            self.state.is_playing = false;
            return Err(PlayerError::PlaybackStart {
                song_id: song.song_id,
                reason: format!("{:#}", e),
            });
        }
        info!("playback: resumed at {:.1}s", self.state.current_time);
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64) -> PlayerResult<()> {
        if self.state.current_song.is_none() {
            return Ok(());
        }
        if seconds.is_nan() {
            warn!("playback: ignoring seek to {}", seconds);
            return Ok(());
        }
        // the resource has unloaded the source; the next toggle starts over
        if self.source_ended {
            debug!("playback: seek after the source ended");
            return Ok(());
        }
        let target = clamp_position(seconds, self.state.duration);
        if !target.is_finite() {
            warn!("playback: ignoring seek to {}", seconds);
            return Ok(());
        }
        if let Err(e) = self.resource.seek(target) {
            warn!("playback: seek to {:.1}s failed: {:#}", target, e);
        }
        self.state.current_time = target;
        Ok(())
    }

    pub fn next(&mut self) -> PlayerResult<()> {
        let (song, album) = self.current_pair("next")?;
        let idx = Self::index_in(&song, &album)?;
        match album.songs.get(idx + 1).cloned() {
            Some(following) => self.play_song(following, album),
            None => {
                info!("playback: end of album '{}'", album.name);
                if self.state.is_playing && !self.source_ended {
                    if let Err(e) = self.resource.pause() {
                        debug!("playback: pause at end of album failed: {:#}", e);
                    }
                }
                self.state.is_playing = false;
                Ok(())
            }
        }
    }

    pub fn previous(&mut self) -> PlayerResult<()> {
        let (song, album) = self.current_pair("previous")?;
        let idx = Self::index_in(&song, &album)?;
        if idx == 0 {
            debug!("playback: already at the first song");
            return Ok(());
        }
        let earlier = album.songs[idx - 1].clone();
        self.play_song(earlier, album)
    }

    /// `percent` is `0..=100`; the resource takes `0.0..=1.0`.
    pub fn set_volume(&mut self, percent: f64) -> PlayerResult<()> {
        if !percent.is_finite() {
            warn!("playback: ignoring volume {}", percent);
            return Ok(());
        }
        let volume = (percent.clamp(0.0, 100.0) / 100.0) as f32;
        if let Err(e) = self.resource.set_volume(volume) {
            warn!("playback: set volume failed: {:#}", e);
        }
        self.state.volume = volume;
        Ok(())
    }

    /// Fold one resource event into the state.  Events for a replaced source
    /// are dropped.
    pub fn on_resource_event(&mut self, event: ResourceEvent) -> PlayerResult<()> {
        if event.token() != self.token {
            debug!(
                "playback: dropping stale {:?} (current {})",
                event, self.token
            );
            return Ok(());
        }

        match event {
            ResourceEvent::Started { .. } => {
                debug!("playback: {} started", self.token);
                Ok(())
            }
            ResourceEvent::TimeUpdate { position, .. } => {
                if position.is_finite() {
                    self.state.current_time = clamp_position(position, self.state.duration);
                }
                Ok(())
            }
            ResourceEvent::DurationChanged { duration, .. } => {
                if duration.is_finite() && duration > 0.0 {
                    self.state.duration = Some(duration);
                    self.state.current_time =
                        clamp_position(self.state.current_time, self.state.duration);
                }
                Ok(())
            }
            ResourceEvent::Ended { .. } => {
                info!("playback: {} ended", self.token);
                self.source_ended = true;
                if let Some(d) = self.state.duration {
                    self.state.current_time = d;
                }
                self.next()
            }
            ResourceEvent::Rejected { reason, .. } => {
                self.state.is_playing = false;
                let song_id = self
                    .state
                    .current_song
                    .as_ref()
                    .map(|s| s.song_id.clone())
                    .unwrap_or_default();
                Err(PlayerError::PlaybackStart { song_id, reason })
            }
        }
    }

    /// Pause, clear the source and detach.  Idempotent; also run on drop.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.state.is_playing = false;
        self.resource.release();
        info!("playback: resource released");
    }

    fn current_pair(&self, op: &str) -> PlayerResult<(Song, Album)> {
        match (&self.state.current_song, &self.state.current_album) {
            (Some(song), Some(album)) => Ok((song.clone(), album.clone())),
            _ => Err(PlayerError::MissingCatalogData(format!(
                "{} with no current album",
                op
            ))),
        }
    }

    fn index_in(song: &Song, album: &Album) -> PlayerResult<usize> {
        album.position_of(&song.song_id).ok_or_else(|| {
            PlayerError::MissingCatalogData(format!(
                "song {} not found on album {}",
                song.song_id, album.album_id
            ))
        })
    }
}

impl<R: AudioResource> Drop for PlaybackController<R> {
    fn drop(&mut self) {
        self.release();
    }
}
