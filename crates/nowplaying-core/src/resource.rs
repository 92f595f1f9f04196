//! The audio-decoding resource seam.
//!
//! Exactly one resource exists per player, owned by the playback controller.
//! Every call is fire-and-forget: an `Err` means the request could not even be
//! issued, while outcomes that take time (playback started, decode failure,
//! end of track, clock ticks) come back as `ResourceEvent`s on the channel the
//! resource was built with.  Each event carries the `LoadToken` of the source
//! it refers to so the controller can drop events for a source it has already
//! replaced.

use std::fmt;

/// Identity of one source assignment.  Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LoadToken(pub u64);

impl LoadToken {
    pub fn next(self) -> Self {
        LoadToken(self.0 + 1)
    }
}

impl fmt::Display for LoadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    /// Audio is actually flowing.
    Started { token: LoadToken },
    /// Periodic clock update, seconds.
    TimeUpdate { token: LoadToken, position: f64 },
    DurationChanged { token: LoadToken, duration: f64 },
    /// Playback reached the end of the source.
    Ended { token: LoadToken },
    /// The start-playback request was refused or decoding failed.
    Rejected { token: LoadToken, reason: String },
}

impl ResourceEvent {
    pub fn token(&self) -> LoadToken {
        match self {
            ResourceEvent::Started { token }
            | ResourceEvent::TimeUpdate { token, .. }
            | ResourceEvent::DurationChanged { token, .. }
            | ResourceEvent::Ended { token }
            | ResourceEvent::Rejected { token, .. } => *token,
        }
    }
}

pub trait AudioResource: Send {
    /// Point the resource at a new source, replacing whatever was loaded.
    fn load(&mut self, token: LoadToken, source: &str) -> anyhow::Result<()>;
    /// Ask the resource to start (or resume) the source tagged `token`.
    fn play(&mut self, token: LoadToken) -> anyhow::Result<()>;
    fn pause(&mut self) -> anyhow::Result<()>;
    fn seek(&mut self, position_secs: f64) -> anyhow::Result<()>;
    /// `0.0..=1.0`
    fn set_volume(&mut self, volume: f32) -> anyhow::Result<()>;
    /// Pause, clear the source and detach listeners.  Called once, on teardown.
    fn release(&mut self);
}
