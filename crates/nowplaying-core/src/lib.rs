pub mod bridge;
pub mod console;
pub mod core;
pub mod drag;
pub mod error;
pub mod http;
pub mod mpv;
pub mod playback;
pub mod resource;
pub mod view;

/// What the PlayerCore broadcasts to every subscribed surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastMessage {
    /// The snapshot changed; receivers should re-read it from the store.
    StateUpdated,
}
