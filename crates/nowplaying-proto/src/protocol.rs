use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Album, Song};

/// Inputs accepted by the player core.  Surfaces (persistent bar, floating
/// widget, HTTP API, console) only ever talk to the core through these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    PlaySong { album_id: String, song_id: String },
    PlayPause,
    Next,
    Previous,
    Seek { seconds: f64 },
    /// Volume in percent, `0..=100`.
    SetVolume { percent: f64 },
    View { event: ViewEvent },
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    ViewportResize { width: f64, height: f64 },
}

/// Layout mode of the floating widget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Full,
    #[default]
    Pip,
    Minimized,
    Hidden,
}

impl ViewState {
    pub const ALL: [ViewState; 4] = [
        ViewState::Full,
        ViewState::Pip,
        ViewState::Minimized,
        ViewState::Hidden,
    ];

    /// Only the picture-in-picture panel can be dragged.
    pub fn is_draggable(self) -> bool {
        self == ViewState::Pip
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewState::Full => "full",
            ViewState::Pip => "pip",
            ViewState::Minimized => "minimized",
            ViewState::Hidden => "hidden",
        }
    }
}

/// UI affordances that ask for a view change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViewEvent {
    Show,
    Maximize,
    Minimize,
    EnterPip,
    Expand,
    SetHidden,
}

impl ViewEvent {
    pub const ALL: [ViewEvent; 6] = [
        ViewEvent::Show,
        ViewEvent::Maximize,
        ViewEvent::Minimize,
        ViewEvent::EnterPip,
        ViewEvent::Expand,
        ViewEvent::SetHidden,
    ];

    /// Parses the names used by the HTTP API and console (`enter_pip`,
    /// `enterPip` and `pip` are all accepted).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "show" => Some(ViewEvent::Show),
            "maximize" | "max" | "full" => Some(ViewEvent::Maximize),
            "minimize" | "min" => Some(ViewEvent::Minimize),
            "enterpip" | "pip" => Some(ViewEvent::EnterPip),
            "expand" => Some(ViewEvent::Expand),
            "sethidden" | "hide" | "hidden" => Some(ViewEvent::SetHidden),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Where and how the widget should be drawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WidgetLayout {
    #[default]
    Hidden,
    Fullscreen,
    Floating {
        position: Point,
        size: Size,
        dragging: bool,
    },
    /// Title bar pinned to the bottom-right corner.
    Docked { position: Point, size: Size },
}

/// Transient "couldn't play this track" notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    pub message: String,
    pub song_id: Option<String>,
    pub raised_at: DateTime<Utc>,
}

/// Transport state.  Written only by the playback controller.
///
/// `is_playing` implies `current_song` is set, and `current_song` /
/// `current_album` always change together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackState {
    pub current_song: Option<Song>,
    pub current_album: Option<Album>,
    pub is_playing: bool,
    /// Seconds, within `[0, duration]` once the duration is known.
    pub current_time: f64,
    pub duration: Option<f64>,
    /// `0.0..=1.0`
    pub volume: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_song: None,
            current_album: None,
            is_playing: false,
            current_time: 0.0,
            duration: None,
            volume: 0.8,
        }
    }
}

/// The read model every surface renders from.  `rev` is incremented on every
/// change so consumers can tell a fresh snapshot from one they already drew.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PlayerSnapshot {
    #[serde(default)]
    pub rev: u64,
    pub playback: PlaybackState,
    pub view_state: ViewState,
    pub layout: WidgetLayout,
    pub notice: Option<Notice>,
}

impl PlayerSnapshot {
    pub fn current_song_id(&self) -> Option<&str> {
        self.playback.current_song.as_ref().map(|s| s.song_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = Command::PlaySong {
            album_id: "a1".into(),
            song_id: "s1".into(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"cmd":"play_song","album_id":"a1","song_id":"s1"}"#);

        let view: Command =
            serde_json::from_str(r#"{"cmd":"view","event":"enter_pip"}"#).unwrap();
        assert_eq!(
            view,
            Command::View {
                event: ViewEvent::EnterPip
            }
        );
    }

    #[test]
    fn test_view_event_parse_aliases() {
        assert_eq!(ViewEvent::parse("enterPip"), Some(ViewEvent::EnterPip));
        assert_eq!(ViewEvent::parse("enter_pip"), Some(ViewEvent::EnterPip));
        assert_eq!(ViewEvent::parse("set-hidden"), Some(ViewEvent::SetHidden));
        assert_eq!(ViewEvent::parse("MAXIMIZE"), Some(ViewEvent::Maximize));
        assert_eq!(ViewEvent::parse("spin"), None);
    }

    #[test]
    fn test_layout_is_tagged() {
        let layout = WidgetLayout::Floating {
            position: Point::new(1.0, 2.0),
            size: Size::new(3.0, 4.0),
            dragging: false,
        };
        let v = serde_json::to_value(&layout).unwrap();
        assert_eq!(v["mode"], "floating");
        assert_eq!(v["position"]["x"], 1.0);
    }

    #[test]
    fn test_only_pip_is_draggable() {
        let draggable: Vec<_> = ViewState::ALL
            .iter()
            .filter(|s| s.is_draggable())
            .collect();
        assert_eq!(draggable, vec![&ViewState::Pip]);
    }
}
