//! Line-oriented console driver: one command per stdin line, each mapped onto
//! a bridge operation.

use nowplaying_proto::protocol::{Command, PlayerSnapshot, ViewEvent, WidgetLayout};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: '{0}'")]
    NotANumber(String),
    #[error("unknown view event '{0}'")]
    UnknownViewEvent(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(Command),
    State,
    Help,
    Quit,
}

pub const HELP: &str = "\
play <album> <song>   start a song
toggle                play / pause
next | prev           move through the album
seek <seconds>        jump within the song
vol <percent>         volume 0-100
view <event>          show | maximize | minimize | enterPip | expand | setHidden
down|move <x> <y>     pointer input on the pip panel
up                    release the pointer
resize <w> <h>        viewport size
state                 print the current state
quit";

fn number(arg: Option<&str>, usage: &'static str) -> Result<f64, ConsoleError> {
    let raw = arg.ok_or(ConsoleError::Usage(usage))?;
    raw.parse::<f64>()
        .map_err(|_| ConsoleError::NotANumber(raw.to_string()))
}

/// Parse one input line.  Blank lines give `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let input = match head.to_ascii_lowercase().as_str() {
        "play" => {
            const USAGE: &str = "play <album> <song>";
            let album_id = words.next().ok_or(ConsoleError::Usage(USAGE))?;
            let song_id = words.next().ok_or(ConsoleError::Usage(USAGE))?;
            ConsoleInput::Command(Command::PlaySong {
                album_id: album_id.to_string(),
                song_id: song_id.to_string(),
            })
        }
        "toggle" | "pause" | "p" => ConsoleInput::Command(Command::PlayPause),
        "next" | "n" => ConsoleInput::Command(Command::Next),
        "prev" | "previous" => ConsoleInput::Command(Command::Previous),
        "seek" => ConsoleInput::Command(Command::Seek {
            seconds: number(words.next(), "seek <seconds>")?,
        }),
        "vol" | "volume" => ConsoleInput::Command(Command::SetVolume {
            percent: number(words.next(), "vol <percent>")?,
        }),
        "view" => {
            let name = words.next().ok_or(ConsoleError::Usage("view <event>"))?;
            let event = ViewEvent::parse(name)
                .ok_or_else(|| ConsoleError::UnknownViewEvent(name.to_string()))?;
            ConsoleInput::Command(Command::View { event })
        }
        "down" => ConsoleInput::Command(Command::PointerDown {
            x: number(words.next(), "down <x> <y>")?,
            y: number(words.next(), "down <x> <y>")?,
        }),
        "move" => ConsoleInput::Command(Command::PointerMove {
            x: number(words.next(), "move <x> <y>")?,
            y: number(words.next(), "move <x> <y>")?,
        }),
        "up" => ConsoleInput::Command(Command::PointerUp),
        "resize" => ConsoleInput::Command(Command::ViewportResize {
            width: number(words.next(), "resize <w> <h>")?,
            height: number(words.next(), "resize <w> <h>")?,
        }),
        "state" | "s" => ConsoleInput::State,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}

fn clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// One status line, the console's stand-in for the persistent player bar.
pub fn render_status(snapshot: &PlayerSnapshot) -> String {
    let playback = &snapshot.playback;
    let transport = match (&playback.current_song, &playback.current_album) {
        (Some(song), Some(album)) => {
            let length = playback.duration.map(clock).unwrap_or_else(|| "--:--".into());
            format!(
                "{} {} / {}  {} / {}",
                if playback.is_playing { "▶" } else { "⏸" },
                song.title,
                album.name,
                clock(playback.current_time),
                length
            )
        }
        _ => "nothing playing".to_string(),
    };

    let layout = match &snapshot.layout {
        WidgetLayout::Hidden => "hidden".to_string(),
        WidgetLayout::Fullscreen => "full".to_string(),
        WidgetLayout::Floating {
            position,
            size,
            dragging,
        } => format!(
            "pip {}x{} at ({}, {}){}",
            size.width,
            size.height,
            position.x,
            position.y,
            if *dragging { " dragging" } else { "" }
        ),
        WidgetLayout::Docked { position, .. } => {
            format!("minimized at ({}, {})", position.x, position.y)
        }
    };

    let mut line = format!(
        "[rev {}] {}  vol {}%  widget: {}",
        snapshot.rev,
        transport,
        (playback.volume * 100.0).round() as u32,
        layout
    );
    if let Some(notice) = &snapshot.notice {
        line.push_str("  ! ");
        line.push_str(&notice.message);
    }
    line
}
