//! View state machine for the floating widget.
//!
//! ```text
//!   hidden ──show──▶ pip ──maximize──▶ full
//!                    ▲ │◀───enterPip────┘
//!                    │ └──minimize──▶ minimized
//!                    └────expand──────────┘
//!   any ──setHidden──▶ hidden
//! ```
//!
//! There is no `full → minimized` edge; minimizing always starts from a pip
//! panel with validated geometry.

use nowplaying_proto::protocol::{ViewEvent, ViewState};
use tracing::debug;

use crate::error::{PlayerError, PlayerResult};

/// Look up `(from, event)` in the transition table.
pub fn transition(from: ViewState, event: ViewEvent) -> Option<ViewState> {
    use ViewEvent::*;
    use ViewState::*;
    match (from, event) {
        (_, SetHidden) => Some(Hidden),
        (Hidden, Show) => Some(Pip),
        (Pip, Maximize) => Some(Full),
        (Pip, Minimize) => Some(Minimized),
        (Full, EnterPip) => Some(Pip),
        (Minimized, Expand) => Some(Pip),
        _ => None,
    }
}

/// Result of applying an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewChange {
    pub from: ViewState,
    pub to: ViewState,
}

impl ViewChange {
    /// The widget becomes draggable with this change.
    pub fn enters_draggable(&self) -> bool {
        self.to.is_draggable() && !self.from.is_draggable()
    }

    pub fn leaves_draggable(&self) -> bool {
        self.from.is_draggable() && !self.to.is_draggable()
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone)]
pub struct ViewMachine {
    state: ViewState,
}

impl ViewMachine {
    /// The widget starts as a pip panel unless the host asks for `hidden`.
    pub fn new(start_hidden: bool) -> Self {
        let state = if start_hidden {
            ViewState::Hidden
        } else {
            ViewState::Pip
        };
        Self { state }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Apply `event`.  Unmatched pairs leave the state untouched and come back
    /// as `InvalidTransition` for the caller to log.
    pub fn apply(&mut self, event: ViewEvent) -> PlayerResult<ViewChange> {
        let from = self.state;
        match transition(from, event) {
            Some(to) => {
                debug!("view: {} --{:?}--> {}", from.label(), event, to.label());
                self.state = to;
                Ok(ViewChange { from, to })
            }
            None => Err(PlayerError::InvalidTransition { from, event }),
        }
    }
}
