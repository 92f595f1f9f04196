//! The shared read model behind the sync bridge.
//!
//! Exactly one writer (the player core) publishes whole snapshots; every
//! surface reads them.  A publish replaces playback, view, layout and notice in
//! one write-lock section, so no reader can observe a half-applied change.

use crate::protocol::{Notice, PlaybackState, PlayerSnapshot, ViewState, WidgetLayout};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct StateStore {
    state: Arc<RwLock<PlayerSnapshot>>,
}

impl StateStore {
    pub fn new(playback: PlaybackState, view_state: ViewState, layout: WidgetLayout) -> Self {
        let snapshot = PlayerSnapshot {
            rev: 1,
            playback,
            view_state,
            layout,
            notice: None,
        };
        Self {
            state: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub async fn get_state(&self) -> PlayerSnapshot {
        self.state.read().await.clone()
    }

    pub async fn rev(&self) -> u64 {
        self.state.read().await.rev
    }

    /// Replace everything at once.  Returns the new revision, or `None` when
    /// nothing differed and the revision was left alone.
    pub async fn publish(
        &self,
        playback: &PlaybackState,
        view_state: ViewState,
        layout: &WidgetLayout,
        notice: Option<&Notice>,
    ) -> Option<u64> {
        let mut state = self.state.write().await;
        if state.playback == *playback
            && state.view_state == view_state
            && state.layout == *layout
            && state.notice.as_ref() == notice
        {
            return None;
        }
        state.playback = playback.clone();
        state.view_state = view_state;
        state.layout = layout.clone();
        state.notice = notice.cloned();
        state.rev += 1;
        Some(state.rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_bumps_rev_only_on_change() {
        let store = StateStore::new(
            PlaybackState::default(),
            ViewState::Pip,
            WidgetLayout::Hidden,
        );
        assert_eq!(store.rev().await, 1);

        let unchanged = store
            .publish(&PlaybackState::default(), ViewState::Pip, &WidgetLayout::Hidden, None)
            .await;
        assert_eq!(unchanged, None);
        assert_eq!(store.rev().await, 1);

        let changed = store
            .publish(
                &PlaybackState::default(),
                ViewState::Full,
                &WidgetLayout::Fullscreen,
                None,
            )
            .await;
        assert_eq!(changed, Some(2));
        let snap = store.get_state().await;
        assert_eq!(snap.view_state, ViewState::Full);
        assert_eq!(snap.layout, WidgetLayout::Fullscreen);
    }
}
