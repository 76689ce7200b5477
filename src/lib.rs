use std::time::Duration;

use bevy::prelude::*;

use crate::config::BotConfig;
use crate::reconnect::policy_for;
use crate::session::SessionEvent;
use crate::states::{CombatPlugin, ConnectionPlugin, LoginPlugin, ReconnectSchedule};

pub mod client;
pub mod combat;
pub mod config;
pub mod diagnostics;
pub mod player;
pub mod reconnect;
pub mod session;
pub mod states;
pub mod world;

/// Main loop frames never sleep longer than this, so session events and
/// timers stay responsive with slow attack intervals.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(50);

#[derive(States, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// State after `event`. The reconnect timer moves Disconnected to
    /// Connecting; that is not a session event.
    pub fn on_event(self, event: &SessionEvent) -> Self {
        match (self, event) {
            (_, SessionEvent::Ended) => ConnectionState::Disconnected,
            (ConnectionState::Connecting, SessionEvent::Spawned) => ConnectionState::Connected,
            (state, _) => state,
        }
    }
}

pub struct BotPlugin {
    config: BotConfig,
}

impl BotPlugin {
    pub fn new(config: BotConfig) -> Self {
        BotPlugin { config }
    }
}

impl Plugin for BotPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .insert_resource(Time::<Fixed>::from_duration(self.config.tick_interval))
            .add_event::<SessionEvent>()
            .insert_resource(ReconnectSchedule::new(policy_for(&self.config)))
            .insert_state(ConnectionState::Connecting)
            .add_plugins((ConnectionPlugin, LoginPlugin, CombatPlugin));
    }
}

/// How long the main loop sleeps between frames for a given tick interval.
pub fn frame_time(config: &BotConfig) -> Duration {
    config.tick_interval.min(MAX_FRAME_TIME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;

    #[test]
    fn spawn_connects_only_while_connecting() {
        assert_eq!(
            ConnectionState::Connecting.on_event(&SessionEvent::Spawned),
            ConnectionState::Connected
        );
        assert_eq!(
            ConnectionState::Disconnected.on_event(&SessionEvent::Spawned),
            ConnectionState::Disconnected
        );
        // Respawning after death keeps the session connected.
        assert_eq!(
            ConnectionState::Connected.on_event(&SessionEvent::Spawned),
            ConnectionState::Connected
        );
    }

    #[test]
    fn end_always_disconnects() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ] {
            assert_eq!(
                state.on_event(&SessionEvent::Ended),
                ConnectionState::Disconnected
            );
        }
    }

    #[test]
    fn informational_events_keep_state() {
        let events = [
            SessionEvent::Chat("Please log in".to_string()),
            SessionEvent::Kicked {
                reason: "Server full".to_string(),
                display_reason: None,
            },
            SessionEvent::Errored(SessionError::Closed),
        ];
        for event in &events {
            assert_eq!(
                ConnectionState::Connected.on_event(event),
                ConnectionState::Connected
            );
            assert_eq!(
                ConnectionState::Connecting.on_event(event),
                ConnectionState::Connecting
            );
        }
    }

    #[test]
    fn frame_time_is_capped() {
        let mut config = BotConfig::default();
        assert_eq!(frame_time(&config), Duration::from_millis(10));
        config.tick_interval = Duration::from_secs(2);
        assert_eq!(frame_time(&config), MAX_FRAME_TIME);
    }
}
