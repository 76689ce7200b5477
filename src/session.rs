use std::io;
use std::net::SocketAddr;

use bevy::math::DVec3;
use bevy::prelude::{Event, Resource};
use thiserror::Error;

use crate::player::{EquipSlot, Item};
use crate::world::{EntityId, EntityInfo, WorldView};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("connection refused by {addr}")]
    Refused { addr: SocketAddr },
    #[error("connection to {addr} timed out")]
    TimedOut { addr: SocketAddr },
    #[error("network error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed data from gateway: {0}")]
    Protocol(String),
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("entity {0} is not in view")]
    UnknownEntity(EntityId),
    #[error("gateway is not reading ({buffered} bytes unsent)")]
    Backlog { buffered: usize },
    #[error("session is closed")]
    Closed,
}

/// Lifecycle notifications surfaced by a session.
#[derive(Event, Debug)]
pub enum SessionEvent {
    Spawned,
    Chat(String),
    Kicked {
        reason: String,
        display_reason: Option<String>,
    },
    /// Always followed by `Ended` when the error is fatal to the session.
    Errored(SessionError),
    Ended,
}

/// A live connection to the game, as seen by the bot.
///
/// State accessors read a client-side mirror; actions are forwarded to the
/// game and may fail.
pub trait Session: Send + Sync {
    fn world(&self) -> &WorldView;

    fn self_position(&self) -> Option<DVec3> {
        self.world().self_position
    }

    /// Visible entities in the session's iteration order.
    fn entities(&self) -> Result<Vec<EntityInfo>, SessionError> {
        Ok(self.world().entities().cloned().collect())
    }

    fn inventory_items(&self) -> Vec<Item> {
        self.world().inventory.clone()
    }

    fn equipped(&self, slot: EquipSlot) -> Option<Item> {
        self.world().equipment.get(&slot).cloned()
    }

    fn attack(&mut self, target: EntityId) -> Result<(), SessionError>;

    fn equip(&mut self, item: &Item, slot: EquipSlot) -> Result<(), SessionError>;

    fn send_chat(&mut self, text: &str) -> Result<(), SessionError>;

    /// Drains pending network input and returns the resulting events.
    fn poll_events(&mut self) -> Vec<SessionEvent>;

    fn quit(&mut self, reason: &str);
}

/// The current session, present from connect until the session ends.
#[derive(Resource)]
pub struct BotSession(pub Box<dyn Session>);

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;

    use super::*;

    /// In-memory session that records every action.
    #[derive(Default)]
    pub struct MockSession {
        pub world: WorldView,
        pub events: VecDeque<SessionEvent>,
        pub attacks: Vec<EntityId>,
        pub equips: Vec<(u8, EquipSlot)>,
        pub chats: Vec<String>,
        pub quit_reason: Option<String>,
        pub fail_entities: bool,
        pub fail_attack: bool,
        pub fail_equip: bool,
        /// Every equip call, including failed ones.
        pub equip_attempts: usize,
    }

    impl MockSession {
        pub fn add_entity(&mut self, id: EntityId, name: &str, position: Option<DVec3>) {
            self.world.insert_entity(EntityInfo {
                id,
                name: name.to_string(),
                kind: "mob".to_string(),
                position,
            });
        }
    }

    impl Session for MockSession {
        fn world(&self) -> &WorldView {
            &self.world
        }

        fn entities(&self) -> Result<Vec<EntityInfo>, SessionError> {
            if self.fail_entities {
                return Err(SessionError::Protocol("entity list unavailable".to_string()));
            }
            Ok(self.world.entities().cloned().collect())
        }

        fn attack(&mut self, target: EntityId) -> Result<(), SessionError> {
            if self.fail_attack {
                return Err(SessionError::UnknownEntity(target));
            }
            self.attacks.push(target);
            Ok(())
        }

        fn equip(&mut self, item: &Item, slot: EquipSlot) -> Result<(), SessionError> {
            self.equip_attempts += 1;
            if self.fail_equip {
                return Err(SessionError::Closed);
            }
            self.equips.push((item.slot, slot));
            self.world.equipment.insert(slot, item.clone());
            Ok(())
        }

        fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
            self.chats.push(text.to_string());
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<SessionEvent> {
            self.events.drain(..).collect()
        }

        fn quit(&mut self, reason: &str) {
            self.quit_reason = Some(reason.to_string());
        }
    }
}
