use std::collections::BTreeMap;

use bevy::math::DVec3;
use farmbot_protocol::Packet;
use farmbot_protocol::packets::{EquipSlot, Position};

use crate::player::Item;
use crate::session::{SessionError, SessionEvent};

pub type EntityId = u32;

pub fn to_dvec3(position: Position) -> DVec3 {
    DVec3::new(position.x, position.y, position.z)
}

/// An entity the gateway has told us about.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub name: String,
    pub kind: String,
    pub position: Option<DVec3>,
}

impl EntityInfo {
    /// The name if the gateway knows it, otherwise the entity type.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.kind
        } else {
            &self.name
        }
    }
}

/// Client-side mirror of the world state pushed by the gateway.
///
/// Entities are keyed by id, so iteration is in ascending id order.
#[derive(Debug, Default, Clone)]
pub struct WorldView {
    pub self_id: Option<EntityId>,
    pub self_position: Option<DVec3>,
    pub dimension: String,
    pub game_mode: String,
    pub entities: BTreeMap<EntityId, EntityInfo>,
    pub inventory: Vec<Item>,
    pub equipment: BTreeMap<EquipSlot, Item>,
}

impl WorldView {
    pub fn entities(&self) -> impl Iterator<Item = &EntityInfo> {
        self.entities.values()
    }

    pub fn insert_entity(&mut self, entity: EntityInfo) {
        self.entities.insert(entity.id, entity);
    }

    pub fn held_item(&self) -> Option<&Item> {
        self.equipment.get(&EquipSlot::Hand)
    }

    /// Folds a gateway packet into the mirror. Lifecycle packets come back
    /// as events; pure state updates return `None`.
    pub fn apply(&mut self, packet: Packet) -> Option<SessionEvent> {
        match packet {
            Packet::Spawn(spawn) => {
                self.self_id = Some(spawn.entity_id);
                self.self_position = Some(to_dvec3(spawn.position));
                self.dimension = spawn.dimension;
                self.game_mode = spawn.game_mode;
                return Some(SessionEvent::Spawned);
            }
            Packet::Position(update) => {
                self.self_position = Some(to_dvec3(update.position));
            }
            Packet::EntitySpawn(spawn) => {
                if Some(spawn.entity_id) == self.self_id {
                    return None;
                }
                self.insert_entity(EntityInfo {
                    id: spawn.entity_id,
                    name: spawn.name,
                    kind: spawn.kind,
                    position: spawn.position.map(to_dvec3),
                });
            }
            Packet::EntityMove(update) => {
                if let Some(entity) = self.entities.get_mut(&update.entity_id) {
                    entity.position = Some(to_dvec3(update.position));
                }
            }
            Packet::EntityRemove(remove) => {
                for id in remove.entity_ids {
                    self.entities.remove(&id);
                }
            }
            Packet::Inventory(inventory) => {
                self.inventory = inventory.items.into_iter().map(Item::from).collect();
                self.inventory.sort_by_key(|item| item.slot);
            }
            Packet::Equipment(equipment) => match equipment.item {
                Some(item) => {
                    self.equipment.insert(equipment.slot, item.into());
                }
                None => {
                    self.equipment.remove(&equipment.slot);
                }
            },
            Packet::SystemChat(chat) => return Some(SessionEvent::Chat(chat.text)),
            Packet::Kick(kick) => {
                return Some(SessionEvent::Kicked {
                    reason: kick.reason,
                    display_reason: kick.display_reason,
                });
            }
            Packet::Error(error) => {
                return Some(SessionEvent::Errored(SessionError::Gateway(error.message)));
            }
            // Only ever sent by us.
            Packet::Login(_)
            | Packet::Attack(_)
            | Packet::Equip(_)
            | Packet::Chat(_)
            | Packet::Quit(_) => {}
        }
        None
    }
}
