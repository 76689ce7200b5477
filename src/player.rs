use bevy::log::{debug, error, warn};
use farmbot_protocol::packets::ItemStack;

pub use farmbot_protocol::packets::EquipSlot;

use crate::session::Session;

/// Hotbar slots come first in the inventory.
pub const HOTBAR_SLOTS: u8 = 9;

/// Sword item ids from the numeric-id era, wooden through netherite.
pub const LEGACY_SWORD_TYPE_IDS: [u16; 18] = [
    268, 269, 270, 271, 272, 273, 474, 475, 476, 477, 478, 279, 283, 284, 285, 286, 287, 288,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub slot: u8,
    pub type_id: u16,
    pub name: String,
    pub count: u8,
}

impl From<ItemStack> for Item {
    fn from(stack: ItemStack) -> Self {
        Item {
            slot: stack.slot,
            type_id: stack.type_id,
            name: stack.name,
            count: stack.count,
        }
    }
}

impl Item {
    pub fn is_weapon(&self) -> bool {
        self.name.to_lowercase().contains("sword") || LEGACY_SWORD_TYPE_IDS.contains(&self.type_id)
    }

    pub fn is_hotbar(&self) -> bool {
        self.slot < HOTBAR_SLOTS
    }
}

pub fn find_weapon(items: &[Item]) -> Option<&Item> {
    items.iter().find(|item| item.is_weapon())
}

/// Puts the first weapon in the inventory into the main hand.
///
/// Returns false when there is no weapon or the equip call fails. The
/// caller decides whether to attack bare-handed.
pub fn equip_weapon(session: &mut dyn Session) -> bool {
    let items = session.inventory_items();
    let Some(weapon) = find_weapon(&items) else {
        warn!("No sword found in inventory! Listing contents:");
        for item in &items {
            warn!("    {} x{} (slot {})", item.name, item.count, item.slot);
        }
        return false;
    };

    match session.equip(weapon, EquipSlot::Hand) {
        Ok(()) => {
            debug!("Equipped: {} (slot {})", weapon.name, weapon.slot);
            true
        }
        Err(e) => {
            error!("Failed to equip sword: {e}");
            false
        }
    }
}
