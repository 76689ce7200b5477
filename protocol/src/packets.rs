use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }
}

/// Equipment destinations, in the order the game reports them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EquipSlot {
    Hand,
    Head,
    Chest,
    Legs,
    Feet,
    OffHand,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 6] = [
        EquipSlot::Hand,
        EquipSlot::Head,
        EquipSlot::Chest,
        EquipSlot::Legs,
        EquipSlot::Feet,
        EquipSlot::OffHand,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EquipSlot::Hand => "Hand",
            EquipSlot::Head => "Head",
            EquipSlot::Chest => "Chest",
            EquipSlot::Legs => "Legs",
            EquipSlot::Feet => "Feet",
            EquipSlot::OffHand => "Off-hand",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    /// Inventory slot the stack sits in.
    pub slot: u8,
    /// Numeric item type. Older game versions only expose this.
    pub type_id: u16,
    pub name: String,
    pub count: u8,
}

// Client -> gateway

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoginPacket {
    pub username: String,
    pub password: Option<String>,
    /// None lets the gateway autodetect the game version.
    pub protocol_version: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AttackPacket {
    pub entity_id: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EquipPacket {
    pub inventory_slot: u8,
    pub destination: EquipSlot,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatPacket {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuitPacket {
    pub reason: String,
}

// Gateway -> client

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpawnPacket {
    pub entity_id: u32,
    pub position: Position,
    pub dimension: String,
    pub game_mode: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PositionPacket {
    pub position: Position,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EntitySpawnPacket {
    pub entity_id: u32,
    /// Registry name such as "zombie". Empty when the gateway does not know it.
    pub name: String,
    /// Broad entity type such as "hostile", "animal" or "player".
    pub kind: String,
    pub position: Option<Position>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EntityMovePacket {
    pub entity_id: u32,
    pub position: Position,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EntityRemovePacket {
    pub entity_ids: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InventoryPacket {
    pub items: Vec<ItemStack>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EquipmentPacket {
    pub slot: EquipSlot,
    pub item: Option<ItemStack>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KickPacket {
    pub reason: String,
    pub display_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorPacket {
    pub message: String,
}
