use std::collections::BTreeMap;

use farmbot_protocol::Packet;
use farmbot_protocol::packets::{
    EntityMovePacket, EntityRemovePacket, EntitySpawnPacket, Position,
};
use rand::Rng;
use rand::rngs::StdRng;

pub const MOB_HEALTH: f32 = 20.0;
pub const SWORD_DAMAGE: f32 = 6.0;
pub const FIST_DAMAGE: f32 = 1.0;
/// Blocks per tick.
pub const MOB_SPEED: f64 = 0.1;
/// Mobs stop approaching at this distance.
pub const MOB_REACH: f64 = 1.5;
pub const RESPAWN_TICKS: u32 = 100;
pub const SPAWN_RADIUS: f64 = 8.0;

const PASSIVE_MOBS: [&str; 5] = ["cow", "sheep", "pig", "chicken", "villager"];

fn kind_of(name: &str) -> &'static str {
    if PASSIVE_MOBS.contains(&name) {
        "animal"
    } else {
        "hostile"
    }
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub name: String,
    pub position: Position,
    pub health: f32,
}

/// Scripted mobs around a single player. Each session owns one.
pub struct SandboxWorld {
    rng: StdRng,
    next_id: u32,
    player: Position,
    mobs: BTreeMap<u32, Mob>,
    /// Ticks left before a mob of that type comes back.
    respawns: Vec<(u32, String)>,
}

impl SandboxWorld {
    pub fn new(rng: StdRng, first_id: u32, player: Position) -> Self {
        SandboxWorld {
            rng,
            next_id: first_id,
            player,
            mobs: BTreeMap::new(),
            respawns: Vec::new(),
        }
    }

    pub fn mobs(&self) -> &BTreeMap<u32, Mob> {
        &self.mobs
    }

    /// Places a mob at a random spot near the player.
    pub fn spawn(&mut self, name: &str) -> Packet {
        let position = Position::new(
            self.player.x + self.rng.random_range(-SPAWN_RADIUS..SPAWN_RADIUS),
            self.player.y,
            self.player.z + self.rng.random_range(-SPAWN_RADIUS..SPAWN_RADIUS),
        );
        self.spawn_at(name, position)
    }

    pub fn spawn_at(&mut self, name: &str, position: Position) -> Packet {
        let id = self.next_id;
        self.next_id += 1;
        self.mobs.insert(
            id,
            Mob {
                name: name.to_string(),
                position,
                health: MOB_HEALTH,
            },
        );
        Packet::EntitySpawn(EntitySpawnPacket {
            entity_id: id,
            name: name.to_string(),
            kind: kind_of(name).to_string(),
            position: Some(position),
        })
    }

    /// Moves hostile mobs toward the player and brings back dead ones.
    pub fn step(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        let player = self.player;
        for (&id, mob) in self.mobs.iter_mut() {
            if kind_of(&mob.name) != "hostile" {
                continue;
            }
            let (dx, dz) = (player.x - mob.position.x, player.z - mob.position.z);
            let distance = (dx * dx + dz * dz).sqrt();
            if distance <= MOB_REACH {
                continue;
            }
            let step = MOB_SPEED.min(distance - MOB_REACH);
            mob.position.x += dx / distance * step;
            mob.position.z += dz / distance * step;
            packets.push(Packet::EntityMove(EntityMovePacket {
                entity_id: id,
                position: mob.position,
            }));
        }

        let mut due = Vec::new();
        self.respawns.retain_mut(|(ticks, name)| {
            *ticks = ticks.saturating_sub(1);
            if *ticks == 0 {
                due.push(std::mem::take(name));
                false
            } else {
                true
            }
        });
        for name in due {
            packets.push(self.spawn(&name));
        }
        packets
    }

    /// Applies one hit. Returns the removal packet when the mob dies.
    pub fn attack(&mut self, id: u32, damage: f32) -> Result<Option<Packet>, String> {
        let mob = self
            .mobs
            .get_mut(&id)
            .ok_or_else(|| format!("Entity {id} does not exist"))?;
        mob.health -= damage;
        if mob.health > 0.0 {
            return Ok(None);
        }
        if let Some(mob) = self.mobs.remove(&id) {
            self.respawns.push((RESPAWN_TICKS, mob.name));
        }
        Ok(Some(Packet::EntityRemove(EntityRemovePacket {
            entity_ids: vec![id],
        })))
    }
}
