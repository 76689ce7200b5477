use serde::{Deserialize, Serialize};

pub mod packets;

use packets::*;

/// Frames longer than this are treated as a corrupt stream.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Packet {
    // Client -> gateway
    Login(LoginPacket),
    Attack(AttackPacket),
    Equip(EquipPacket),
    Chat(ChatPacket),
    Quit(QuitPacket),
    // Gateway -> client
    Spawn(SpawnPacket),
    Position(PositionPacket),
    EntitySpawn(EntitySpawnPacket),
    EntityMove(EntityMovePacket),
    EntityRemove(EntityRemovePacket),
    Inventory(InventoryPacket),
    Equipment(EquipmentPacket),
    SystemChat(ChatPacket),
    Kick(KickPacket),
    Error(ErrorPacket),
}

/// Encodes packets as COBS frames. Every frame ends with a zero byte, so a
/// reader can split a byte stream without a length prefix.
#[derive(Default, Clone, Copy)]
pub struct PacketCodec;

impl PacketCodec {
    pub fn write(&self, packet: &Packet) -> anyhow::Result<Vec<u8>> {
        Ok(postcard::to_allocvec_cobs(packet)?)
    }

    /// Decodes a single frame, including its trailing zero byte.
    pub fn read(&self, frame: &mut [u8]) -> anyhow::Result<Packet> {
        Ok(postcard::from_bytes_cobs(frame)?)
    }
}

/// Accumulates bytes read from a stream and hands out complete packets.
#[derive(Default)]
pub struct FrameReader {
    codec: PacketCodec,
    pending: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Returns the next complete packet, `Ok(None)` if more bytes are needed.
    pub fn next_packet(&mut self) -> anyhow::Result<Option<Packet>> {
        // Stray delimiters
        let leading = self.pending.iter().take_while(|&&b| b == 0).count();
        self.pending.drain(..leading);

        let Some(end) = self.pending.iter().position(|&b| b == 0) else {
            if self.pending.len() > MAX_FRAME_LEN {
                let len = self.pending.len();
                self.pending.clear();
                anyhow::bail!("Frame exceeds {MAX_FRAME_LEN} bytes ({len} buffered)");
            }
            return Ok(None);
        };
        let mut frame: Vec<u8> = self.pending.drain(..=end).collect();
        self.codec.read(&mut frame).map(Some)
    }

    /// Bytes of an incomplete frame still waiting for the rest.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}
