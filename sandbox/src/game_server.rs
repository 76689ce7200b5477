use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::bail;
use dashmap::DashMap;
use farmbot_protocol::packets::{
    ChatPacket, EquipSlot, EquipmentPacket, ErrorPacket, InventoryPacket, ItemStack, KickPacket,
    LoginPacket, Position, SpawnPacket,
};
use farmbot_protocol::{FrameReader, Packet, PacketCodec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::world::{FIST_DAMAGE, SWORD_DAMAGE, SandboxWorld};

pub const SPAWN_POSITION: Position = Position::new(0.5, 64.0, 0.5);

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub version: String,
    pub inventory: Vec<ItemStack>,
    pub mobs: Vec<String>,
    /// Enables the auth-plugin prompt.
    pub login_password: Option<String>,
    /// Usernames kicked right after login.
    pub kick: Vec<String>,
    pub tick: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            version: "1.21.1".to_string(),
            inventory: vec![item_stack(0, "iron_sword")],
            mobs: ["zombie", "skeleton", "spider", "cow", "sheep"]
                .map(String::from)
                .to_vec(),
            login_password: None,
            kick: Vec::new(),
            tick: Duration::from_millis(50),
        }
    }
}

pub fn item_stack(slot: u8, name: &str) -> ItemStack {
    ItemStack {
        slot,
        type_id: 0,
        name: name.to_string(),
        count: 1,
    }
}

pub struct GameServer {
    config: SandboxConfig,
    online: DashMap<String, SocketAddr>,
    next_player_id: AtomicU32,
}

impl GameServer {
    pub fn new(config: SandboxConfig) -> Self {
        GameServer {
            config,
            online: DashMap::new(),
            next_player_id: AtomicU32::new(1),
        }
    }

    pub async fn listen(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                match server.handle_connection(socket, peer).await {
                    Ok(()) => info!(%peer, "Connection closed"),
                    Err(e) => warn!(%peer, err = %e, "Connection ended with error"),
                }
            });
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer: SocketAddr) -> anyhow::Result<()> {
        socket.set_nodelay(true)?;
        let mut link = Link::new(socket);

        let login = match link.read_packet().await? {
            Some(Packet::Login(login)) => login,
            Some(other) => bail!("Expected Login, got {other:?}"),
            None => return Ok(()),
        };
        info!(%peer, username = %login.username, "Login");

        if let Some(reason) = self.refusal(&login) {
            info!(%peer, username = %login.username, ?reason, "Refusing login");
            return link.send(&[reason]).await;
        }

        self.online.insert(login.username.clone(), peer);
        let result = self.play(&mut link, &login).await;
        self.online.remove(&login.username);
        result
    }

    fn refusal(&self, login: &LoginPacket) -> Option<Packet> {
        if let Some(version) = &login.protocol_version {
            if *version != self.config.version {
                return Some(Packet::Error(ErrorPacket {
                    message: format!(
                        "Unsupported protocol version {version}, server runs {}",
                        self.config.version
                    ),
                }));
            }
        }
        if self.config.kick.contains(&login.username) {
            return Some(kick("You are not whitelisted on this server!"));
        }
        if self.online.contains_key(&login.username) {
            return Some(kick("You are already logged in from another location"));
        }
        None
    }

    async fn play(&self, link: &mut Link, login: &LoginPacket) -> anyhow::Result<()> {
        let player_id = self.next_player_id.fetch_add(1, Ordering::Relaxed);
        let mut world = SandboxWorld::new(StdRng::from_os_rng(), 1000, SPAWN_POSITION);
        let mut held: Option<ItemStack> = None;
        let mut authenticated = self.config.login_password.is_none();

        let mut greeting = vec![
            Packet::Spawn(SpawnPacket {
                entity_id: player_id,
                position: SPAWN_POSITION,
                dimension: "overworld".to_string(),
                game_mode: "survival".to_string(),
            }),
            Packet::Inventory(InventoryPacket {
                items: self.config.inventory.clone(),
            }),
            chat(&format!("Welcome to the sandbox, {}!", login.username)),
        ];
        if !authenticated {
            greeting.push(chat("Please log in with /login <password>"));
        }
        for name in &self.config.mobs {
            greeting.push(world.spawn(name));
        }
        link.send(&greeting).await?;
        debug!(
            username = %login.username,
            mobs = world.mobs().len(),
            "Greeting sent"
        );

        let mut ticker = tokio::time::interval(self.config.tick);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let updates = world.step();
                    if !updates.is_empty() {
                        link.send(&updates).await?;
                    }
                }
                packet = link.read_packet() => {
                    let Some(packet) = packet? else {
                        return Ok(());
                    };
                    let mut replies = Vec::new();
                    match packet {
                        Packet::Attack(attack) if !authenticated => {
                            debug!(entity = attack.entity_id, "Attack before login ignored");
                            replies.push(chat("Please log in first"));
                        }
                        Packet::Attack(attack) => {
                            let damage = match &held {
                                Some(item) if item.name.contains("sword") => SWORD_DAMAGE,
                                _ => FIST_DAMAGE,
                            };
                            match world.attack(attack.entity_id, damage) {
                                Ok(removed) => replies.extend(removed),
                                Err(message) => replies.push(Packet::Error(ErrorPacket { message })),
                            }
                        }
                        Packet::Equip(equip) => {
                            let item = self
                                .config
                                .inventory
                                .iter()
                                .find(|item| item.slot == equip.inventory_slot)
                                .cloned();
                            let Some(item) = item else {
                                replies.push(Packet::Error(ErrorPacket {
                                    message: format!("Slot {} is empty", equip.inventory_slot),
                                }));
                                link.send(&replies).await?;
                                continue;
                            };
                            if equip.destination == EquipSlot::Hand {
                                held = Some(item.clone());
                            }
                            replies.push(Packet::Equipment(EquipmentPacket {
                                slot: equip.destination,
                                item: Some(item),
                            }));
                        }
                        Packet::Chat(message) => {
                            if let Some(password) = message.text.strip_prefix("/login ") {
                                if self.config.login_password.as_deref() == Some(password) {
                                    authenticated = true;
                                    replies.push(chat("Successfully logged in!"));
                                } else {
                                    link.send(&[kick("Wrong password")]).await?;
                                    return Ok(());
                                }
                            } else {
                                debug!(username = %login.username, text = %message.text, "Chat");
                            }
                        }
                        Packet::Quit(quit) => {
                            info!(username = %login.username, reason = %quit.reason, "Quit");
                            return Ok(());
                        }
                        other => bail!("Unexpected packet from client: {other:?}"),
                    }
                    if !replies.is_empty() {
                        link.send(&replies).await?;
                    }
                }
            }
        }
    }
}

fn chat(text: &str) -> Packet {
    Packet::SystemChat(ChatPacket {
        text: text.to_string(),
    })
}

fn kick(reason: &str) -> Packet {
    Packet::Kick(KickPacket {
        reason: reason.to_string(),
        display_reason: None,
    })
}

/// Framed packet stream over one client socket.
pub struct Link {
    socket: TcpStream,
    codec: PacketCodec,
    reader: FrameReader,
}

impl Link {
    pub fn new(socket: TcpStream) -> Self {
        Link {
            socket,
            codec: PacketCodec,
            reader: FrameReader::new(),
        }
    }

    /// Next packet, or `None` once the peer closes. Cancel safe: bytes are
    /// buffered in the reader before any await point returns.
    pub async fn read_packet(&mut self) -> anyhow::Result<Option<Packet>> {
        let mut buf = [0_u8; 4096];
        loop {
            if let Some(packet) = self.reader.next_packet()? {
                return Ok(Some(packet));
            }
            let n = self.socket.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.reader.extend(&buf[..n]);
        }
    }

    pub async fn send(&mut self, packets: &[Packet]) -> anyhow::Result<()> {
        let mut data = Vec::new();
        for packet in packets {
            data.extend(self.codec.write(packet)?);
        }
        self.socket.write_all(&data).await?;
        Ok(())
    }
}
