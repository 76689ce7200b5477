use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bevy::prelude::Resource;
use farmbot_protocol::packets::{AttackPacket, ChatPacket, EquipPacket, LoginPacket, QuitPacket};
use farmbot_protocol::{FrameReader, Packet, PacketCodec};

use crate::config::BotConfig;
use crate::player::{EquipSlot, Item};
use crate::session::{Session, SessionError, SessionEvent};
use crate::world::{EntityId, WorldView};

/// Unsent bytes kept before actions start failing with `Backlog`.
pub const MAX_OUTGOING: usize = 1024 * 1024;

const QUIT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP link to the game gateway.
///
/// The socket is non-blocking after the handshake; `poll_events` drains
/// whatever has arrived and never waits. Frames the socket cannot take yet
/// stay in `outgoing` and are flushed on later sends and polls, so the
/// gateway only ever sees whole frames.
pub struct GameConnection {
    socket: TcpStream,
    codec: PacketCodec,
    reader: FrameReader,
    outgoing: Vec<u8>,
    /// Set while `outgoing` holds part of a frame.
    mid_frame: Arc<AtomicBool>,
    write_error: Option<SessionError>,
    world: WorldView,
    ended: bool,
}

impl GameConnection {
    pub fn connect(config: &BotConfig) -> Result<Self, SessionError> {
        let addr = resolve(&config.host, config.port)?;
        let socket =
            TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused => SessionError::Refused { addr },
                ErrorKind::TimedOut | ErrorKind::WouldBlock => SessionError::TimedOut { addr },
                _ => SessionError::Io(e),
            })?;
        socket.set_nodelay(true)?;

        let mut connection = GameConnection {
            socket,
            codec: PacketCodec,
            reader: FrameReader::new(),
            outgoing: Vec::new(),
            mid_frame: Arc::default(),
            write_error: None,
            world: WorldView::default(),
            ended: false,
        };
        connection.send_packet(&Packet::Login(LoginPacket {
            username: config.username.clone(),
            password: config.password.clone(),
            protocol_version: config.protocol_version.clone(),
        }))?;
        connection.socket.set_nonblocking(true)?;
        Ok(connection)
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    /// A handle that can close this link from outside the app, e.g. a panic hook.
    pub fn quit_handle(&self) -> io::Result<QuitHandle> {
        Ok(QuitHandle {
            socket: self.socket.try_clone()?,
            mid_frame: self.mid_frame.clone(),
        })
    }

    /// Queues a whole frame and writes as much as the socket takes.
    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), SessionError> {
        if self.ended || self.write_error.is_some() {
            return Err(SessionError::Closed);
        }
        let data = self
            .codec
            .write(packet)
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        if self.outgoing.len() + data.len() > MAX_OUTGOING {
            return Err(SessionError::Backlog {
                buffered: self.outgoing.len(),
            });
        }
        self.outgoing.extend_from_slice(&data);
        self.flush()
    }

    fn flush(&mut self) -> Result<(), SessionError> {
        let result = flush_into(&mut self.socket, &mut self.outgoing);
        self.mid_frame
            .store(!self.outgoing.is_empty(), Ordering::Relaxed);
        result.map_err(|e| {
            let kind = e.kind();
            self.write_error = Some(SessionError::Io(e));
            SessionError::Io(kind.into())
        })
    }

    fn end(&mut self, events: &mut Vec<SessionEvent>) {
        if !self.ended {
            self.ended = true;
            let _ = self.socket.shutdown(Shutdown::Both);
            events.push(SessionEvent::Ended);
        }
    }
}

/// Writes from the front of `outgoing` until it is empty or `out` would block.
fn flush_into(out: &mut impl Write, outgoing: &mut Vec<u8>) -> io::Result<()> {
    while !outgoing.is_empty() {
        match out.write(outgoing) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => {
                outgoing.drain(..n);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Second handle on a session's socket.
pub struct QuitHandle {
    socket: TcpStream,
    mid_frame: Arc<AtomicBool>,
}

impl QuitHandle {
    /// Sends `Quit` unless a partial frame is on the wire, then shuts the socket down.
    pub fn close(&self, reason: &str) {
        if !self.mid_frame.load(Ordering::Relaxed) {
            let frame = PacketCodec.write(&Packet::Quit(QuitPacket {
                reason: reason.to_string(),
            }));
            if let Ok(frame) = frame {
                let _ = self.socket.set_nonblocking(false);
                let _ = self.socket.set_write_timeout(Some(QUIT_WRITE_TIMEOUT));
                let _ = (&self.socket).write_all(&frame);
            }
        }
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}

/// Quit handle of the live session, shared with the panic hook.
#[derive(Resource, Clone, Default)]
pub struct SessionGuard(Arc<Mutex<Option<QuitHandle>>>);

impl SessionGuard {
    pub fn watch(&self, handle: QuitHandle) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub fn release(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Closes the watched session, if any. Returns whether one was open.
    pub fn close(&self, reason: &str) -> bool {
        let handle = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        match handle {
            Some(handle) => {
                handle.close(reason);
                true
            }
            None => false,
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, SessionError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| SessionError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs.next().ok_or_else(|| SessionError::Resolve {
        host: host.to_string(),
        source: io::Error::new(ErrorKind::NotFound, "no addresses found"),
    })
}

impl Session for GameConnection {
    fn world(&self) -> &WorldView {
        &self.world
    }

    fn attack(&mut self, target: EntityId) -> Result<(), SessionError> {
        if !self.world.entities.contains_key(&target) {
            return Err(SessionError::UnknownEntity(target));
        }
        self.send_packet(&Packet::Attack(AttackPacket { entity_id: target }))
    }

    fn equip(&mut self, item: &Item, slot: EquipSlot) -> Result<(), SessionError> {
        self.send_packet(&Packet::Equip(EquipPacket {
            inventory_slot: item.slot,
            destination: slot,
        }))
    }

    fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
        self.send_packet(&Packet::Chat(ChatPacket {
            text: text.to_string(),
        }))
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.ended {
            return events;
        }

        let _ = self.flush();
        // Some(None) is a clean close, Some(Some(e)) a failure.
        let mut closed: Option<Option<SessionError>> = self.write_error.take().map(Some);
        let mut buf = [0_u8; 4096];
        while closed.is_none() {
            match self.socket.read(&mut buf) {
                Ok(0) => {
                    closed = Some(None);
                    break;
                }
                Ok(n) => self.reader.extend(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    closed = Some(Some(SessionError::Io(e)));
                    break;
                }
            }
        }

        // Packets that arrived before a disconnect are applied ahead of it.
        loop {
            match self.reader.next_packet() {
                Ok(Some(packet)) => {
                    if let Some(event) = self.world.apply(packet) {
                        events.push(event);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if !matches!(closed, Some(Some(_))) {
                        closed = Some(Some(SessionError::Protocol(e.to_string())));
                    }
                    break;
                }
            }
        }

        if matches!(closed, Some(None)) && self.reader.buffered() > 0 {
            closed = Some(Some(SessionError::Protocol(format!(
                "link closed inside a frame ({} bytes buffered)",
                self.reader.buffered()
            ))));
        }

        if let Some(error) = closed {
            if let Some(error) = error {
                events.push(SessionEvent::Errored(error));
            }
            self.end(&mut events);
        }
        events
    }

    fn quit(&mut self, reason: &str) {
        let _ = self.send_packet(&Packet::Quit(QuitPacket {
            reason: reason.to_string(),
        }));
        if self.write_error.is_none() && !self.outgoing.is_empty() {
            let _ = self.socket.set_nonblocking(false);
            let _ = self.socket.set_write_timeout(Some(QUIT_WRITE_TIMEOUT));
            let _ = self.flush();
        }
        let mut events = Vec::new();
        self.end(&mut events);
    }
}
