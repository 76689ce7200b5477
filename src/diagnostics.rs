use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::player::{EquipSlot, Item};
use crate::session::{Session, SessionError, SessionEvent};

/// How long the diagnostic tools wait for a spawn.
pub const SPAWN_TIMEOUT: Duration = Duration::from_secs(30);
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A titled list of things to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub title: &'static str,
    pub steps: &'static [&'static str],
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        for step in self.steps {
            write!(f, "\n  -> {step}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickCategory {
    NotWhitelisted,
    Banned,
    AuthFailed,
    ServerFull,
    Other,
}

impl KickCategory {
    /// Guesses the cause of a kick from its reason text.
    pub fn classify(reason: &str) -> Self {
        let reason = reason.to_lowercase();
        if reason.contains("whitelist") {
            KickCategory::NotWhitelisted
        } else if reason.contains("ban") {
            KickCategory::Banned
        } else if reason.contains("auth") || reason.contains("login") {
            KickCategory::AuthFailed
        } else if reason.contains("full") {
            KickCategory::ServerFull
        } else {
            KickCategory::Other
        }
    }

    pub fn hint(self) -> Option<Hint> {
        let hint = match self {
            KickCategory::NotWhitelisted => Hint {
                title: "Bot account not whitelisted",
                steps: &["Add the bot account to the whitelist"],
            },
            KickCategory::Banned => Hint {
                title: "Bot account is banned",
                steps: &["Check the server ban list"],
            },
            KickCategory::AuthFailed => Hint {
                title: "Authentication failed",
                steps: &[
                    "Check BOT_USERNAME and BOT_PASSWORD",
                    "Check that the account is registered",
                    "Check LOGIN_PASSWORD if the server uses an auth plugin",
                ],
            },
            KickCategory::ServerFull => Hint {
                title: "Server is full",
                steps: &["Wait for a slot to open"],
            },
            KickCategory::Other => return None,
        };
        Some(hint)
    }
}

/// Troubleshooting steps for connection-level failures.
pub fn troubleshooting(error: &SessionError) -> Option<Hint> {
    match error {
        SessionError::Resolve { .. } => Some(Hint {
            title: "Cannot resolve hostname",
            steps: &[
                "Check that SERVER_IP is correct",
                "Verify the internet connection",
            ],
        }),
        SessionError::Refused { .. } => Some(Hint {
            title: "Connection refused",
            steps: &[
                "The server might not be running",
                "Check SERVER_PORT",
                "A firewall may be blocking the connection",
            ],
        }),
        SessionError::TimedOut { .. } => Some(Hint {
            title: "Connection timeout",
            steps: &[
                "The server is not responding",
                "Check network connectivity",
                "A firewall may be blocking the port",
            ],
        }),
        SessionError::Gateway(message) if message.to_lowercase().contains("version") => {
            Some(Hint {
                title: "Protocol version mismatch",
                steps: &["Set MINECRAFT_VERSION to the server's version"],
            })
        }
        _ => None,
    }
}

/// Inventory, equipment and weapon summary printed by `check_inventory`.
#[derive(Debug, Clone)]
pub struct InventoryReport {
    pub items: Vec<Item>,
    pub equipment: Vec<(EquipSlot, Option<Item>)>,
}

impl InventoryReport {
    pub fn from_session(session: &dyn Session) -> Self {
        InventoryReport {
            items: session.inventory_items(),
            equipment: EquipSlot::ALL
                .iter()
                .map(|&slot| (slot, session.equipped(slot)))
                .collect(),
        }
    }

    pub fn weapons(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.is_weapon())
    }
}

impl fmt::Display for InventoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=============== BOT INVENTORY ===============")?;
        writeln!(f)?;
        if self.items.is_empty() {
            writeln!(f, "[WARN] Inventory is EMPTY!")?;
            writeln!(f, "  -> Add items to the bot's inventory")?;
            writeln!(f, "  -> At minimum: add a sword")?;
        } else {
            writeln!(f, "Total items in inventory: {}", self.items.len())?;
            writeln!(f)?;
            for (index, item) in self.items.iter().enumerate() {
                write!(f, "{index:>2}. {:<20} x{}", item.name, item.count)?;
                if item.is_hotbar() {
                    write!(f, " [HOTBAR SLOT {}]", item.slot)?;
                }
                writeln!(f)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "=============== BOT EQUIPMENT ===============")?;
        writeln!(f)?;
        for (slot, item) in &self.equipment {
            let name = item.as_ref().map_or("empty", |item| item.name.as_str());
            writeln!(f, "{:<10}: {name}", slot.label())?;
        }

        writeln!(f)?;
        writeln!(f, "=============== SWORD CHECK ===============")?;
        writeln!(f)?;
        let mut weapons = self.weapons().peekable();
        if weapons.peek().is_some() {
            writeln!(f, "Swords found in inventory:")?;
            for (i, sword) in weapons.enumerate() {
                writeln!(f, "  {}. {} x{}", i + 1, sword.name, sword.count)?;
            }
        } else {
            writeln!(f, "NO SWORDS FOUND!")?;
            writeln!(f, "  -> Add a sword to the inventory")?;
            writeln!(f, "  -> The bot needs a sword to attack mobs")?;
        }
        writeln!(f)?;
        write!(f, "===========================================")
    }
}

/// How a diagnostic connection ended up.
#[derive(Debug)]
pub enum CheckResult {
    Spawned,
    Kicked {
        reason: String,
        display_reason: Option<String>,
    },
    Errored(SessionError),
    Ended,
    TimedOut,
}

/// Polls `session` until it spawns, fails or `timeout` passes. Chat is
/// ignored.
pub fn await_spawn(session: &mut dyn Session, timeout: Duration, poll: Duration) -> CheckResult {
    let deadline = Instant::now() + timeout;
    loop {
        for event in session.poll_events() {
            if let Some(result) = terminal(event, true) {
                return result;
            }
        }
        if Instant::now() >= deadline {
            return CheckResult::TimedOut;
        }
        thread::sleep(poll);
    }
}

/// Keeps polling for `wait` so late state updates land. Returns early if the
/// session goes away.
pub fn settle(session: &mut dyn Session, wait: Duration, poll: Duration) -> Option<CheckResult> {
    let deadline = Instant::now() + wait;
    while Instant::now() < deadline {
        for event in session.poll_events() {
            if let Some(result) = terminal(event, false) {
                return Some(result);
            }
        }
        thread::sleep(poll);
    }
    None
}

fn terminal(event: SessionEvent, spawn_ends_wait: bool) -> Option<CheckResult> {
    match event {
        SessionEvent::Spawned if spawn_ends_wait => Some(CheckResult::Spawned),
        SessionEvent::Spawned | SessionEvent::Chat(_) => None,
        SessionEvent::Kicked {
            reason,
            display_reason,
        } => Some(CheckResult::Kicked {
            reason,
            display_reason,
        }),
        SessionEvent::Errored(e) => Some(CheckResult::Errored(e)),
        SessionEvent::Ended => Some(CheckResult::Ended),
    }
}
