mod combat;
mod connection;
mod login;

pub use combat::CombatPlugin;
pub use connection::{ConnectionPlugin, ReconnectSchedule};
pub use login::LoginPlugin;
