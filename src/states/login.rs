use std::time::Duration;

use bevy::prelude::*;

use crate::{
    ConnectionState,
    config::BotConfig,
    session::{BotSession, Session, SessionEvent},
};

/// Auth plugins ignore commands sent the moment they prompt.
pub const LOGIN_DELAY: Duration = Duration::from_secs(1);

pub struct LoginPlugin;

impl Plugin for LoginPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingLogins>()
            .add_systems(OnEnter(ConnectionState::Disconnected), clear_pending_logins)
            .add_systems(
                Update,
                (
                    watch_chat,
                    send_pending_logins.run_if(resource_exists::<BotSession>),
                )
                    .chain(),
            );
    }
}

pub fn is_login_prompt(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("login") || message.contains("please log in")
}

pub fn login_command(password: &str) -> String {
    format!("/login {password}")
}

/// Login commands waiting out `LOGIN_DELAY`, one per prompt seen.
#[derive(Resource, Default)]
pub struct PendingLogins(Vec<Timer>);

impl PendingLogins {
    pub fn queue(&mut self) {
        self.0.push(Timer::new(LOGIN_DELAY, TimerMode::Once));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Advances every timer and sends `/login` for each that ran out.
    pub fn send_due(&mut self, delta: Duration, session: &mut dyn Session, password: &str) {
        let mut due = 0;
        self.0.retain_mut(|timer| {
            if timer.tick(delta).finished() {
                due += 1;
                false
            } else {
                true
            }
        });

        for _ in 0..due {
            info!("Sending login command...");
            match session.send_chat(&login_command(password)) {
                Ok(()) => info!("Login command sent!"),
                Err(e) => error!("Failed to send login command: {e}"),
            }
        }
    }
}

fn watch_chat(
    mut events: EventReader<SessionEvent>,
    config: Res<BotConfig>,
    mut pending: ResMut<PendingLogins>,
) {
    for event in events.read() {
        let SessionEvent::Chat(message) = event else {
            continue;
        };
        if config.debug {
            info!("[MSG] {message}");
        }
        if config.login_password.is_some() && is_login_prompt(message) {
            pending.queue();
            debug!("Login prompt seen, {} login(s) pending", pending.len());
        }
    }
}

fn send_pending_logins(
    time: Res<Time>,
    config: Res<BotConfig>,
    mut pending: ResMut<PendingLogins>,
    mut session: ResMut<BotSession>,
) {
    if pending.is_empty() {
        return;
    }
    let Some(password) = config.login_password.as_deref() else {
        return;
    };
    pending.send_due(time.delta(), session.0.as_mut(), password);
}

fn clear_pending_logins(mut pending: ResMut<PendingLogins>) {
    if !pending.is_empty() {
        debug!("Dropping {} pending login(s)", pending.len());
    }
    pending.0.clear();
}
