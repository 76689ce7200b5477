use std::time::Duration;

use bevy::{
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};

use crate::{
    ConnectionState,
    client::{GameConnection, SessionGuard},
    config::BotConfig,
    diagnostics::{Hint, KickCategory, troubleshooting},
    reconnect::ReconnectPolicy,
    session::{BotSession, SessionError, SessionEvent},
};

pub struct ConnectionPlugin;

impl Plugin for ConnectionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionGuard>()
            .add_systems(OnEnter(ConnectionState::Connecting), start_connection)
            .add_systems(
                Update,
                (
                    poll_connection.run_if(in_state(ConnectionState::Connecting)),
                    poll_session.run_if(resource_exists::<BotSession>),
                    handle_session_events
                        .after(poll_connection)
                        .after(poll_session),
                    tick_reconnect.run_if(in_state(ConnectionState::Disconnected)),
                ),
            )
            .add_systems(Last, close_session_on_exit);
    }
}

/// Counts reconnect attempts since the last spawn and times the next one.
#[derive(Resource)]
pub struct ReconnectSchedule {
    policy: Box<dyn ReconnectPolicy>,
    attempt: u32,
    timer: Option<Timer>,
}

impl ReconnectSchedule {
    pub fn new(policy: Box<dyn ReconnectPolicy>) -> Self {
        ReconnectSchedule {
            policy,
            attempt: 0,
            timer: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Arms the timer for the next attempt. `None` when the policy gives up.
    pub fn schedule(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.policy.next_delay(self.attempt)?;
        self.timer = Some(Timer::new(delay, TimerMode::Once));
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.timer = None;
    }

    /// Advances the armed timer; true exactly once when it runs out.
    pub fn tick(&mut self, delta: Duration) -> bool {
        let Some(timer) = self.timer.as_mut() else {
            return false;
        };
        if timer.tick(delta).finished() {
            self.timer = None;
            return true;
        }
        false
    }
}

#[derive(Component)]
struct ConnectingTask(Task<Result<GameConnection, SessionError>>);

fn start_connection(
    mut commands: Commands,
    config: Res<BotConfig>,
    task_query: Query<&ConnectingTask>,
) {
    if !task_query.is_empty() {
        return;
    }
    info!(
        "Connecting to {}:{} as {}...",
        config.host, config.port, config.username
    );
    let config = BotConfig::clone(&config);
    let task = AsyncComputeTaskPool::get().spawn(async move { GameConnection::connect(&config) });
    commands.spawn(ConnectingTask(task));
}

fn poll_connection(
    mut commands: Commands,
    mut task_query: Query<(Entity, &mut ConnectingTask)>,
    mut events: EventWriter<SessionEvent>,
    guard: Res<SessionGuard>,
) {
    for (entity, mut connecting_task) in task_query.iter_mut() {
        let Some(result) = block_on(future::poll_once(&mut connecting_task.0)) else {
            continue;
        };
        match result {
            Ok(connection) => {
                match connection.peer_addr() {
                    Ok(addr) => info!("Connected to {addr}, waiting for spawn..."),
                    Err(_) => info!("Connected, waiting for spawn..."),
                }
                match connection.quit_handle() {
                    Ok(handle) => guard.watch(handle),
                    Err(e) => warn!("Session will not be closed on a crash: {e}"),
                }
                commands.insert_resource(BotSession(Box::new(connection)));
            }
            Err(e) => {
                events.write(SessionEvent::Errored(e));
                events.write(SessionEvent::Ended);
            }
        }
        commands.entity(entity).despawn();
    }
}

fn poll_session(mut session: ResMut<BotSession>, mut events: EventWriter<SessionEvent>) {
    for event in session.0.poll_events() {
        events.write(event);
    }
}

fn handle_session_events(
    mut commands: Commands,
    mut events: EventReader<SessionEvent>,
    state: Res<State<ConnectionState>>,
    mut next_state: ResMut<NextState<ConnectionState>>,
    mut schedule: ResMut<ReconnectSchedule>,
    mut exit: EventWriter<AppExit>,
    guard: Res<SessionGuard>,
) {
    let mut current = *state.get();
    for event in events.read() {
        match event {
            SessionEvent::Spawned => {
                info!("Bot spawned successfully!");
                schedule.reset();
            }
            SessionEvent::Chat(_) => {}
            SessionEvent::Kicked {
                reason,
                display_reason,
            } => {
                warn!("Bot was kicked: {reason}");
                if let Some(message) = display_reason {
                    warn!("Message: {message}");
                }
                if let Some(hint) = KickCategory::classify(reason).hint() {
                    log_hint("Possible cause", hint);
                }
            }
            SessionEvent::Errored(e) => {
                error!("Bot error: {e}");
                if let Some(hint) = troubleshooting(e) {
                    log_hint("Troubleshooting", hint);
                }
            }
            SessionEvent::Ended => {
                guard.release();
                commands.remove_resource::<BotSession>();
                match schedule.schedule() {
                    Some(delay) => info!(
                        "Bot disconnected, reconnecting in {} seconds...",
                        delay.as_secs_f64()
                    ),
                    None => {
                        error!(
                            "Giving up after {} reconnect attempts",
                            schedule.attempt().saturating_sub(1)
                        );
                        exit.write(AppExit::error());
                    }
                }
            }
        }
        current = current.on_event(event);
    }

    if current != *state.get() {
        next_state.set(current);
    }
}

fn log_hint(heading: &str, hint: Hint) {
    warn!("{heading}: {}", hint.title);
    for step in hint.steps {
        warn!("  -> {step}");
    }
}

fn tick_reconnect(
    time: Res<Time>,
    mut schedule: ResMut<ReconnectSchedule>,
    mut next_state: ResMut<NextState<ConnectionState>>,
) {
    if schedule.tick(time.delta()) {
        next_state.set(ConnectionState::Connecting);
    }
}

fn close_session_on_exit(
    mut commands: Commands,
    mut exit_events: EventReader<AppExit>,
    session: Option<ResMut<BotSession>>,
    guard: Res<SessionGuard>,
) {
    if exit_events.is_empty() {
        return;
    }
    exit_events.clear();
    info!("Shutting down gracefully...");
    guard.release();
    if let Some(mut session) = session {
        session.0.quit("Shutting down");
        commands.remove_resource::<BotSession>();
    }
}
