use bevy::prelude::*;

use crate::{
    ConnectionState,
    combat::{AttackState, TargetingSettings, TickOutcome, run_tick},
    config::BotConfig,
    session::BotSession,
};

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AttackState>()
            .add_systems(OnEnter(ConnectionState::Connected), start_detection)
            .add_systems(
                FixedUpdate,
                attack_nearby_mobs.run_if(in_state(ConnectionState::Connected)),
            )
            .add_systems(OnExit(ConnectionState::Connected), reset_attack_state);
    }
}

fn start_detection(session: Option<Res<BotSession>>, config: Res<BotConfig>) {
    if let Some(session) = session {
        if let Some(position) = session.0.self_position() {
            info!(
                "Bot position: X={:.1}, Y={:.1}, Z={:.1}",
                position.x, position.y, position.z
            );
        }
        match session.0.world().held_item() {
            Some(item) => info!("Holding: {}", item.name),
            None => info!("Holding: nothing"),
        }
    }
    info!(
        "Starting mob detection loop (radius {}, every {:?})...",
        config.attack_radius, config.tick_interval
    );
}

fn attack_nearby_mobs(
    session: Option<ResMut<BotSession>>,
    config: Res<BotConfig>,
    mut state: ResMut<AttackState>,
) {
    let Some(mut session) = session else {
        return;
    };
    let settings = TargetingSettings::from(config.as_ref());
    let previous = state.target();
    match run_tick(&mut state, session.0.as_mut(), &settings) {
        TickOutcome::NoSession => {}
        TickOutcome::NoCandidates { disengaged: true } => {
            if let Some(id) = previous {
                info!("No mobs nearby, stopping attack on entity {id}");
            }
        }
        TickOutcome::OutOfRange {
            disengaged: true, ..
        } => {
            if let Some(id) = previous {
                info!("Mob out of range, stopping attack on entity {id}");
            }
        }
        TickOutcome::NoCandidates { .. } | TickOutcome::OutOfRange { .. } => {}
        TickOutcome::Engaged {
            label,
            distance,
            weapon_equipped,
            ..
        } => {
            info!("Found mob! Type: {label}, Distance: {distance:.2}");
            if !weapon_equipped {
                warn!("Attacking without a sword");
            }
        }
        TickOutcome::Attacking { target, distance } => {
            debug!("Attacking entity {target} at {distance:.2}");
        }
        TickOutcome::Suppressed {
            target,
            repeated: false,
        } => {
            warn!("No sword equipped, holding off on entity {target}");
        }
        TickOutcome::Suppressed { repeated: true, .. } => {}
        TickOutcome::Failed { error } => {
            error!("Error in attack loop: {error}");
        }
    }
}

fn reset_attack_state(mut state: ResMut<AttackState>) {
    *state = AttackState::Idle;
}
