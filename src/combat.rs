//! Target selection and the Idle/Engaged attack state machine.
//!
//! Everything here is plain data and functions over `&mut dyn Session`; the
//! bevy systems in `states::combat` only schedule and log.

use std::hash::{DefaultHasher, Hash, Hasher};

use bevy::math::DVec3;
use bevy::prelude::Resource;

use crate::config::BotConfig;
use crate::player::{Item, equip_weapon};
use crate::session::Session;
use crate::world::{EntityId, EntityInfo};

/// Matched as case-insensitive substrings of the entity label.
pub const HOSTILE_MOB_TYPES: [&str; 33] = [
    "creeper",
    "skeleton",
    "spider",
    "zombie",
    "slime",
    "enderman",
    "cave_spider",
    "ghast",
    "zombie_pigman",
    "pig_zombie",
    "magma_cube",
    "wither_skeleton",
    "blaze",
    "silverfish",
    "husk",
    "stray",
    "wither",
    "ender_dragon",
    "endermite",
    "guardian",
    "shulker",
    "pillager",
    "ravager",
    "vindicator",
    "evoker",
    "vex",
    "phantom",
    "drowned",
    "zombie_villager",
    "witch",
    "hoglin",
    "piglin",
    "strider",
];

pub fn is_hostile(label: &str) -> bool {
    let label = label.to_lowercase();
    HOSTILE_MOB_TYPES.iter().any(|mob| label.contains(mob))
}

#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AttackState {
    #[default]
    Idle,
    Engaged {
        target: EntityId,
    },
    /// Not attacking: `target` is in range but no weapon could be equipped
    /// from the inventory with this fingerprint. Counts as idle.
    Suppressed {
        target: EntityId,
        inventory: u64,
    },
}

impl AttackState {
    pub fn is_engaged(&self) -> bool {
        matches!(self, AttackState::Engaged { .. })
    }

    /// The entity being attacked, if any.
    pub fn target(&self) -> Option<EntityId> {
        match self {
            AttackState::Engaged { target } => Some(*target),
            AttackState::Idle | AttackState::Suppressed { .. } => None,
        }
    }
}

fn inventory_fingerprint(items: &[Item]) -> u64 {
    let mut hasher = DefaultHasher::new();
    items.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Copy)]
pub struct TargetingSettings {
    pub attack_radius: f64,
    pub require_weapon: bool,
}

impl From<&BotConfig> for TargetingSettings {
    fn from(config: &BotConfig) -> Self {
        TargetingSettings {
            attack_radius: config.attack_radius,
            require_weapon: config.require_weapon,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entity: &'a EntityInfo,
    pub distance: f64,
}

/// Hostile entities that have a position, in input order.
pub fn hostile_candidates<'a>(
    entities: impl IntoIterator<Item = &'a EntityInfo>,
) -> Vec<&'a EntityInfo> {
    entities
        .into_iter()
        .filter(|entity| entity.position.is_some() && is_hostile(entity.label()))
        .collect()
}

/// Linear nearest-neighbour scan. Zero distance is skipped (that is us),
/// and on an exact tie the earlier entity wins.
pub fn select_nearest<'a>(
    origin: DVec3,
    candidates: impl IntoIterator<Item = &'a EntityInfo>,
) -> Option<Candidate<'a>> {
    let mut nearest: Option<Candidate<'a>> = None;
    for entity in candidates {
        let Some(position) = entity.position else {
            continue;
        };
        let distance = origin.distance(position);
        if distance > 0.0 && nearest.is_none_or(|n| distance < n.distance) {
            nearest = Some(Candidate { entity, distance });
        }
    }
    nearest
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No session or no self-position yet.
    NoSession,
    NoCandidates {
        disengaged: bool,
    },
    OutOfRange {
        distance: Option<f64>,
        disengaged: bool,
    },
    /// Switched to a new target and attacked it.
    Engaged {
        target: EntityId,
        label: String,
        distance: f64,
        weapon_equipped: bool,
    },
    /// Kept attacking the current target.
    Attacking {
        target: EntityId,
        distance: f64,
    },
    /// No weapon and `require_weapon` is set. `repeated` when the previous
    /// tick already held off on the same target with the same inventory.
    Suppressed {
        target: EntityId,
        repeated: bool,
    },
    /// A session call failed; the attack state was left untouched.
    Failed {
        error: String,
    },
}

/// One evaluation of the attack loop.
pub fn run_tick(
    state: &mut AttackState,
    session: &mut dyn Session,
    settings: &TargetingSettings,
) -> TickOutcome {
    let Some(origin) = session.self_position() else {
        return TickOutcome::NoSession;
    };
    let entities = match session.entities() {
        Ok(entities) => entities,
        Err(e) => {
            return TickOutcome::Failed {
                error: e.to_string(),
            };
        }
    };

    let candidates = hostile_candidates(&entities);
    if candidates.is_empty() {
        let disengaged = state.is_engaged();
        *state = AttackState::Idle;
        return TickOutcome::NoCandidates { disengaged };
    }

    let nearest = select_nearest(origin, candidates.iter().copied());
    let (target, label, distance) = match nearest {
        Some(c) if c.distance <= settings.attack_radius => {
            (c.entity.id, c.entity.label().to_string(), c.distance)
        }
        _ => {
            let disengaged = state.is_engaged();
            *state = AttackState::Idle;
            return TickOutcome::OutOfRange {
                distance: nearest.map(|c| c.distance),
                disengaged,
            };
        }
    };

    let next = AttackState::Engaged { target };
    let switching = *state != next;
    let mut weapon_equipped = true;
    if switching {
        let held_off = settings.require_weapon.then(|| AttackState::Suppressed {
            target,
            inventory: inventory_fingerprint(&session.inventory_items()),
        });
        // Equipping again cannot succeed until the inventory changes.
        if let Some(held_off) = held_off.filter(|held_off| *held_off == *state) {
            *state = held_off;
            return TickOutcome::Suppressed {
                target,
                repeated: true,
            };
        }
        weapon_equipped = equip_weapon(session);
        if let Some(held_off) = held_off.filter(|_| !weapon_equipped) {
            *state = held_off;
            return TickOutcome::Suppressed {
                target,
                repeated: false,
            };
        }
    }

    if let Err(e) = session.attack(target) {
        return TickOutcome::Failed {
            error: e.to_string(),
        };
    }
    *state = next;

    if switching {
        TickOutcome::Engaged {
            target,
            label,
            distance,
            weapon_equipped,
        }
    } else {
        TickOutcome::Attacking { target, distance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Item;
    use crate::session::mock::MockSession;

    const SETTINGS: TargetingSettings = TargetingSettings {
        attack_radius: 3.0,
        require_weapon: false,
    };

    fn session_at_origin() -> MockSession {
        let mut session = MockSession::default();
        session.world.self_position = Some(DVec3::ZERO);
        session
    }

    fn entity(id: EntityId, name: &str, z: f64) -> EntityInfo {
        EntityInfo {
            id,
            name: name.to_string(),
            kind: String::new(),
            position: Some(DVec3::new(0.0, 0.0, z)),
        }
    }

    fn give_sword(session: &mut MockSession) {
        session.world.inventory.push(Item {
            slot: 0,
            type_id: 0,
            name: "iron_sword".to_string(),
            count: 1,
        });
    }

    #[test]
    fn hostile_filter_is_substring_and_case_insensitive() {
        assert!(is_hostile("zombie"));
        assert!(is_hostile("Zombie_Villager"));
        assert!(is_hostile("minecraft:CAVE_SPIDER"));
        assert!(!is_hostile("cow"));
        assert!(!is_hostile("villager"));
        assert!(!is_hostile(""));
    }

    #[test]
    fn nearest_prefers_first_on_tie() {
        let entities = vec![
            entity(7, "zombie", 2.0),
            entity(3, "skeleton", -2.0),
            entity(5, "creeper", 2.5),
        ];
        let nearest = select_nearest(DVec3::ZERO, &entities).unwrap();
        assert_eq!(nearest.entity.id, 7);
        assert_eq!(nearest.distance, 2.0);
    }

    #[test]
    fn nearest_skips_zero_distance_and_missing_position() {
        let mut unplaced = entity(1, "zombie", 0.0);
        unplaced.position = None;
        let entities = vec![unplaced, entity(2, "zombie", 0.0), entity(3, "husk", 4.0)];
        let nearest = select_nearest(DVec3::ZERO, &entities).unwrap();
        assert_eq!(nearest.entity.id, 3);
        assert!(select_nearest(DVec3::ZERO, &entities[..2]).is_none());
    }

    #[test]
    fn nearest_is_global_minimum() {
        let entities: Vec<_> = [9.0, 4.0, 6.5, 1.5, 3.0]
            .iter()
            .enumerate()
            .map(|(i, z)| entity(i as EntityId, "zombie", *z))
            .collect();
        assert_eq!(select_nearest(DVec3::ZERO, &entities).unwrap().entity.id, 3);
    }

    #[test]
    fn scenario_a_attacks_zombie_in_range() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;

        let outcome = run_tick(&mut state, &mut session, &SETTINGS);

        assert!(matches!(outcome, TickOutcome::Engaged { target: 1, .. }));
        assert_eq!(state, AttackState::Engaged { target: 1 });
        assert_eq!(session.attacks, vec![1]);
    }

    #[test]
    fn scenario_b_zombie_out_of_range() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 5.0)));
        let mut state = AttackState::Idle;

        let outcome = run_tick(&mut state, &mut session, &SETTINGS);

        assert_eq!(
            outcome,
            TickOutcome::OutOfRange {
                distance: Some(5.0),
                disengaged: false
            }
        );
        assert_eq!(state, AttackState::Idle);
        assert!(session.attacks.is_empty());
    }

    #[test]
    fn scenario_c_passive_mob_is_ignored() {
        let mut session = session_at_origin();
        session.add_entity(1, "cow", Some(DVec3::new(0.0, 0.0, 1.0)));
        let mut state = AttackState::Idle;

        let outcome = run_tick(&mut state, &mut session, &SETTINGS);

        assert_eq!(outcome, TickOutcome::NoCandidates { disengaged: false });
        assert_eq!(state, AttackState::Idle);
        assert!(session.attacks.is_empty());
    }

    #[test]
    fn scenario_d_picks_nearer_mob() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        session.add_entity(2, "skeleton", Some(DVec3::new(0.0, 0.0, 1.0)));
        let mut state = AttackState::Idle;

        run_tick(&mut state, &mut session, &SETTINGS);

        assert_eq!(state.target(), Some(2));
        assert_eq!(session.attacks, vec![2]);
    }

    #[test]
    fn scenario_e_attacks_bare_handed() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;

        let outcome = run_tick(&mut state, &mut session, &SETTINGS);

        match outcome {
            TickOutcome::Engaged {
                weapon_equipped, ..
            } => assert!(!weapon_equipped),
            other => panic!("Expected Engaged, got {other:?}"),
        }
        assert!(session.equips.is_empty());
        assert_eq!(session.attacks, vec![1]);
    }

    #[test]
    fn require_weapon_suppresses_attack() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;
        let settings = TargetingSettings {
            require_weapon: true,
            ..SETTINGS
        };

        let outcome = run_tick(&mut state, &mut session, &settings);

        assert_eq!(
            outcome,
            TickOutcome::Suppressed {
                target: 1,
                repeated: false
            }
        );
        assert!(!state.is_engaged());
        assert!(session.attacks.is_empty());

        give_sword(&mut session);
        let outcome = run_tick(&mut state, &mut session, &settings);
        assert!(matches!(
            outcome,
            TickOutcome::Engaged {
                weapon_equipped: true,
                ..
            }
        ));
        assert_eq!(session.attacks, vec![1]);
    }

    #[test]
    fn suppression_does_not_retry_until_inventory_changes() {
        let mut session = session_at_origin();
        give_sword(&mut session);
        session.fail_equip = true;
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;
        let settings = TargetingSettings {
            require_weapon: true,
            ..SETTINGS
        };

        let outcome = run_tick(&mut state, &mut session, &settings);
        assert_eq!(
            outcome,
            TickOutcome::Suppressed {
                target: 1,
                repeated: false
            }
        );
        assert_eq!(session.equip_attempts, 1);

        for _ in 0..5 {
            let outcome = run_tick(&mut state, &mut session, &settings);
            assert_eq!(
                outcome,
                TickOutcome::Suppressed {
                    target: 1,
                    repeated: true
                }
            );
        }
        assert_eq!(session.equip_attempts, 1);

        // A different mob in reach is a new decision.
        session.add_entity(2, "skeleton", Some(DVec3::new(0.0, 0.0, 1.0)));
        let outcome = run_tick(&mut state, &mut session, &settings);
        assert_eq!(
            outcome,
            TickOutcome::Suppressed {
                target: 2,
                repeated: false
            }
        );
        assert_eq!(session.equip_attempts, 2);

        // So is a changed inventory.
        session.fail_equip = false;
        session.world.inventory.push(Item {
            slot: 1,
            type_id: 0,
            name: "bread".to_string(),
            count: 3,
        });
        let outcome = run_tick(&mut state, &mut session, &settings);
        assert!(matches!(outcome, TickOutcome::Engaged { target: 2, .. }));
        assert_eq!(session.equip_attempts, 3);
        assert_eq!(session.attacks, vec![2]);
    }

    #[test]
    fn suppression_ends_when_mobs_leave() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;
        let settings = TargetingSettings {
            require_weapon: true,
            ..SETTINGS
        };
        run_tick(&mut state, &mut session, &settings);

        session.world.entities.clear();
        let outcome = run_tick(&mut state, &mut session, &settings);
        assert_eq!(outcome, TickOutcome::NoCandidates { disengaged: false });
        assert_eq!(state, AttackState::Idle);
    }

    #[test]
    fn repeated_ticks_reattack_without_reequipping() {
        let mut session = session_at_origin();
        give_sword(&mut session);
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;

        run_tick(&mut state, &mut session, &SETTINGS);
        for _ in 0..3 {
            let outcome = run_tick(&mut state, &mut session, &SETTINGS);
            assert_eq!(
                outcome,
                TickOutcome::Attacking {
                    target: 1,
                    distance: 2.0
                }
            );
        }

        assert_eq!(state, AttackState::Engaged { target: 1 });
        assert_eq!(session.attacks, vec![1, 1, 1, 1]);
        assert_eq!(session.equips.len(), 1);
    }

    #[test]
    fn switching_target_reequips() {
        let mut session = session_at_origin();
        give_sword(&mut session);
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;
        run_tick(&mut state, &mut session, &SETTINGS);

        session.add_entity(2, "spider", Some(DVec3::new(0.0, 0.0, 1.0)));
        let outcome = run_tick(&mut state, &mut session, &SETTINGS);

        assert!(matches!(outcome, TickOutcome::Engaged { target: 2, .. }));
        assert_eq!(session.equips.len(), 2);
        assert_eq!(session.attacks, vec![1, 2]);
    }

    #[test]
    fn engaged_goes_idle_when_mobs_leave() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;
        run_tick(&mut state, &mut session, &SETTINGS);

        session.world.entities.clear();
        let outcome = run_tick(&mut state, &mut session, &SETTINGS);
        assert_eq!(outcome, TickOutcome::NoCandidates { disengaged: true });
        assert_eq!(state, AttackState::Idle);

        let outcome = run_tick(&mut state, &mut session, &SETTINGS);
        assert_eq!(outcome, TickOutcome::NoCandidates { disengaged: false });
    }

    #[test]
    fn engaged_goes_idle_when_target_walks_away() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        let mut state = AttackState::Idle;
        run_tick(&mut state, &mut session, &SETTINGS);

        session.world.entities.get_mut(&1).unwrap().position = Some(DVec3::new(0.0, 0.0, 3.5));
        let outcome = run_tick(&mut state, &mut session, &SETTINGS);

        assert_eq!(
            outcome,
            TickOutcome::OutOfRange {
                distance: Some(3.5),
                disengaged: true
            }
        );
        assert_eq!(state, AttackState::Idle);
        assert_eq!(session.attacks, vec![1]);
    }

    #[test]
    fn radius_is_inclusive() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 3.0)));
        let mut state = AttackState::Idle;
        run_tick(&mut state, &mut session, &SETTINGS);
        assert_eq!(state.target(), Some(1));
    }

    #[test]
    fn no_position_is_a_noop() {
        let mut session = MockSession::default();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 1.0)));
        let mut state = AttackState::Engaged { target: 1 };
        assert_eq!(
            run_tick(&mut state, &mut session, &SETTINGS),
            TickOutcome::NoSession
        );
        assert_eq!(state, AttackState::Engaged { target: 1 });
    }

    #[test]
    fn failures_leave_state_unchanged() {
        let mut session = session_at_origin();
        session.add_entity(1, "zombie", Some(DVec3::new(0.0, 0.0, 2.0)));
        session.add_entity(2, "zombie", Some(DVec3::new(0.0, 0.0, 1.0)));
        let mut state = AttackState::Engaged { target: 1 };

        session.fail_attack = true;
        let outcome = run_tick(&mut state, &mut session, &SETTINGS);
        assert!(matches!(outcome, TickOutcome::Failed { .. }));
        assert_eq!(state, AttackState::Engaged { target: 1 });

        session.fail_attack = false;
        session.fail_entities = true;
        let outcome = run_tick(&mut state, &mut session, &SETTINGS);
        assert!(matches!(outcome, TickOutcome::Failed { .. }));
        assert_eq!(state, AttackState::Engaged { target: 1 });
        assert!(session.attacks.is_empty());
    }
}
