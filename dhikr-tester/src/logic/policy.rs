use std::collections::HashMap;
use std::fmt;

use dhikr_game::{ActiveItemInstance, InstanceId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Travel progress at which scripted players react.
const REACTION_POINT: f32 = 30.0;
const SLOPPY_ACCURACY: f64 = 0.8;

/// Policy interface for automated players.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Whether to tap `instance` this step.
    fn wants_tap(&mut self, instance: &ActiveItemInstance) -> bool;
}

/// Built-in player behaviours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStrategy {
    /// Taps everything well before the bound.
    Perfect,
    /// Misses a seeded share of items.
    Sloppy,
    /// Never taps.
    Idle,
}

impl PlayerStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Perfect => "Perfect",
            Self::Sloppy => "Sloppy",
            Self::Idle => "Idle",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy> {
        match self {
            Self::Perfect => Box::new(PerfectPolicy),
            Self::Sloppy => Box::new(SloppyPolicy::new(seed, SLOPPY_ACCURACY)),
            Self::Idle => Box::new(IdlePolicy),
        }
    }
}

impl fmt::Display for PlayerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct PerfectPolicy;
struct IdlePolicy;

struct SloppyPolicy {
    rng: ChaCha20Rng,
    accuracy: f64,
    decisions: HashMap<InstanceId, bool>,
}

impl SloppyPolicy {
    fn new(seed: u64, accuracy: f64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            accuracy,
            decisions: HashMap::new(),
        }
    }
}

impl PlayerPolicy for PerfectPolicy {
    fn name(&self) -> &'static str {
        "Perfect"
    }

    fn wants_tap(&mut self, instance: &ActiveItemInstance) -> bool {
        instance.travel_progress >= REACTION_POINT
    }
}

impl PlayerPolicy for IdlePolicy {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn wants_tap(&mut self, _instance: &ActiveItemInstance) -> bool {
        false
    }
}

impl PlayerPolicy for SloppyPolicy {
    fn name(&self) -> &'static str {
        "Sloppy"
    }

    fn wants_tap(&mut self, instance: &ActiveItemInstance) -> bool {
        if instance.travel_progress < REACTION_POINT {
            return false;
        }
        let accuracy = self.accuracy;
        let rng = &mut self.rng;
        *self
            .decisions
            .entry(instance.instance_id)
            .or_insert_with(|| rng.r#gen::<f64>() < accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: u64, travel_progress: f32) -> ActiveItemInstance {
        ActiveItemInstance {
            instance_id: InstanceId(id),
            item_id: "subhanallah".to_string(),
            travel_progress,
            lane: 40.0,
            spawned_as_newly_unlocked: false,
        }
    }

    #[test]
    fn perfect_waits_for_reaction_point() {
        let mut policy = PlayerStrategy::Perfect.create_policy(1);
        assert!(!policy.wants_tap(&instance(1, 0.0)));
        assert!(policy.wants_tap(&instance(1, 31.0)));
        assert!(!PlayerStrategy::Idle.create_policy(1).wants_tap(&instance(1, 99.0)));
    }

    #[test]
    fn sloppy_decisions_are_sticky_and_seeded() {
        let decide = |seed| {
            let mut policy = PlayerStrategy::Sloppy.create_policy(seed);
            (0..200)
                .map(|id| policy.wants_tap(&instance(id, 50.0)))
                .collect::<Vec<_>>()
        };
        let first = decide(9);
        assert_eq!(first, decide(9));
        let hits = first.iter().filter(|hit| **hit).count();
        assert!((120..=190).contains(&hits), "hits {hits}");

        let mut policy = PlayerStrategy::Sloppy.create_policy(3);
        let once = policy.wants_tap(&instance(7, 50.0));
        for _ in 0..10 {
            assert_eq!(policy.wants_tap(&instance(7, 60.0)), once);
        }
    }
}
