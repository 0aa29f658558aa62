//! Automatic fan power policy driven by the environmental sensors.
//!
//! The policy is a threshold filter with a cooldown tail: the fan runs at full power while the
//! air is bad, and keeps running for a configured while after it has recovered so the filtered
//! volume actually turns over.

use crate::time::Instant;
use crate::units::{Percent8, Seconds16, VocIndex};

/// Latest environmental sensor readings, as sampled outside this crate.
///
/// Readings the sensors could not produce are carried as not-known and never trigger the
/// policy on their own.
#[derive(Copy, Clone, Debug)]
pub struct EnvironmentalReadings {
    /// VOC index measured on the intake side.
    pub intake_voc: VocIndex,
    /// VOC index measured on the exhaust side.
    pub exhaust_voc: VocIndex,
}

impl Default for EnvironmentalReadings {
    fn default() -> Self {
        EnvironmentalReadings {
            intake_voc: VocIndex::not_known(),
            exhaust_voc: VocIndex::not_known(),
        }
    }
}

/// Tunable policy configuration.
///
/// All three fields are remotely writable at runtime; a changed value is picked up by the
/// running [`PolicyInstance`] on its next update. The fields are accepted as written — there
/// is no cross-field consistency check between the two thresholds.
#[derive(Copy, Clone, Debug)]
pub struct FanPolicy {
    /// How long to continue filtering after conditions are acceptable.
    pub cooldown: Seconds16,
    /// Filter if any VOC sensor reaches this threshold.
    pub voc_passive_max: VocIndex,
    /// Filter if intake exceeds exhaust by this threshold.
    pub voc_improve_min: VocIndex,
}

impl Default for FanPolicy {
    fn default() -> Self {
        FanPolicy {
            cooldown: Seconds16::new(60 * 15),
            voc_passive_max: VocIndex::new(250),
            voc_improve_min: VocIndex::new(100),
        }
    }
}

impl FanPolicy {
    /// Whether the current readings call for filtering, ignoring any cooldown tail.
    fn should_filter(&self, env: &EnvironmentalReadings) -> bool {
        let reaches_passive_max = |voc: VocIndex| match (voc.value(), self.voc_passive_max.value()) {
            (Some(voc), Some(max)) => voc >= max,
            _ => false,
        };

        if reaches_passive_max(env.intake_voc) || reaches_passive_max(env.exhaust_voc) {
            return true;
        }

        match (
            env.intake_voc.value(),
            env.exhaust_voc.value(),
            self.voc_improve_min.value(),
        ) {
            (Some(intake), Some(exhaust), Some(min)) => intake.saturating_sub(exhaust) >= min,
            _ => false,
        }
    }
}

/// One running evaluation of a [`FanPolicy`].
///
/// Holds the cooldown state between updates; configuration lives in the [`FanPolicy`] passed
/// to each update, so configuration writes take effect on the next invocation.
pub struct PolicyInstance {
    /// Most recent instant at which conditions called for filtering; cleared once the
    /// cooldown that started there has run out.
    last_active: Option<Instant>,
}

impl PolicyInstance {
    pub fn new() -> Self {
        PolicyInstance { last_active: None }
    }

    /// Computes the automatic fan power for the current readings.
    pub fn update(&mut self, policy: &FanPolicy, now: Instant, env: &EnvironmentalReadings) -> Percent8 {
        if policy.should_filter(env) {
            self.last_active = Some(now);
            return Percent8::new(100);
        }

        if let Some(last_active) = self.last_active {
            if now.duration_since(last_active) <= policy.cooldown.as_duration() {
                return Percent8::new(100);
            }
            self.last_active = None;
        }

        Percent8::new(0)
    }
}

impl Default for PolicyInstance {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u32) -> Instant {
        Instant::from_raw_millis(millis)
    }

    fn env(intake: u16, exhaust: u16) -> EnvironmentalReadings {
        EnvironmentalReadings {
            intake_voc: VocIndex::new(intake),
            exhaust_voc: VocIndex::new(exhaust),
        }
    }

    #[test]
    fn clean_air_stays_off() {
        let policy = FanPolicy::default();
        let mut instance = PolicyInstance::new();
        assert_eq!(instance.update(&policy, at(0), &env(50, 50)), Percent8::new(0));
    }

    #[test]
    fn passive_max_triggers_on_either_sensor() {
        let policy = FanPolicy::default();
        let mut instance = PolicyInstance::new();
        assert_eq!(instance.update(&policy, at(0), &env(250, 10)), Percent8::new(100));

        let mut instance = PolicyInstance::new();
        assert_eq!(instance.update(&policy, at(0), &env(10, 250)), Percent8::new(100));
    }

    #[test]
    fn intake_exceeding_exhaust_triggers() {
        let policy = FanPolicy::default();
        let mut instance = PolicyInstance::new();
        assert_eq!(instance.update(&policy, at(0), &env(180, 50)), Percent8::new(100));
        // A differential below the threshold does not.
        let mut instance = PolicyInstance::new();
        assert_eq!(instance.update(&policy, at(0), &env(140, 50)), Percent8::new(0));
    }

    #[test]
    fn unknown_readings_never_trigger() {
        let policy = FanPolicy::default();
        let mut instance = PolicyInstance::new();
        let unknown = EnvironmentalReadings::default();
        assert_eq!(instance.update(&policy, at(0), &unknown), Percent8::new(0));

        // A known exhaust with unknown intake leaves the differential rule inert.
        let one_sided = EnvironmentalReadings {
            intake_voc: VocIndex::not_known(),
            exhaust_voc: VocIndex::new(50),
        };
        assert_eq!(instance.update(&policy, at(0), &one_sided), Percent8::new(0));
    }

    #[test]
    fn cooldown_keeps_filtering_after_recovery() {
        let policy = FanPolicy {
            cooldown: Seconds16::new(10),
            ..FanPolicy::default()
        };
        let mut instance = PolicyInstance::new();

        assert_eq!(instance.update(&policy, at(0), &env(300, 50)), Percent8::new(100));

        // Conditions recover; the cooldown keeps the fan on...
        let clean = env(50, 50);
        assert_eq!(instance.update(&policy, at(5_000), &clean), Percent8::new(100));
        assert_eq!(instance.update(&policy, at(10_000), &clean), Percent8::new(100));
        // ...until it has fully elapsed.
        assert_eq!(instance.update(&policy, at(10_001), &clean), Percent8::new(0));
    }

    #[test]
    fn retrigger_restarts_cooldown() {
        let policy = FanPolicy {
            cooldown: Seconds16::new(10),
            ..FanPolicy::default()
        };
        let mut instance = PolicyInstance::new();

        instance.update(&policy, at(0), &env(300, 50));
        instance.update(&policy, at(8_000), &env(300, 50));
        // 10s after the *second* activation the fan is still on.
        assert_eq!(
            instance.update(&policy, at(8_000 + 10_000), &env(50, 50)),
            Percent8::new(100)
        );
        assert_eq!(
            instance.update(&policy, at(8_000 + 10_001), &env(50, 50)),
            Percent8::new(0)
        );
    }

    #[test]
    fn shortened_cooldown_applies_on_next_update() {
        let mut policy = FanPolicy {
            cooldown: Seconds16::new(60),
            ..FanPolicy::default()
        };
        let mut instance = PolicyInstance::new();

        instance.update(&policy, at(0), &env(300, 50));
        policy.cooldown = Seconds16::new(1);
        assert_eq!(
            instance.update(&policy, at(5_000), &env(50, 50)),
            Percent8::new(0)
        );
    }
}
