//! The fan service: commanded power, manual override, measured speed, policy configuration,
//! and the aggregated snapshot clients subscribe to.
//!
//! State is mutated from three directions — attribute writes, the periodic policy tick, and
//! the tachometer poll — all running on the single event-driven context. Every observable
//! change requests a notification fan-out on the aggregate characteristic.

use crate::att::{ConnHandle, ErrorCode, Handle};
use crate::bytes::WriteCursor;
use crate::gatt::{read_blob, Service, SERVER_CONFIG_BROADCAST};
use crate::hw::{FanPwm, Tachometer};
use crate::notify::{NotificationRegistry, NotificationSender};
use crate::policy::{EnvironmentalReadings, FanPolicy, PolicyInstance};
use crate::time::{Duration, Instant};
use crate::units::{Percent8, Rpm16, Seconds16, VocIndex};
use crate::utils::HexSlice;
use zerocopy::AsBytes;

/// Rate at which the automatic policy re-evaluates the sensor readings.
pub const POLICY_UPDATE_RATE_HZ: u8 = 10;

/// Interval at which [`FanService::policy_tick`] should be driven.
pub const POLICY_TICK_INTERVAL: Duration = Duration::from_millis(1_000 / POLICY_UPDATE_RATE_HZ as u32);

/// Interval at which [`FanService::speed_tick`] should be driven.
///
/// The capture hardware raises no change events, so the service polls the latest sample and
/// diffs it against the previous one.
pub const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

const POWER_DESCRIPTION: &[u8] = b"Fan %";
const OVERRIDE_DESCRIPTION: &[u8] = b"Fan % - Override";
const SPEED_DESCRIPTION: &[u8] = b"Fan RPM";
const AGGREGATE_DESCRIPTION: &[u8] = b"Aggregated Service Data";
const COOLDOWN_DESCRIPTION: &[u8] = b"How long to continue filtering after conditions are acceptable";
const PASSIVE_MAX_DESCRIPTION: &[u8] = b"Filter if any VOC sensor reaches this threshold";
const IMPROVE_MIN_DESCRIPTION: &[u8] = b"Filter if intake exceeds exhaust by this threshold";

/// Handles bound to the fan service's attributes by the deployment's service table.
#[derive(Copy, Clone, Debug)]
pub struct FanHandles {
    pub power_value: Handle,
    pub power_description: Handle,
    pub override_value: Handle,
    pub override_description: Handle,
    pub speed_value: Handle,
    pub speed_description: Handle,
    pub aggregate_value: Handle,
    pub aggregate_description: Handle,
    pub aggregate_client_config: Handle,
    pub aggregate_server_config: Handle,
    pub cooldown_value: Handle,
    pub cooldown_description: Handle,
    pub voc_passive_max_value: Handle,
    pub voc_passive_max_description: Handle,
    pub voc_improve_min_value: Handle,
    pub voc_improve_min_description: Handle,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Attr {
    PowerValue,
    PowerDescription,
    OverrideValue,
    OverrideDescription,
    SpeedValue,
    SpeedDescription,
    AggregateValue,
    AggregateDescription,
    AggregateClientConfig,
    AggregateServerConfig,
    CooldownValue,
    CooldownDescription,
    VocPassiveMaxValue,
    VocPassiveMaxDescription,
    VocImproveMinValue,
    VocImproveMinDescription,
}

impl FanHandles {
    fn attr(&self, handle: Handle) -> Option<Attr> {
        let table = [
            (self.power_value, Attr::PowerValue),
            (self.power_description, Attr::PowerDescription),
            (self.override_value, Attr::OverrideValue),
            (self.override_description, Attr::OverrideDescription),
            (self.speed_value, Attr::SpeedValue),
            (self.speed_description, Attr::SpeedDescription),
            (self.aggregate_value, Attr::AggregateValue),
            (self.aggregate_description, Attr::AggregateDescription),
            (self.aggregate_client_config, Attr::AggregateClientConfig),
            (self.aggregate_server_config, Attr::AggregateServerConfig),
            (self.cooldown_value, Attr::CooldownValue),
            (self.cooldown_description, Attr::CooldownDescription),
            (self.voc_passive_max_value, Attr::VocPassiveMaxValue),
            (self.voc_passive_max_description, Attr::VocPassiveMaxDescription),
            (self.voc_improve_min_value, Attr::VocImproveMinValue),
            (self.voc_improve_min_description, Attr::VocImproveMinDescription),
        ];

        table
            .iter()
            .find(|&&(candidate, _)| candidate == handle)
            .map(|&(_, attr)| attr)
    }
}

/// Snapshot of the observable fan state.
///
/// Assembled fresh from live state for every aggregate read and every notification payload;
/// nothing is ever cached or persisted.
#[derive(Copy, Clone, Debug, AsBytes)]
#[repr(C)]
pub struct Aggregate {
    pub power: Percent8,
    pub power_override: Percent8,
    pub speed: Rpm16,
}

/// The fan service and its control loop.
///
/// Owns the commanded-power state, the policy, the PWM output, and the aggregate
/// characteristic's subscription registry. Create it before wiring up the periodic timers:
/// both ticks may notify through the registry.
pub struct FanService<S: NotificationSender, P: FanPwm, T: Tachometer> {
    handles: FanHandles,
    pwm: P,
    tachometer: T,
    /// Commanded fan power. Only ever derived from the override (while known) or from the
    /// policy's latest output; there is deliberately no public setter.
    power: Percent8,
    /// Manual override; not-known means automatic control.
    power_override: Percent8,
    policy: FanPolicy,
    policy_state: PolicyInstance,
    notify_aggregate: NotificationRegistry<S>,
    /// Previous tachometer sample, for the poll-and-diff in [`FanService::speed_tick`].
    last_speed: Rpm16,
}

impl<S, P, T> FanService<S, P, T>
where
    S: NotificationSender,
    P: FanPwm,
    T: Tachometer,
{
    /// Creates the service and drives the PWM to the initial commanded power (off).
    ///
    /// `on_aggregate_ready` is invoked by the stack once it can transmit a queued aggregate
    /// notification; it should serialize [`FanService::aggregate`] and hand the bytes to the
    /// stack's send path.
    pub fn new(handles: FanHandles, pwm: P, tachometer: T, on_aggregate_ready: fn(ConnHandle)) -> Self {
        let mut service = FanService {
            handles,
            pwm,
            tachometer,
            power: Percent8::new(0),
            power_override: Percent8::NOT_KNOWN,
            policy: FanPolicy::default(),
            policy_state: PolicyInstance::new(),
            notify_aggregate: NotificationRegistry::new(on_aggregate_ready),
            last_speed: Rpm16::new(0),
        };
        let initial = service.power.value_or(0);
        service.pwm.set_power(initial);
        service
    }

    /// The commanded fan power.
    pub fn power(&self) -> Percent8 {
        self.power
    }

    /// The manual override; not-known means the policy is in control.
    pub fn power_override(&self) -> Percent8 {
        self.power_override
    }

    /// The current policy configuration.
    pub fn policy(&self) -> &FanPolicy {
        &self.policy
    }

    /// Whether `conn` subscribed to aggregate notifications.
    pub fn aggregate_subscribed(&self, conn: ConnHandle) -> bool {
        self.notify_aggregate.is_subscribed(conn)
    }

    /// Builds the aggregate snapshot from live state.
    pub fn aggregate(&self) -> Aggregate {
        Aggregate {
            power: self.power,
            power_override: self.power_override,
            speed: self.tachometer.rpm(),
        }
    }

    /// Applies or clears the manual override.
    ///
    /// A known value takes effect as the commanded power immediately; not-known hands control
    /// back to the policy, which repopulates the commanded power on its next tick.
    pub fn set_power_override(&mut self, stack: &mut S, power: Percent8) {
        if self.power_override == power {
            return;
        }

        info!("fan override -> {:?}", power);
        self.power_override = power;
        self.notify_aggregate.notify_all(stack);

        if power.is_known() {
            self.set_power(stack, power);
        }
    }

    fn set_power(&mut self, stack: &mut S, power: Percent8) {
        if self.power == power {
            return;
        }

        debug!("fan power {:?} -> {:?}", self.power, power);
        self.power = power;
        self.notify_aggregate.notify_all(stack);
        self.pwm.set_power(power.value_or(0));
    }

    /// Re-runs the automatic policy against the latest sensor readings.
    ///
    /// Drive this at [`POLICY_TICK_INTERVAL`]. While an override is active the tick leaves the
    /// commanded power alone entirely.
    pub fn policy_tick(&mut self, stack: &mut S, now: Instant, env: &EnvironmentalReadings) {
        if self.power_override.is_known() {
            return;
        }

        let power = self.policy_state.update(&self.policy, now, env);
        self.set_power(stack, power);
    }

    /// Polls the tachometer and notifies subscribers when the measured speed changed.
    ///
    /// Drive this at [`SPEED_SAMPLE_INTERVAL`].
    pub fn speed_tick(&mut self, stack: &mut S) {
        let speed = self.tachometer.rpm();
        if speed == self.last_speed {
            return;
        }

        self.last_speed = speed;
        self.notify_aggregate.notify_all(stack);
    }
}

impl<S, P, T> Service<S> for FanService<S, P, T>
where
    S: NotificationSender,
    P: FanPwm,
    T: Tachometer,
{
    fn attr_read(
        &mut self,
        conn: ConnHandle,
        handle: Handle,
        offset: u16,
        buffer: &mut [u8],
    ) -> Option<usize> {
        let copied = match self.handles.attr(handle)? {
            Attr::PowerDescription => read_blob(POWER_DESCRIPTION, offset, buffer),
            Attr::OverrideDescription => read_blob(OVERRIDE_DESCRIPTION, offset, buffer),
            Attr::SpeedDescription => read_blob(SPEED_DESCRIPTION, offset, buffer),
            Attr::AggregateDescription => read_blob(AGGREGATE_DESCRIPTION, offset, buffer),
            Attr::CooldownDescription => read_blob(COOLDOWN_DESCRIPTION, offset, buffer),
            Attr::VocPassiveMaxDescription => read_blob(PASSIVE_MAX_DESCRIPTION, offset, buffer),
            Attr::VocImproveMinDescription => read_blob(IMPROVE_MIN_DESCRIPTION, offset, buffer),

            Attr::PowerValue => read_blob(self.power.as_bytes(), offset, buffer),
            Attr::OverrideValue => read_blob(self.power_override.as_bytes(), offset, buffer),
            Attr::SpeedValue => read_blob(self.tachometer.rpm().as_bytes(), offset, buffer),
            Attr::AggregateValue => read_blob(self.aggregate().as_bytes(), offset, buffer),

            Attr::CooldownValue => read_blob(self.policy.cooldown.as_bytes(), offset, buffer),
            Attr::VocPassiveMaxValue => read_blob(self.policy.voc_passive_max.as_bytes(), offset, buffer),
            Attr::VocImproveMinValue => read_blob(self.policy.voc_improve_min.as_bytes(), offset, buffer),

            Attr::AggregateClientConfig => {
                let raw = self.notify_aggregate.client_configuration(conn).to_le_bytes();
                read_blob(&raw, offset, buffer)
            }
            Attr::AggregateServerConfig => {
                let raw = SERVER_CONFIG_BROADCAST.to_le_bytes();
                read_blob(&raw, offset, buffer)
            }
        };

        Some(copied)
    }

    fn attr_write(
        &mut self,
        stack: &mut S,
        conn: ConnHandle,
        handle: Handle,
        offset: u16,
        payload: &[u8],
    ) -> Option<Result<(), ErrorCode>> {
        // A starting offset past the end of the payload is malformed; reject it before a
        // cursor over the payload even exists.
        if usize::from(offset) > payload.len() {
            return Some(Err(ErrorCode::InvalidOffset));
        }

        let mut cursor = WriteCursor::new(payload, offset);
        let result = match self.handles.attr(handle)? {
            Attr::CooldownValue => cursor.consume_exact::<Seconds16>().map(|value| {
                self.policy.cooldown = value;
            }),
            Attr::VocPassiveMaxValue => cursor.consume_exact::<VocIndex>().map(|value| {
                self.policy.voc_passive_max = value;
            }),
            Attr::VocImproveMinValue => cursor.consume_exact::<VocIndex>().map(|value| {
                self.policy.voc_improve_min = value;
            }),

            Attr::AggregateClientConfig => {
                self.notify_aggregate.write_client_configuration(stack, conn, &mut cursor)
            }

            Attr::OverrideValue => cursor.consume::<Percent8>().map(|value| {
                self.set_power_override(stack, value);
            }),

            // The remaining attributes are read-only; without a write case here the event
            // falls through to the next service and ultimately to the stack's own rejection.
            _ => return None,
        };

        if let Err(ref e) = result {
            trace!("fan write {:?} rejected ({}): {:?}", handle, e, HexSlice(payload));
        }

        Some(result.map_err(ErrorCode::from))
    }

    fn disconnected(&mut self, stack: &mut S, conn: ConnHandle) {
        self.notify_aggregate.unsubscribe(stack, conn);
    }
}
