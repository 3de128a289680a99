//! Hysteresis threshold policy.
//!
//! ```text
//!   upper bound                         lower bound
//!
//!   ON ───────────┐ limit+margin ⇒ forced ON (latched until < limit)
//!                 │                        ┌────── OFF at/above limit
//!   hold ON       │ limit                  │ hold
//!   ──────────────┤                        │
//!   hold          │ limit - hysteresis     ├────── ON below limit-hysteresis
//!   OFF ──────────┘                        │ forced ON below that - margin
//! ```
//!
//! [`evaluate`] is a pure function: the only memory is the previous intent
//! vector the caller hands back in.

use crate::config::{Bound, ThresholdRule, ZonePolicy};
use crate::protocol::{SwitchState, TelemetrySample};

use super::intent::{ActuatorIntent, IntentSource};

/// Evaluate every threshold rule of `zone` against `sample`.
///
/// `previous` is the vector returned by the last call for this zone (empty
/// on the first call); entries are matched to rules by index.  The result
/// has exactly one intent per rule, in rule order.
pub fn evaluate(
    sample: &TelemetrySample,
    previous: &[ActuatorIntent],
    zone: &ZonePolicy,
) -> Vec<ActuatorIntent> {
    zone.thresholds
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let prev = previous.get(i).filter(|p| p.actuator == rule.actuator);
            let (state, source) = evaluate_rule(rule, rule.quantity.read(sample), prev);
            ActuatorIntent::new(zone.zone.clone(), rule.actuator.clone(), state, source)
        })
        .collect()
}

/// One rule, one value.  NaN compares false everywhere and so holds.
pub fn evaluate_rule(
    rule: &ThresholdRule,
    value: f32,
    previous: Option<&ActuatorIntent>,
) -> (SwitchState, IntentSource) {
    let was_on = previous.is_some_and(|p| p.state.is_on());
    let was_emergency = previous.is_some_and(|p| p.source == IntentSource::EmergencyOverride);
    let hold = (SwitchState::from_bool(was_on), IntentSource::ThresholdPolicy);
    let on = (SwitchState::On, IntentSource::ThresholdPolicy);
    let off = (SwitchState::Off, IntentSource::ThresholdPolicy);
    let emergency = (SwitchState::On, IntentSource::EmergencyOverride);

    match rule.bound {
        Bound::Upper => {
            if rule.emergency_margin.is_some_and(|m| value > rule.limit + m) {
                emergency
            } else if was_emergency && value >= rule.limit {
                emergency
            } else if value > rule.limit {
                on
            } else if value < rule.limit - rule.hysteresis {
                off
            } else {
                hold
            }
        }
        Bound::Lower => {
            let trigger = rule.limit - rule.hysteresis;
            if rule.emergency_margin.is_some_and(|m| value < trigger - m) {
                emergency
            } else if was_emergency && value < trigger {
                emergency
            } else if value < trigger {
                on
            } else if value >= rule.limit {
                off
            } else {
                hold
            }
        }
    }
}
