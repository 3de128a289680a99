//! Actuator intents and the priority resolver.
//!
//! Every control source (threshold rules, humidifier cycle, emergency band,
//! operator) produces [`ActuatorIntent`]s.  [`resolve`] collapses them into
//! exactly one authoritative intent per `(zone, actuator)`:
//!
//! ```text
//!   Manual  >  EmergencyOverride  >  CycleController  >  ThresholdPolicy
//! ```

use serde::{Deserialize, Serialize};

use crate::protocol::{SwitchState, ZoneId};

/// Origin of an intent.  Declaration order is priority order (lowest first),
/// so the derived `Ord` is the resolver's ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    ThresholdPolicy,
    CycleController,
    EmergencyOverride,
    Manual,
}

/// Desired state for one actuator, tagged with where the wish came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorIntent {
    pub zone: ZoneId,
    pub actuator: String,
    pub state: SwitchState,
    pub source: IntentSource,
}

impl ActuatorIntent {
    pub fn new(
        zone: impl Into<ZoneId>,
        actuator: impl Into<String>,
        state: SwitchState,
        source: IntentSource,
    ) -> Self {
        Self {
            zone: zone.into(),
            actuator: actuator.into(),
            state,
            source,
        }
    }

    fn outranks(&self, other: &Self) -> bool {
        match self.source.cmp(&other.source) {
            core::cmp::Ordering::Greater => true,
            core::cmp::Ordering::Less => false,
            // Same source disagreeing with itself: run the load.
            core::cmp::Ordering::Equal => self.state.is_on() && !other.state.is_on(),
        }
    }
}

/// Reduce `intents` to one per `(zone, actuator)`, highest priority winning.
///
/// Output order follows first appearance in the input.
pub fn resolve(intents: &[ActuatorIntent]) -> Vec<ActuatorIntent> {
    let mut out: Vec<ActuatorIntent> = Vec::new();
    for intent in intents {
        match out
            .iter_mut()
            .find(|w| w.zone == intent.zone && w.actuator == intent.actuator)
        {
            Some(winner) => {
                if intent.outranks(winner) {
                    *winner = intent.clone();
                }
            }
            None => out.push(intent.clone()),
        }
    }
    out
}
