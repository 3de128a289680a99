//! Per-sample control logic: trust, thresholds, priority resolution, alerts.
//!
//! Everything here is deterministic and I/O free; the orchestrator feeds it
//! samples and configuration and dispatches whatever comes out.

pub mod alerts;
pub mod anomaly;
pub mod intent;
pub mod threshold;

pub use alerts::{Alert, AlertKind, AlertTracker};
pub use anomaly::{AnomalyFilter, AnomalyReason, GaussianModel, OutlierModel, PassthroughModel, Verdict};
pub use intent::{ActuatorIntent, IntentSource, resolve};
