//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                 | Connects to            |
//! |------------|----------------------------|------------------------|
//! | `clock`    | Clock                      | `std::time::Instant`   |
//! | `log_sink` | EventSink                  | `log` facade           |
//! | `serial`   | SerialBackend, Transport   | OS serial ports        |

pub mod clock;
pub mod log_sink;
#[cfg(feature = "serial")]
pub mod serial;
