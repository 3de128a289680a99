//! Host-side link to the node: transport ports, endpoint discovery and the
//! reconnecting supervisor.

pub mod discovery;
pub mod supervisor;
pub mod transport;

pub use discovery::{HardwareSignature, select};
pub use supervisor::{Inbound, LinkEvent, LinkStatus, LinkSupervisor};
pub use transport::{EndpointInfo, SerialBackend, Transport, write_all};
