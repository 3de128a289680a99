//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  Nothing here needs a serial port.

mod end_to_end_tests;
mod link_tests;
mod mock_link;
mod node_tests;
mod orchestrator_tests;
