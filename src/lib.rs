//! Growctl — cultivation chamber climate control.
//!
//! The crate covers both ends of the node link:
//!
//! - **node side** ([`node`]): reading conditioner, relay bank and the
//!   safety watchdog that drops every relay when the host goes quiet;
//! - **host side** ([`link`], [`app`]): link supervision over USB serial and
//!   the automation orchestrator (anomaly filter, threshold policy,
//!   humidifier cycle, overrides).
//!
//! Both sides speak the line-JSON protocol in [`protocol`].  Nothing here
//! reads a clock directly; time is passed in as milliseconds.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod cycle;
pub mod error;
pub mod link;
pub mod node;
pub mod protocol;
pub mod sync;

pub use error::{Error, Result};
