//! Core library for the `lwm2m-stress` CLI.
//!
//! The centerpiece is [`registration`]: it turns one callback-driven LwM2M
//! registration handshake into a single bounded, synchronous sample result.
//! [`coap`] provides the plain-UDP protocol client, [`runner`] drives many
//! samples concurrently, and [`metrics`] summarizes them. The primary
//! user-facing interface is the `lwm2m-stress` command-line application;
//! library APIs may evolve as the CLI grows.
pub mod args;
pub mod coap;
pub mod config;
pub mod entry;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod registration;
pub mod runner;
pub mod shutdown;
