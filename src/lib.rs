//! Digital-evolution core.
//!
//! Organisms are self-replicating programs running on small virtual CPUs
//! ([`hardware`]). A population scheduler ([`schedule`]) shares time between
//! them in proportion to merit, and an isolated [`test_cpu`] measures a
//! genome's fitness without touching the population.

pub mod config;
pub mod environment;
pub mod hardware;
pub mod organism;
pub mod schedule;
pub mod test_cpu;
pub mod types;
pub mod utils;
pub mod world;
