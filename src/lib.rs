//! Wave Survival co-op simulation
//!
//! A deterministic fixed-timestep wave-survival simulation for one or two
//! players, with host-authoritative replication to a predicting guest over
//! an in-process relay.
//!
//! # Layout
//!
//! - `game` - state, pools, spatial grid, systems and the tick pipeline
//! - `net` - relay messages, snapshot codec, host and guest roles
//! - `relay` - rooms, roster and frame routing
//! - `metrics` - Prometheus-style counters

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod relay;
pub mod metrics;
