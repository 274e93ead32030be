//! Decoding and aggregation of DSMR P1 smart meter telegrams into a single
//! concurrently readable meter state, plus its Prometheus exposition.

pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod mqtt;
pub mod protocol;
pub mod state;
pub mod telegram;
pub mod units;
pub mod values;
