//! Commsift - chat export ingestion and incident risk analysis
//!
//! Parses exported conversations from several platforms into one canonical
//! message model, then scores, flags, aggregates, correlates and time-orders
//! them into a single risk summary per case. Results are cached on disk keyed
//! by a fingerprint of the exact input files.

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod message;
pub mod runner;

pub use error::{CommsiftError, Result};
