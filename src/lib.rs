//! Logfold - event log folding and history search
//!
//! Consumes partitioned message logs, turns each message's embedded command
//! list into key/value store mutations, and tracks per-partition progress so
//! ingestion resumes where it stopped. A separate search path scans log
//! history for messages related to a target identifier.

pub mod broker;
pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod search;
pub mod storage;
pub mod utils;
