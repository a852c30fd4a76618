//! gator: a command-line RSS aggregator.
//!
//! Feeds are registered per user and polled one at a time by the
//! [`ingest::Scheduler`], which stores each new item as a post in SQLite.

pub mod cli;
pub mod commands;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
