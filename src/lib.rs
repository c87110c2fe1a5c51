//! # beanstalk-worker
//!
//! Long-running beanstalkd workers. A worker supplies one work step; the
//! runtime loops it with a memory ceiling, a fixed pause between
//! iterations, and an append-only per-worker log file.
//!
//! Provides the worker loop, queue facades over an injected client, a
//! beanstalkd client, a worker registry, and the runner behind the
//! `beanstalk-worker` CLI.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod telemetry;
pub mod worker;
pub mod workers;
