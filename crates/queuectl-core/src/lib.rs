//! # queuectl-core
//!
//! The core of a single-host background job orchestrator: a persistent job
//! store contract, the atomic claim protocol competing workers rely on, the
//! worker execution loop (process supervision, timeout, capture, retry /
//! backoff / dead-letter policy), and the scheduler ordering (priority +
//! readiness + FIFO tie-break).
//!
//! ## Architecture
//!
//! ```text
//! JobManager.enqueue() ──► JobStore::insert()
//!
//!          ┌─────────────────────────────┐
//!          │        PoolSupervisor       │
//!          │  worker-1 ... worker-N      │
//!          └──────────────┬──────────────┘
//!                         │ spawns
//!                         ▼
//!                     Worker.run()
//!               ┌───────────┴────────────┐
//!               │  loop:                 │
//!               │   claim_next()  ◄──────┼── JobStore (atomic claim)
//!               │   Executor.run()       │
//!               │   finalize/retry/dead  │
//!               └─────────────────────────┘
//! ```
//!
//! `JobStore` is a trait: `queuectl-sqlite` provides the concrete,
//! transactional implementation. Everything in this crate is backend
//! agnostic and runtime-deterministic (the `Clock` trait is injectable, so
//! scheduling and backoff tests never sleep for real time).
//!
//! This crate does not persist anything itself, spawn an HTTP server, or
//! parse CLI arguments — those are `queuectl-sqlite`, `queuectl-dashboard`,
//! and `queuectl-cli` respectively.

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod model;
mod process_group;
pub mod pool;
pub mod status;
pub mod store;
pub mod worker;

pub use clock::{Clock, SystemClock, TestClock};
pub use config::{Config, ConfigKey};
pub use error::{ManagerError, StoreError};
pub use executor::{Executor, Outcome};
pub use manager::{EnqueueSpec, JobManager};
pub use model::{Job, JobState};
pub use pool::PoolSupervisor;
pub use status::{ActiveWorkerCounter, JobLogs, StatusReader, StatusSnapshot};
pub use store::{Aggregate, AttemptResult, JobStore, ListFilter, NewJob};
pub use worker::{LogSink, NoopLogSink, Worker};
