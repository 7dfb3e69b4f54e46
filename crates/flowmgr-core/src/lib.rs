//! flowmgr core
//!
//! Coordinates executions on a hosted state-machine workflow engine.
//!
//! This crate provides:
//! - Execution launcher linking each attempt to its logical run record
//! - Latest-execution resolver over append-ordered run history
//! - Cancellable outcome poller with timeout and backoff
//! - Remote function and subprocess invokers
//! - Outcome mapping to typed results or process exit codes
//! - In-memory and HTTP collaborators (engine, state store, function service)

pub mod config;
pub mod engine;
pub mod error;
pub mod functions;
mod http;
pub mod launcher;
pub mod manager;
pub mod mapper;
pub mod outcome;
pub mod payload;
pub mod poller;
pub mod resolver;
pub mod result_ext;
pub mod state;
pub mod subprocess;
pub mod types;

pub use config::{ManagerConfig, PollConfig};
pub use error::{Error, RemoteError, Result};
pub use launcher::{ExecutionLauncher, LaunchRequest, Launched};
pub use manager::{ExecutionManager, RunRequest};
pub use mapper::ProcessRenderer;
pub use outcome::{FailureSource, InvocationResult};
pub use result_ext::ResultExt;
pub use subprocess::SubprocessInvoker;
pub use types::{ErrorDetail, ExecutionDescription, ExecutionHandle, ExecutionState, RunRecord};

pub use tokio_util::sync::CancellationToken;
