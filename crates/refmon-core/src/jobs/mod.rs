//! Job pipeline: change detection, dispatching and single-flight execution.
//!
//! Requests flow dispatcher → worker on one channel, responses flow back on
//! another. The dispatcher never blocks on a job; the worker never touches
//! dispatcher state.

pub mod dispatch;
pub mod types;
pub mod watcher;
pub mod worker;

pub use dispatch::{Dispatcher, MonitorState, OperatorCommand};
pub use types::{JobKind, JobRequest, JobResponse};
pub use watcher::{Change, ChangeWatcher};
pub use worker::spawn_worker;
