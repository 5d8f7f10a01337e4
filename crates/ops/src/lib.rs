//! Coordination primitives for asynchronous UI-facing work.
//!
//! Two independent components live here:
//! * [`CallCoordinator`]: drives one logical async call at a time and lets only
//!   the newest, non-invalidated invocation update observable state.
//! * [`QueueDrainer`]: consumes a caller-owned [`JobQueue`] strictly one job at a
//!   time, in submission order, removing each entry only after it settles.
//!
//! Neither component performs I/O. Operations and jobs are injected as opaque
//! futures; this crate only decides when their results may take effect.

pub mod call;
mod class;
pub mod config;
pub mod error;
pub mod field;
pub mod outcome;
pub mod queue;
mod spawn;
mod token;

pub use call::{CallCoordinator, CallState, ErrorTextSetter, Settlement};
pub use class::TaskClass;
pub use config::{CallConfig, DisplayConfig, OpsConfig, QueueConfig};
pub use error::{Error, Result};
pub use field::AsyncField;
pub use outcome::{DEFAULT_ERROR_MESSAGE, FieldErrors, Outcome};
pub use queue::{DrainerHandle, JobExit, JobId, JobQueue, QueueDrainer, QueueEntry, QueueSnapshot, Remover};
pub use spawn::{join_error_panic_message, spawn};
