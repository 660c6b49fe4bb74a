//! # Buildtail
//!
//! Build-execution and live console-output capture engine for CI servers.
//!
//! The engine launches a build command, drains its stdout/stderr without
//! deadlocking the child, keeps a bounded line history with absolute
//! sequence numbers, fans live output out to any number of late-joining
//! readers, and, once the process ends, keeps serving the same
//! "lines since offset X" protocol from the persisted log file.
//!
//! ## Modules
//!
//! - `exec` - Command values, the pluggable process spawner, and the build
//!   executor that pumps a child to completion
//! - `output` - Stream pumping, line filtering, the broadcast fan-out
//!   buffer, and the ring/file line histories
//! - `registry` - Per-build output composites, the ring-to-file hand-off,
//!   and the offset polling protocol

pub mod exec;
pub mod output;
pub mod registry;

pub use exec::{BuildCommand, BuildCommandBuilder, BuildExecutor, ExecError, ExecManager};
pub use output::{
    BroadcastBuffer, FileHistory, HistoryError, LineHistory, LineSink, RingHistory, StreamPumper,
};
pub use registry::{BuildOutput, OutputRegistry, PollResponse};
