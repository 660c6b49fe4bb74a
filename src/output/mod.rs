//! Console-output capture: pumping, filtering, fan-out, and line history.
//!
//! The pumpers drain a child's pipes without ever letting them fill; decoded
//! lines flow through [`LineSink`]s into the bounded [`RingHistory`] (and,
//! when configured, the file-backed [`FileHistory`] and the live-tail
//! [`BroadcastBuffer`]). Pollers read everything through the
//! [`LineHistory`] catch-up contract.

pub mod broadcast;
pub mod filter;
pub mod history;
pub mod logfile;
pub mod pumper;
pub mod ring;
pub mod sink;

pub use broadcast::{BroadcastBuffer, BroadcastReader};
pub use filter::sanitize_line;
pub use history::{parse_skip_marker, skip_marker, HistoryError, LineHistory};
pub use logfile::FileHistory;
pub use pumper::{PumpOutcome, StreamPumper};
pub use ring::RingHistory;
pub use sink::{ByteSink, FnLineSink, LineSink, LoggingSink};
