//! # Event Builder
//!
//! Single merge thread zipping per-worker streams into composite events.
//!
//! Responsibilities:
//! - Wait until every worker has a frame, then pop one from each
//! - Tag the set with the next sequence number and deliver it to every sink
//! - Drain remaining complete sets after `stop`
//!
//! ## Usage
//!
//! ```ignore
//! use event_builder::EventBuilder;
//!
//! let mut builder = EventBuilder::new(workers, sinks, &settings);
//! builder.start()?;
//! // ...
//! builder.stop();
//! while !builder.is_finished() {
//!     std::thread::sleep(poll);
//! }
//! ```

pub mod alignment;
mod builder;
mod error;

pub use alignment::{Alignment, AlignmentCheck, PositionOnly, TimestampSpread};
pub use builder::{BuilderState, EventBuilder};
pub use error::{BuilderError, Result};
