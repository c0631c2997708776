//! Alignment validation applied to every assembled set
//!
//! Matching stays purely positional. A check can only flag a set, never
//! drop or reorder it.

use contracts::{AlignmentConfig, WorkerFrame};

/// Outcome of one alignment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alignment {
    Aligned,
    Flagged(String),
}

/// Alignment check extension point
pub trait AlignmentCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluate one set of frames, all taken at the same pop position
    fn check(&self, frames: &[WorkerFrame]) -> Alignment;
}

/// Position zipping only; never flags
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionOnly;

impl AlignmentCheck for PositionOnly {
    fn name(&self) -> &'static str {
        "position"
    }

    fn check(&self, _frames: &[WorkerFrame]) -> Alignment {
        Alignment::Aligned
    }
}

/// Flags sets whose channel-0 timestamps differ by more than `max_spread` ticks
#[derive(Debug, Clone, Copy)]
pub struct TimestampSpread {
    pub max_spread: u64,
}

impl AlignmentCheck for TimestampSpread {
    fn name(&self) -> &'static str {
        "timestamp_spread"
    }

    fn check(&self, frames: &[WorkerFrame]) -> Alignment {
        let mut stamps = frames
            .iter()
            .filter_map(|f| f.frame.timestamp(0).map(|ts| (f.worker.as_str(), ts)));

        let Some(first) = stamps.next() else {
            return Alignment::Aligned;
        };
        let (lo, hi) = stamps.fold((first, first), |(lo, hi), cur| {
            (
                if cur.1 < lo.1 { cur } else { lo },
                if cur.1 > hi.1 { cur } else { hi },
            )
        });

        let spread = hi.1 - lo.1;
        if spread > self.max_spread {
            Alignment::Flagged(format!(
                "timestamp spread {spread} exceeds {} ({}={}, {}={})",
                self.max_spread, lo.0, lo.1, hi.0, hi.1
            ))
        } else {
            Alignment::Aligned
        }
    }
}

/// Build the check named by the configuration
pub fn from_config(config: &AlignmentConfig) -> Box<dyn AlignmentCheck> {
    match *config {
        AlignmentConfig::Position => Box::new(PositionOnly),
        AlignmentConfig::TimestampSpread { max_spread } => Box::new(TimestampSpread { max_spread }),
    }
}
