//! Today's hydration record and everything that mutates it.
//!
//! - `consumption`: the snapshot type, derived totals and the mutation operations
//! - `history`: bounded undo entries
//! - `rollover`: day-boundary detection and the end-of-day snapshot
//! - `snap`: optional rounding of user-entered levels

pub mod consumption;
pub mod history;
pub mod rollover;
pub mod snap;

pub use consumption::{
    Celebration, CelebrationKind, ConsumptionState, DayContext, DaySummary, MutationOutcome,
};
pub use history::{Action, HistoryEntry, RhythmAttribution};
pub use rollover::{DayStatus, RolloverReport, RolloverTimer};
pub use snap::SnapMode;
