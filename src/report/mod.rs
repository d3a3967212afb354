pub mod format;
pub mod kind;
pub mod present;
pub mod query;
pub mod range;
pub mod rows;
pub mod view;

pub use kind::ReportKind;
pub use present::{DisplayRow, Presentation, present};
pub use query::{ReportOutcome, run_report};
pub use range::{DateRange, DateRangeInput};
pub use rows::{Cell, ReportRows};
pub use view::{Snapshot, Ticket, ViewRegistry};
