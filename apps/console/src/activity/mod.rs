pub mod export;
pub mod filter;
pub mod history;
pub mod lifecycle;
pub mod row_key;
pub mod window;

pub use export::{ExportError, ExportFile, ExportFormat};
pub use filter::{ActivityKind, FilterCache, FilterParams};
pub use history::{ActivityHistory, PushOutcome};
pub use lifecycle::{FetchTicket, LivenessGuard, ViewLifecycle};
pub use row_key::RowKey;
pub use window::{ExpansionTable, Measurer, RowHeights, RowState, Viewport};
