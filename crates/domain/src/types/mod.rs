//! Domain types and models

pub mod cycle;
pub mod event;
pub mod feed;
pub mod live;
pub mod range;
pub mod suppression;

pub use cycle::{CycleKind, CycleSummary};
pub use event::{
    Attributes, EventFields, EventRecord, Identity, IdentityKind, LastAction, LifecycleStatus,
    RecordKey, SourceKind, UpsertOutcome,
};
pub use feed::{FeedEvent, FeedQuery};
pub use live::{EventDraft, LiveEvent};
pub use range::{DateRange, TimeWindow};
pub use suppression::{SuppressionEntry, SuppressionMatch, SuppressionPattern};
