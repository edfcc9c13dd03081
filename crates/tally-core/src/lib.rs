// crates/tally-core/src/lib.rs
//
// tally-core: Core types, traits, and error taxonomy for the Tally points ledger.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines participant identities, the explicit time value threaded through
// every operation, the capability traits implemented by accounting sources
// and custody backends, and the ledger event stream.

pub mod budget;
pub mod error;
pub mod events;
pub mod identity;
pub mod time;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use tally_core::ParticipantId;`

pub use budget::QueryBudget;
pub use error::TallyError;
pub use events::{EventLog, LedgerEvent, DEFAULT_EVENT_CAPACITY};
pub use identity::{ParticipantId, PositionId};
pub use time::Moment;
pub use traits::{AccountingSource, BalanceCustody, PenaltySource};
