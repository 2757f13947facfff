//! Refresh coordination for one CellarTracker account
//!
//! [`CellarData`] owns the fetch-then-aggregate cycle. It guarantees that:
//!
//! - only one refresh runs at a time; callers that arrive while one is in
//!   flight wait for it and share its outcome instead of fetching again
//! - a fetch is abandoned after the configured timeout
//! - a failed refresh leaves the last good snapshot in place
//! - every finished refresh is announced on a broadcast channel
//!
//! There is no global registry: each account gets its own `CellarData`,
//! passed explicitly to whoever needs it.

mod data;
mod error;
mod polling;

pub use data::{CellarData, CellarEvent, SharedCellarData, Snapshot};
pub use error::{FailureKind, RefreshError, SetupError};
pub use polling::PollingHandle;
