//! Review client
//!
//! The consumer side of the server: submit jobs and poll them to a terminal
//! state, then review the results with index-independent edits.
//!
//! Transports implement [`ReviewApi`]: [`HttpApi`] talks to a running server,
//! [`LocalApi`] drives an in-process [`AppState`](crate::state::AppState).

mod api;
mod http;
mod local;
mod poller;
mod reconciler;

pub use api::{ClientError, ReviewApi};
pub use http::HttpApi;
pub use local::LocalApi;
pub use poller::{JobOutcome, JobPoll, PollingClient};
pub use reconciler::{EditOutcome, EditReconciler, UndoEntry, UndoOutcome, UndoStack};
