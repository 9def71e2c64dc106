//! Database access layer
//!
//! One module per entity; handlers load parent rows through these
//! functions and apply the access predicates before acting.

pub mod agents;
pub mod meetings;
pub mod sessions;
pub mod transcripts;
pub mod votes;
