//! Core POP3 types.

mod capability;
mod listing;
mod reply;

pub use capability::Capability;
pub use listing::{ListEntry, StatInfo, UidlEntry};
pub use reply::{Reply, Status};
