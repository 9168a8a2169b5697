//! Maildrop listings returned by STAT, LIST and UIDL.

/// Maildrop summary from `STAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatInfo {
    /// Number of messages, excluding those marked deleted.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}

/// One line of a `LIST` scan listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    /// Message number.
    pub message: u32,
    /// Size in octets.
    pub size: u64,
}

/// One line of a `UIDL` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidlEntry {
    /// Message number.
    pub message: u32,
    /// Server-assigned unique id, stable across sessions.
    pub uid: String,
}
