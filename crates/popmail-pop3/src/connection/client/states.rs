//! Type-state markers for POP3 session states (RFC 1939 section 3).

/// Marker type for the authorization state.
///
/// In this state, only login commands (USER/PASS, APOP) are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorization;

/// Marker type for the transaction state.
///
/// In this state, maildrop commands (STAT, LIST, RETR, DELE, ...) are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transaction;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_state_markers_are_send_sync() {
        _assert_send::<Authorization>();
        _assert_sync::<Authorization>();
        _assert_send::<Transaction>();
        _assert_sync::<Transaction>();
    }
}
