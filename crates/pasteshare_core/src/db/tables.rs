//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// Canonical entry rows (`PasteEntry`, bincode-encoded), keyed by retrieval key.
pub const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Expiry index ordered by deadline millis then key.
///
/// Only entries with an `expire_at` appear here.
pub const ENTRIES_BY_EXPIRY: TableDefinition<(u64, &str), ()> =
    TableDefinition::new("entries_by_expiry");
