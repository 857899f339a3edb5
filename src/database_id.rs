//! ID type definitions for records owned by the backend.

/// Alias for the integer type the backend uses for transaction IDs.
pub type TransactionId = i64;

/// Alias for the integer type the backend uses for tag IDs.
pub type TagId = i64;
