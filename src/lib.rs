//! Tally is the transaction list core of an expense tracker.
//!
//! This library owns the query state of the transaction list (filters, sort
//! order, visibility preferences and the bulk selection), keeps it in durable
//! storage and in a shareable query string, and drives a remote Transactions
//! API to fetch pages and apply single-row and bulk edits.

#![warn(missing_docs)]

mod api;
mod bulk_selection;
mod change_log;
mod config;
mod database_id;
mod debounce;
mod fetcher;
mod filter_panel;
mod format;
mod http_client;
mod logging;
mod pagination;
mod query_state;
mod query_store;
mod session;
mod storage;
mod transaction;
mod url_sync;

#[cfg(test)]
mod test_utils;

pub use api::{
    BulkUpdateRequest, BulkUpdateResponse, BulkUpdateStatus, CategoryUpdate, LabelUpdate,
    TagUpdate, TransactionPageQuery, TransactionsApi, TransactionsResponse,
};
pub use bulk_selection::{BulkOperation, BulkSelectionController, is_eligible};
pub use change_log::{ChangeMethod, ChangeSpecial, LogCount, NewLogEntry, TransactionLog};
pub use config::{AppConfig, DEFAULT_STATE_DB};
pub use database_id::{TagId, TransactionId};
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
pub use fetcher::{FetchOutcome, TransactionFetcher, TransactionList};
pub use filter_panel::{AmountBound, FilterPanel};
pub use format::{currency, format_date};
pub use http_client::HttpTransactionsApi;
pub use logging::{LOG_BODY_LENGTH_LIMIT, log_body};
pub use pagination::{PaginationConfig, PaginationController, PaginationIndicator};
pub use query_state::{
    BulkOperationKind, BulkSelection, FetchKey, SortColumn, SortDirection, SortState,
    TransactionFilters, TransactionQueryState, ValidationError, VisibilityPreference,
    VisibilityPreferences, normalize_month,
};
pub use query_store::{FILTER_STORAGE_KEY, QueryStateHandle, QueryStateStore, parse_state};
pub use session::TransactionsSession;
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage};
pub use transaction::{StatusField, Tag, Transaction, TransactionBuilder, TransactionType};
pub use url_sync::{merge_query_string, to_query_string};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A state, or a change to it, broke one of the query state rules.
    ///
    /// These are handled locally and never reach the network.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The stored state blob is not a structurally valid query state.
    #[error("stored query state is corrupt: {0}")]
    CorruptState(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the lock on in-memory storage.
    #[error("could not acquire the storage lock")]
    StorageLockError,

    /// An error occurred while serializing a struct as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// The API base URL could not be parsed.
    #[error("invalid API URL \"{0}\"")]
    InvalidApiUrl(String),

    /// The request never got a response, e.g. the connection was refused or
    /// the request timed out.
    #[error("could not reach the Transactions API: {0}")]
    Network(String),

    /// The Transactions API answered with a non-success status code.
    ///
    /// `message` is the server's own error message when it sent one.
    #[error("the Transactions API returned {status}: {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the response body, or the status reason.
        message: String,
    },

    /// The Transactions API sent a body that could not be parsed.
    #[error("unexpected response from the Transactions API: {0}")]
    InvalidResponse(String),

    /// The backend accepted the bulk request but reported that it failed.
    #[error("{0}")]
    BulkUpdateFailed(String),

    /// A bulk update was requested with no transactions selected.
    #[error("No transactions selected")]
    EmptySelection,

    /// A bulk update was requested before choosing a bulk operation.
    #[error("choose a bulk operation before applying it")]
    NoBulkTarget,

    /// The bulk update does not match the operation the rows were selected
    /// for, e.g. applying a tag to rows picked for a label change.
    #[error("the selection was made for {selected} but the update is {requested}")]
    BulkTargetMismatch {
        /// The bulk target of the selection.
        selected: BulkOperationKind,
        /// The kind of the requested update.
        requested: BulkOperationKind,
    },

    /// A bulk update is already in flight.
    #[error("a bulk update is already in progress")]
    UpdateInProgress,

    /// The transaction is not on the current page.
    #[error("transaction {0} is not on the current page")]
    TransactionNotOnPage(TransactionId),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

impl Error {
    /// Whether this error was caught locally, before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::EmptySelection
                | Error::NoBulkTarget
                | Error::BulkTargetMismatch { .. }
                | Error::UpdateInProgress
        )
    }
}
