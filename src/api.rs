//! The contract between the list core and the Transactions API.
//!
//! The backend does the authoritative filtering, sorting and pagination over
//! the full data set. These types mirror its JSON wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    bulk_selection::BulkOperation,
    change_log::{NewLogEntry, TransactionLog},
    database_id::{TagId, TransactionId},
    query_state::{BulkOperationKind, FetchKey, SortColumn, SortDirection},
    transaction::{Tag, Transaction, TransactionType},
};

/// The query params for `GET /transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPageQuery {
    /// The page to fetch, starting from 1.
    pub page: u64,
    /// The number of transactions per page.
    pub page_size: u64,
    /// The column to sort by.
    pub sort_column: SortColumn,
    /// The direction to sort in.
    pub sort_direction: SortDirection,
    /// Only return business or personal transactions.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// Free text matched against the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Inclusive lower bound on the amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    /// Inclusive upper bound on the amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// Two-digit month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

impl TransactionPageQuery {
    /// The query for `page` of the list described by `key`.
    pub fn new(key: &FetchKey, page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            sort_column: key.sort.column,
            sort_direction: key.sort.direction,
            transaction_type: key.transaction_type,
            search: key.filters.search.clone(),
            min_amount: key.filters.min_amount,
            max_amount: key.filters.max_amount,
            month: key.filters.month.clone(),
        }
    }
}

/// One page of transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    /// The transactions on the page.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// The number of transactions matching the filters across all pages.
    #[serde(default)]
    pub total_records: u64,
}

/// The body of `POST /transactions/bulk-update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    /// The transactions to update.
    pub transaction_ids: Vec<TransactionId>,
    /// The kind of update.
    pub operation: BulkOperationKind,
    /// The fields the update sets, shaped by `operation`.
    pub data: serde_json::Value,
}

impl BulkUpdateRequest {
    /// A request applying `operation` to every transaction in
    /// `transaction_ids`.
    pub fn new(transaction_ids: impl IntoIterator<Item = TransactionId>, operation: &BulkOperation) -> Self {
        Self {
            transaction_ids: transaction_ids.into_iter().collect(),
            operation: operation.kind(),
            data: operation.data(),
        }
    }
}

/// Whether the backend applied a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkUpdateStatus {
    /// Every transaction was updated.
    Success,
    /// The update was rejected, see the message.
    Error,
}

/// The answer to a bulk update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResponse {
    /// Whether the update was applied.
    pub status: BulkUpdateStatus,
    /// How many transactions were changed.
    #[serde(default)]
    pub updated_count: u64,
    /// Why the update failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The body of `PUT /transactions/{id}/category`.
///
/// Every status flag is sent, so changing one flag means carrying over the
/// current values of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    /// `true` for business, `false` for personal.
    pub business: bool,
    /// Marked for review.
    pub flag: bool,
    /// Protected from edits.
    pub lock: bool,
    /// Hidden from the default list.
    pub hidden: bool,
    /// Split between business and personal use.
    pub split: bool,
    /// Left untouched by the backend when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<bool>,
    /// Left untouched by the backend when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<bool>,
}

impl From<&Transaction> for CategoryUpdate {
    fn from(transaction: &Transaction) -> Self {
        Self {
            business: transaction.business,
            flag: transaction.flag,
            lock: transaction.lock,
            hidden: transaction.hidden,
            split: transaction.split,
            income: Some(transaction.income),
            deposit: Some(transaction.deposit),
        }
    }
}

/// The body of `PUT /transactionlabel/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelUpdate {
    /// The new custom label.
    pub label: String,
    /// Also relabel every transaction with the same bank label.
    pub replace_all_label: bool,
    /// Create a rule so future imports get the label too.
    pub apply_to_future: bool,
}

impl LabelUpdate {
    /// Relabel a single transaction.
    pub fn single(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            replace_all_label: false,
            apply_to_future: false,
        }
    }

    /// Also relabel every transaction with the same bank label.
    pub fn replace_all(mut self, replace_all: bool) -> Self {
        self.replace_all_label = replace_all;
        self
    }

    /// Also label future imports with the same bank label.
    pub fn for_future(mut self, apply_to_future: bool) -> Self {
        self.apply_to_future = apply_to_future;
        self
    }
}

/// The body of `PUT /transactions/{id}/tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUpdate {
    /// The tag to assign.
    pub tag_id: TagId,
}

/// The Transactions API as seen by the list core.
///
/// Single-row edits do not return the updated row, callers refetch the page
/// instead.
#[async_trait]
pub trait TransactionsApi: Send + Sync {
    /// Fetch one page of transactions.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn fetch_transactions(
        &self,
        query: &TransactionPageQuery,
    ) -> Result<TransactionsResponse, Error>;

    /// Apply one update to many transactions in a single request.
    ///
    /// A response with [BulkUpdateStatus::Error] is returned as `Ok`, it is up
    /// to the caller to treat it as a failure.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn bulk_update(&self, request: &BulkUpdateRequest) -> Result<BulkUpdateResponse, Error>;

    /// Overwrite the status flags of a transaction.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    async fn update_transaction_category(
        &self,
        id: TransactionId,
        update: &CategoryUpdate,
    ) -> Result<(), Error>;

    /// Set the custom label of a transaction, and of others with the same
    /// bank label if `update` asks for it.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    async fn update_label(&self, id: TransactionId, update: &LabelUpdate) -> Result<(), Error>;

    /// Assign a tag to a transaction.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    async fn update_transaction_tag(&self, id: TransactionId, tag_id: TagId) -> Result<(), Error>;

    /// List the tags, optionally only those for business or personal
    /// transactions.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn fetch_tags(&self, tag_type: Option<TransactionType>) -> Result<Vec<Tag>, Error>;

    /// Record a change in the change log.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    async fn add_log(&self, entry: &NewLogEntry) -> Result<(), Error>;

    /// List the change log of a transaction.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn fetch_logs(&self, id: TransactionId) -> Result<Vec<TransactionLog>, Error>;

    /// Count the change log entries of a transaction.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn log_count(&self, id: TransactionId) -> Result<u64, Error>;
}
