//! Fetches pages of transactions and narrows them for display.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    api::{TransactionPageQuery, TransactionsApi},
    query_state::FetchKey,
    transaction::Transaction,
};

/// The page of transactions on display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionList {
    /// The page that was fetched.
    pub page: u64,
    /// The rows left after the visibility preferences were applied.
    pub rows: Vec<Transaction>,
    /// The server's count of matching transactions across all pages.
    ///
    /// Rows removed by the visibility preferences are still counted.
    pub total_records: u64,
    /// How many rows of this page the visibility preferences removed.
    pub hidden_by_preferences: usize,
    /// The message of the last failed fetch.
    pub error: Option<String>,
    /// Whether a fetch is in flight.
    pub is_loading: bool,
}

/// What became of a call to [TransactionFetcher::fetch_page].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The page was fetched and is on display.
    Loaded,
    /// The fetch failed, the list was emptied and the error recorded.
    Failed(String),
    /// A newer fetch was started before this one finished, so its response
    /// was dropped.
    Superseded,
}

/// Turns the query state and a page number into a backend query and keeps
/// the latest result.
///
/// Every fetch takes a ticket. Only the response to the newest ticket is
/// applied, so a slow response can never overwrite a newer one.
pub struct TransactionFetcher {
    api: Arc<dyn TransactionsApi>,
    page_size: u64,
    latest_ticket: AtomicU64,
    list: Mutex<TransactionList>,
}

impl TransactionFetcher {
    /// Create a fetcher requesting `page_size` rows per page.
    pub fn new(api: Arc<dyn TransactionsApi>, page_size: u64) -> Self {
        Self {
            api,
            page_size,
            latest_ticket: AtomicU64::new(0),
            list: Mutex::new(TransactionList::default()),
        }
    }

    /// The number of rows requested per page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// A copy of the list on display.
    pub fn list(&self) -> TransactionList {
        self.lock_list().clone()
    }

    fn lock_list(&self) -> std::sync::MutexGuard<'_, TransactionList> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch `page` of the list described by `key`.
    ///
    /// Failures never propagate: the list is emptied, the count reset to 0
    /// and the error message kept in [TransactionList::error].
    pub async fn fetch_page(&self, key: &FetchKey, page: u64) -> FetchOutcome {
        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock_list().is_loading = true;

        let query = TransactionPageQuery::new(key, page, self.page_size);
        tracing::debug!("fetch #{ticket}: {query:?}");
        let result = self.api.fetch_transactions(&query).await;

        if self.latest_ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!("dropping response to fetch #{ticket}, a newer fetch was started");
            return FetchOutcome::Superseded;
        }

        let mut list = self.lock_list();
        list.is_loading = false;
        list.page = page;

        match result {
            Ok(response) => {
                let fetched = response.transactions.len();
                let rows: Vec<Transaction> = response
                    .transactions
                    .into_iter()
                    .filter(|row| key.visibility_preferences.shows(row))
                    .collect();

                list.hidden_by_preferences = fetched - rows.len();
                list.rows = rows;
                list.total_records = response.total_records;
                list.error = None;

                tracing::info!(
                    "loaded page {page}: {fetched} rows, {} hidden, {} in total",
                    list.hidden_by_preferences,
                    list.total_records
                );

                FetchOutcome::Loaded
            }
            Err(error) => {
                tracing::error!("error fetching transactions: {error}");
                let message = error.to_string();

                list.rows.clear();
                list.total_records = 0;
                list.hidden_by_preferences = 0;
                list.error = Some(message.clone());

                FetchOutcome::Failed(message)
            }
        }
    }
}
