//! An in-memory Transactions API for tests.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;

use crate::{
    Error,
    api::{
        BulkUpdateRequest, BulkUpdateResponse, BulkUpdateStatus, CategoryUpdate, LabelUpdate,
        TransactionPageQuery, TransactionsApi, TransactionsResponse,
    },
    change_log::{NewLogEntry, TransactionLog},
    database_id::{TagId, TransactionId},
    query_state::{BulkOperationKind, SortColumn, SortDirection, parse_month},
    transaction::{StatusField, Tag, Transaction, TransactionType},
};

#[derive(Default)]
struct StubState {
    transactions: Vec<Transaction>,
    tags: Vec<Tag>,
    failure: Option<String>,
    bulk_rejection: Option<String>,
    fetch_delays: VecDeque<Duration>,
    bulk_delay: Option<Duration>,
    fetch_queries: Vec<TransactionPageQuery>,
    bulk_requests: Vec<BulkUpdateRequest>,
    category_updates: Vec<(TransactionId, CategoryUpdate)>,
    label_updates: Vec<(TransactionId, LabelUpdate)>,
    logs: Vec<TransactionLog>,
    log_failure: Option<String>,
}

/// Filters, sorts and pages a fixed list of transactions the way the backend
/// does, and applies edits to it.
#[derive(Default)]
pub(crate) struct StubApi {
    state: Mutex<StubState>,
}

impl StubApi {
    pub(crate) fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let api = Self::default();
        api.lock().transactions = transactions;
        api
    }

    pub(crate) fn with_tags(self, tags: Vec<Tag>) -> Self {
        self.lock().tags = tags;
        self
    }

    /// Fail every following call with a network error.
    pub(crate) fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_owned());
    }

    pub(crate) fn recover(&self) {
        self.lock().failure = None;
    }

    /// Answer bulk updates with an error status.
    pub(crate) fn reject_bulk_updates(&self, message: &str) {
        self.lock().bulk_rejection = Some(message.to_owned());
    }

    /// Delay the next fetches, one duration per fetch.
    pub(crate) fn delay_fetches(&self, delays: impl IntoIterator<Item = Duration>) {
        self.lock().fetch_delays.extend(delays);
    }

    /// Delay every bulk update.
    pub(crate) fn delay_bulk_updates(&self, delay: Duration) {
        self.lock().bulk_delay = Some(delay);
    }

    pub(crate) fn fetch_queries(&self) -> Vec<TransactionPageQuery> {
        self.lock().fetch_queries.clone()
    }

    pub(crate) fn bulk_requests(&self) -> Vec<BulkUpdateRequest> {
        self.lock().bulk_requests.clone()
    }

    pub(crate) fn category_updates(&self) -> Vec<(TransactionId, CategoryUpdate)> {
        self.lock().category_updates.clone()
    }

    pub(crate) fn label_updates(&self) -> Vec<(TransactionId, LabelUpdate)> {
        self.lock().label_updates.clone()
    }

    /// Fail every following change log write, leaving other calls alone.
    pub(crate) fn fail_logs_with(&self, message: &str) {
        self.lock().log_failure = Some(message.to_owned());
    }

    pub(crate) fn logs(&self) -> Vec<TransactionLog> {
        self.lock().logs.clone()
    }

    pub(crate) fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.lock()
            .transactions
            .iter()
            .find(|transaction| transaction.id == id)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    fn check_failure(&self) -> Result<(), Error> {
        match &self.lock().failure {
            Some(message) => Err(Error::Network(message.clone())),
            None => Ok(()),
        }
    }

    fn edit(&self, id: TransactionId, change: impl FnOnce(&mut Transaction)) -> Result<(), Error> {
        self.check_failure()?;
        let mut state = self.lock();
        let transaction = state
            .transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or(Error::Api {
                status: 404,
                message: "Transaction not found".to_owned(),
            })?;
        change(transaction);
        Ok(())
    }
}

fn matches_query(transaction: &Transaction, query: &TransactionPageQuery) -> bool {
    if let Some(transaction_type) = query.transaction_type
        && transaction.transaction_type() != transaction_type
    {
        return false;
    }

    if let Some(search) = &query.search
        && !transaction
            .display_label()
            .to_lowercase()
            .contains(&search.to_lowercase())
    {
        return false;
    }

    if query.min_amount.is_some_and(|min| transaction.amount < min)
        || query.max_amount.is_some_and(|max| transaction.amount > max)
    {
        return false;
    }

    match query.month.as_deref().map(parse_month) {
        Some(Ok(month)) => transaction.date.month() == month,
        _ => true,
    }
}

#[async_trait]
impl TransactionsApi for StubApi {
    async fn fetch_transactions(
        &self,
        query: &TransactionPageQuery,
    ) -> Result<TransactionsResponse, Error> {
        let delay = {
            let mut state = self.lock();
            state.fetch_queries.push(query.clone());
            state.fetch_delays.pop_front()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;

        let mut matching: Vec<Transaction> = self
            .lock()
            .transactions
            .iter()
            .filter(|transaction| matches_query(transaction, query))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = match query.sort_column {
                SortColumn::Date => a.date.cmp(&b.date),
                SortColumn::Label => a.display_label().cmp(b.display_label()),
                SortColumn::Amount => a.amount.total_cmp(&b.amount),
            };
            match query.sort_direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total_records = matching.len() as u64;
        let skip = (query.page.saturating_sub(1) * query.page_size) as usize;
        let transactions = matching
            .into_iter()
            .skip(skip)
            .take(query.page_size as usize)
            .collect();

        Ok(TransactionsResponse {
            transactions,
            total_records,
        })
    }

    async fn bulk_update(&self, request: &BulkUpdateRequest) -> Result<BulkUpdateResponse, Error> {
        let delay = self.lock().bulk_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;
        let mut state = self.lock();
        state.bulk_requests.push(request.clone());

        if let Some(message) = state.bulk_rejection.clone() {
            return Ok(BulkUpdateResponse {
                status: BulkUpdateStatus::Error,
                updated_count: 0,
                message: Some(message),
            });
        }

        let mut updated_count = 0;
        for transaction in state
            .transactions
            .iter_mut()
            .filter(|transaction| request.transaction_ids.contains(&transaction.id))
        {
            let data = &request.data;
            match request.operation {
                BulkOperationKind::Business => transaction.business = true,
                BulkOperationKind::Personal => transaction.business = false,
                BulkOperationKind::Label => {
                    transaction.custom = data["label"].as_str().map(str::to_owned)
                }
                BulkOperationKind::Tag => transaction.tag_id = data["tagId"].as_i64(),
                BulkOperationKind::Category => {
                    transaction.category = data["category"].as_str().map(str::to_owned)
                }
                BulkOperationKind::Status => {
                    for (field, value) in data.as_object().into_iter().flatten() {
                        let (Ok(field), Some(value)) = (field.parse::<StatusField>(), value.as_bool()) else {
                            continue;
                        };
                        match field {
                            StatusField::Flag => transaction.flag = value,
                            StatusField::Lock => transaction.lock = value,
                            StatusField::Hidden => transaction.hidden = value,
                            StatusField::Split => transaction.split = value,
                        }
                    }
                }
            }
            updated_count += 1;
        }

        Ok(BulkUpdateResponse {
            status: BulkUpdateStatus::Success,
            updated_count,
            message: None,
        })
    }

    async fn update_transaction_category(
        &self,
        id: TransactionId,
        update: &CategoryUpdate,
    ) -> Result<(), Error> {
        self.edit(id, |transaction| {
            transaction.business = update.business;
            transaction.flag = update.flag;
            transaction.lock = update.lock;
            transaction.hidden = update.hidden;
            transaction.split = update.split;
        })?;
        self.lock().category_updates.push((id, *update));
        Ok(())
    }

    async fn update_label(&self, id: TransactionId, update: &LabelUpdate) -> Result<(), Error> {
        let mut bank_label = None;
        self.edit(id, |transaction| {
            transaction.custom = Some(update.label.clone());
            bank_label = Some(transaction.label.clone());
        })?;

        let mut state = self.lock();
        if update.replace_all_label {
            for transaction in state
                .transactions
                .iter_mut()
                .filter(|transaction| Some(&transaction.label) == bank_label.as_ref())
            {
                transaction.custom = Some(update.label.clone());
            }
        }
        state.label_updates.push((id, update.clone()));
        Ok(())
    }

    async fn update_transaction_tag(&self, id: TransactionId, tag_id: TagId) -> Result<(), Error> {
        let tag = self.lock().tags.iter().find(|tag| tag.id == tag_id).cloned();
        self.edit(id, |transaction| {
            transaction.tag_id = Some(tag_id);
            transaction.tag = tag;
        })
    }

    async fn fetch_tags(&self, tag_type: Option<TransactionType>) -> Result<Vec<Tag>, Error> {
        self.check_failure()?;
        Ok(self
            .lock()
            .tags
            .iter()
            .filter(|tag| tag_type.is_none_or(|tag_type| tag.tag_type == tag_type))
            .cloned()
            .collect())
    }

    async fn add_log(&self, entry: &NewLogEntry) -> Result<(), Error> {
        self.check_failure()?;
        let mut state = self.lock();
        if let Some(message) = &state.log_failure {
            return Err(Error::Api {
                status: 500,
                message: message.clone(),
            });
        }

        let id = state.logs.len() as i64 + 1;
        state.logs.push(TransactionLog {
            id,
            timestamp: format!("2024-03-31T00:00:{id:02}.000Z"),
            transaction_id: entry.transaction_id,
            field_name: entry.field_name.clone(),
            old_value: Some(entry.old_value.clone()),
            new_value: Some(entry.new_value.clone()),
            method: entry.method,
            special: None,
            comment: None,
            algo: None,
            prior_trans_log_id: None,
        });
        Ok(())
    }

    async fn fetch_logs(&self, id: TransactionId) -> Result<Vec<TransactionLog>, Error> {
        self.check_failure()?;
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|log| log.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn log_count(&self, id: TransactionId) -> Result<u64, Error> {
        Ok(self.fetch_logs(id).await?.len() as u64)
    }
}
