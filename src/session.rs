//! One open transaction list: the query state, the page on display and the
//! controls that change them.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    AppConfig, Error,
    api::{BulkUpdateResponse, CategoryUpdate, LabelUpdate, TransactionsApi},
    bulk_selection::{BulkOperation, BulkSelectionController},
    change_log::{NewLogEntry, TransactionLog},
    database_id::{TagId, TransactionId},
    fetcher::{FetchOutcome, TransactionFetcher, TransactionList},
    filter_panel::FilterPanel,
    pagination::{PaginationController, PaginationIndicator},
    query_state::{BulkOperationKind, FetchKey, TransactionQueryState, ValidationError},
    query_store::QueryStateHandle,
    transaction::{StatusField, Tag, Transaction, TransactionType},
    url_sync::{merge_query_string, to_query_string},
};

/// Wires the query state, the fetcher, pagination, the filter panel and the
/// bulk selection to one Transactions API.
///
/// The list is refetched when the part of the state that decides which rows
/// are shown changes, see [TransactionsSession::sync]. Changing the bulk
/// selection alone never refetches.
pub struct TransactionsSession {
    handle: QueryStateHandle,
    api: Arc<dyn TransactionsApi>,
    fetcher: TransactionFetcher,
    pagination: PaginationController,
    filter_panel: FilterPanel,
    bulk: BulkSelectionController,
    max_pages: u64,
    last_fetch_key: Option<FetchKey>,
    error: Option<String>,
}

impl TransactionsSession {
    /// Open the list with the state restored in `handle`.
    ///
    /// A non-empty `initial_query` (the query string the list was opened
    /// with) takes precedence over the restored state for the keys it
    /// carries. Nothing is fetched until [TransactionsSession::sync] or
    /// [TransactionsSession::refresh] is called.
    pub fn open(
        handle: QueryStateHandle,
        api: Arc<dyn TransactionsApi>,
        config: &AppConfig,
        initial_query: Option<&str>,
    ) -> Self {
        if let Some(query) = initial_query {
            let merged = merge_query_string(&handle.current(), query);
            if let Err(error) = handle.update(|state| *state = merged) {
                tracing::warn!("ignoring query string \"{query}\": {error}");
            }
        }

        Self {
            fetcher: TransactionFetcher::new(api.clone(), config.page_size()),
            pagination: PaginationController::new(&config.pagination),
            filter_panel: FilterPanel::new(config.search_debounce),
            bulk: BulkSelectionController::new(),
            max_pages: config.pagination.max_pages,
            handle,
            api,
            last_fetch_key: None,
            error: None,
        }
    }

    /// The query state.
    pub fn handle(&self) -> &QueryStateHandle {
        &self.handle
    }

    /// A copy of the current query state.
    pub fn state(&self) -> TransactionQueryState {
        self.handle.current()
    }

    /// Receive every accepted change to the query state.
    pub fn subscribe(&self) -> watch::Receiver<TransactionQueryState> {
        self.handle.subscribe()
    }

    /// The shareable query string for the current state.
    pub fn query_string(&self) -> String {
        to_query_string(&self.handle.current())
    }

    /// The page on display.
    pub fn list(&self) -> TransactionList {
        self.fetcher.list()
    }

    /// Page count and position.
    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    /// The page indicator for the current page.
    pub fn page_indicators(&self) -> Vec<PaginationIndicator> {
        self.pagination.indicators(self.max_pages)
    }

    /// Whether a bulk update is in flight.
    pub fn is_updating(&self) -> bool {
        self.bulk.is_updating()
    }

    /// The message to show the user: the last failed request, or else the
    /// last rejected filter change.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().or(self.filter_panel.error())
    }

    /// Hide the error message.
    pub fn dismiss_error(&mut self) {
        self.error = None;
        self.filter_panel.dismiss_error();
    }

    /// Refetch the current page.
    pub async fn refresh(&mut self) -> FetchOutcome {
        let key = self.handle.current().fetch_key();
        let outcome = self
            .fetcher
            .fetch_page(&key, self.pagination.page())
            .await;

        match &outcome {
            FetchOutcome::Loaded => {
                let list = self.fetcher.list();
                self.pagination.set_total_records(list.total_records);
                self.error = None;
                if let Err(error) = self.bulk.drop_ineligible(&self.handle, &list.rows) {
                    tracing::warn!("could not update the bulk selection: {error}");
                }
            }
            FetchOutcome::Failed(message) => {
                self.pagination.set_total_records(0);
                self.error = Some(message.clone());
            }
            FetchOutcome::Superseded => {}
        }
        self.last_fetch_key = Some(key);

        outcome
    }

    /// Refetch if the rows on display no longer match the query state.
    ///
    /// A change to the filters, type, sort or visibility preferences goes
    /// back to the first page. Returns `None` if nothing needed fetching.
    pub async fn sync(&mut self) -> Option<FetchOutcome> {
        let key = self.handle.current().fetch_key();
        match &self.last_fetch_key {
            Some(last) if *last == key => return None,
            Some(_) => {
                tracing::debug!("query changed, going back to the first page");
                self.pagination.reset();
            }
            None => {}
        }

        Some(self.refresh().await)
    }

    /// Fetch `page` without checking it against the page count, for opening
    /// the list on a page other than the first.
    pub async fn load_page(&mut self, page: u64) -> FetchOutcome {
        self.pagination.set_page_unchecked(page);
        self.refresh().await
    }

    /// Go to `page` and fetch it. Pages outside `[1, total_pages]` are
    /// ignored and return `None`.
    pub async fn go_to_page(&mut self, page: u64) -> Option<FetchOutcome> {
        let mut requested = None;
        self.pagination.go_to(page, |page| requested = Some(page));

        match requested {
            Some(_) => Some(self.refresh().await),
            None => None,
        }
    }

    /// Change the filters through the filter panel, then refetch if needed.
    ///
    /// # Errors
    /// Returns the error of `edit`, in which case the state is unchanged and
    /// nothing is fetched.
    pub async fn edit_filters<R>(
        &mut self,
        edit: impl FnOnce(&mut FilterPanel, &QueryStateHandle) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let value = edit(&mut self.filter_panel, &self.handle)?;
        self.sync().await;

        Ok(value)
    }

    /// Record a keystroke in the search box.
    pub fn type_search(&mut self, text: &str) {
        self.filter_panel.type_search(text);
    }

    /// Wait for search input to settle, see [FilterPanel::settled_search].
    pub async fn settled_search(&mut self) -> String {
        self.filter_panel.settled_search().await
    }

    fn row(&self, id: TransactionId) -> Result<Transaction, Error> {
        self.fetcher
            .list()
            .rows
            .into_iter()
            .find(|row| row.id == id)
            .ok_or(Error::TransactionNotOnPage(id))
    }

    /// Select or deselect the row with `id` on the current page.
    ///
    /// # Errors
    /// Returns [Error::TransactionNotOnPage] if there is no such row.
    pub fn toggle_row(&mut self, id: TransactionId) -> Result<(), Error> {
        let row = self.row(id)?;
        self.bulk.toggle_row(&self.handle, &row)
    }

    /// Select every eligible row on the current page.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn select_all_eligible(&mut self) -> Result<(), Error> {
        self.bulk
            .select_all_eligible(&self.handle, &self.fetcher.list().rows)
    }

    /// Pick rows for `target`, keeping only selected rows on the current page
    /// that are eligible for it.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn change_bulk_target(&mut self, target: BulkOperationKind) -> Result<(), Error> {
        self.bulk
            .change_target(&self.handle, target, &self.fetcher.list().rows)
    }

    /// Set the new label for a bulk label change.
    ///
    /// # Errors
    /// Returns an error if the selection is not in label-edit mode.
    pub fn set_bulk_label(&mut self, label: &str) -> Result<(), Error> {
        self.bulk.set_label(&self.handle, label)
    }

    /// Leave bulk mode.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn clear_selection(&mut self) -> Result<(), Error> {
        self.bulk.clear(&self.handle)
    }

    /// Apply `operation` to the selection and refetch the page.
    ///
    /// # Errors
    /// Returns the error of [BulkSelectionController::apply_bulk], which is
    /// also shown as the session error. The selection is kept.
    pub async fn apply_bulk(
        &mut self,
        operation: &BulkOperation,
    ) -> Result<BulkUpdateResponse, Error> {
        let result = self
            .bulk
            .apply_bulk(&self.handle, self.api.as_ref(), operation)
            .await;

        match result {
            Ok(response) => {
                tracing::info!("bulk update changed {} transactions", response.updated_count);
                self.refresh().await;
                Ok(response)
            }
            Err(error) => Err(self.surface(error)),
        }
    }

    /// Apply the label typed in label-edit mode to the selection.
    ///
    /// # Errors
    /// Returns [Error::Validation] if no label was set, or any error of
    /// [TransactionsSession::apply_bulk].
    pub async fn apply_bulk_label(&mut self) -> Result<BulkUpdateResponse, Error> {
        let label = self
            .handle
            .current()
            .bulk_selection
            .label
            .unwrap_or_default();

        self.apply_bulk(&BulkOperation::Label { label }).await
    }

    /// Give the row with `id` a custom label.
    ///
    /// # Errors
    /// See [TransactionsSession::relabel].
    pub async fn update_label(&mut self, id: TransactionId, label: &str) -> Result<(), Error> {
        self.relabel(id, LabelUpdate::single(label)).await
    }

    /// Give the row with `id` the label in `update`, and every transaction
    /// with the same bank label too if `update` asks for it.
    ///
    /// # Errors
    /// Returns [ValidationError::EmptyLabel] for a blank label,
    /// [Error::TransactionNotOnPage] if the row is not on display, or the API
    /// error if the request fails.
    pub async fn relabel(
        &mut self,
        id: TransactionId,
        mut update: LabelUpdate,
    ) -> Result<(), Error> {
        update.label = update.label.trim().to_owned();
        if update.label.is_empty() {
            return Err(self.surface(ValidationError::EmptyLabel.into()));
        }
        let row = self.row(id).map_err(|error| self.surface(error))?;

        let result = self.api.update_label(id, &update).await;
        self.finish_edit(result, Some(NewLogEntry::label(&row, &update.label)))
            .await
    }

    /// Flip one status flag of the row with `id`, keeping its other flags.
    ///
    /// # Errors
    /// Returns [Error::TransactionNotOnPage] if the row is not on display, or
    /// the API error if the request fails.
    pub async fn toggle_status(&mut self, id: TransactionId, field: StatusField) -> Result<(), Error> {
        let row = self.row(id).map_err(|error| self.surface(error))?;
        let mut update = CategoryUpdate::from(&row);
        match field {
            StatusField::Flag => update.flag = !update.flag,
            StatusField::Lock => update.lock = !update.lock,
            StatusField::Hidden => update.hidden = !update.hidden,
            StatusField::Split => update.split = !update.split,
        }

        let result = self.api.update_transaction_category(id, &update).await;
        self.finish_edit(result, Some(NewLogEntry::status(&row, field)))
            .await
    }

    /// Move the row with `id` to the business or the personal side.
    ///
    /// The status flags are left as they are.
    ///
    /// # Errors
    /// Returns [Error::TransactionNotOnPage] if the row is not on display, or
    /// the API error if the request fails.
    pub async fn set_business(&mut self, id: TransactionId, business: bool) -> Result<(), Error> {
        let row = self.row(id).map_err(|error| self.surface(error))?;
        let update = CategoryUpdate {
            business,
            ..CategoryUpdate::from(&row)
        };

        let result = self.api.update_transaction_category(id, &update).await;
        self.finish_edit(result, Some(NewLogEntry::side(&row, business)))
            .await
    }

    /// Assign the tag `tag_id` to the transaction with `id`.
    ///
    /// # Errors
    /// Returns the API error if the request fails.
    pub async fn assign_tag(&mut self, id: TransactionId, tag_id: TagId) -> Result<(), Error> {
        let result = self.api.update_transaction_tag(id, tag_id).await;
        self.finish_edit(result, None).await
    }

    /// List the tags for `tag_type`, or every tag.
    ///
    /// # Errors
    /// Returns the API error if the request fails.
    pub async fn tags(&mut self, tag_type: Option<TransactionType>) -> Result<Vec<Tag>, Error> {
        let result = self.api.fetch_tags(tag_type).await;
        result.map_err(|error| self.surface(error))
    }

    /// The change log of the transaction with `id`, oldest first as sent by
    /// the backend.
    ///
    /// # Errors
    /// Returns the API error if the request fails.
    pub async fn history(&mut self, id: TransactionId) -> Result<Vec<TransactionLog>, Error> {
        let result = self.api.fetch_logs(id).await;
        result.map_err(|error| self.surface(error))
    }

    /// The number of change log entries for the transaction with `id`, or 0
    /// if they cannot be counted.
    pub async fn log_count(&self, id: TransactionId) -> u64 {
        self.api
            .log_count(id)
            .await
            .inspect_err(|error| tracing::warn!("could not count changes to {id}: {error}"))
            .unwrap_or(0)
    }

    /// Refetch after a successful edit and record `change` in the change log.
    ///
    /// The edit stands even if it cannot be logged, the failure is only shown
    /// as the session error.
    async fn finish_edit(
        &mut self,
        result: Result<(), Error>,
        change: Option<NewLogEntry>,
    ) -> Result<(), Error> {
        if let Err(error) = result {
            return Err(self.surface(error));
        }

        let logged = match &change {
            Some(entry) => self.api.add_log(entry).await,
            None => Ok(()),
        };
        self.refresh().await;

        if let Err(error) = logged {
            tracing::warn!("could not log the change: {error}");
            self.error = Some(format!("The change was saved but not logged: {error}"));
        }
        Ok(())
    }

    fn surface(&mut self, error: Error) -> Error {
        if error.is_validation() {
            tracing::warn!("{error}");
        } else {
            tracing::error!("{error}");
        }
        self.error = Some(error.to_string());
        error
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        AppConfig, Error,
        api::{BulkUpdateStatus, LabelUpdate},
        bulk_selection::BulkOperation,
        change_log::ChangeMethod,
        fetcher::FetchOutcome,
        filter_panel::AmountBound,
        query_state::{BulkOperationKind, SortColumn},
        test_utils::{StubApi, get_test_handle, sample_transactions},
        transaction::{StatusField, Tag, TransactionType},
    };

    use super::TransactionsSession;

    fn page_size_config(page_size: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.pagination.default_page_size = page_size;
        config
    }

    fn open_session(api: Arc<StubApi>, page_size: u64) -> TransactionsSession {
        TransactionsSession::open(get_test_handle(), api, &page_size_config(page_size), None)
    }

    fn ids(session: &TransactionsSession) -> Vec<i64> {
        session.list().rows.iter().map(|row| row.id).collect()
    }

    #[tokio::test]
    async fn first_sync_fetches_first_page() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 4);

        let outcome = session.sync().await;

        assert_eq!(outcome, Some(FetchOutcome::Loaded));
        assert_eq!(session.pagination().total_pages(), 3);
        assert_eq!(ids(&session), vec![10, 9, 8, 7]);
        assert_eq!(session.sync().await, None, "nothing changed");
    }

    #[tokio::test]
    async fn query_string_overrides_restored_state() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let handle = get_test_handle();
        handle
            .update(|state| state.filters.search = Some("old".to_owned()))
            .unwrap();

        let session = TransactionsSession::open(
            handle,
            api,
            &AppConfig::default(),
            Some("?type=BUSINESS&sortColumn=amount&sortDirection=asc"),
        );

        let state = session.state();
        assert_eq!(state.transaction_type, Some(TransactionType::Business));
        assert_eq!(state.filters.search, None);
        assert_eq!(state.sort.column, SortColumn::Amount);
        assert_eq!(
            session.query_string(),
            "type=BUSINESS&sortColumn=amount&sortDirection=asc"
        );
    }

    #[tokio::test]
    async fn filter_change_refetches_from_first_page() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 2);
        session.sync().await;
        session.go_to_page(3).await;
        assert_eq!(session.pagination().page(), 3);

        session
            .edit_filters(|panel, handle| panel.set_amount(handle, AmountBound::Min, "50"))
            .await
            .unwrap();

        assert_eq!(session.pagination().page(), 1);
        let last_query = api.fetch_queries().pop().unwrap();
        assert_eq!(last_query.page, 1);
        assert_eq!(last_query.min_amount, Some(50.0));
    }

    #[tokio::test]
    async fn rejected_filter_change_does_not_fetch() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session
            .edit_filters(|panel, handle| panel.set_amount(handle, AmountBound::Max, "10"))
            .await
            .unwrap();
        let fetches = api.fetch_queries().len();

        let result = session
            .edit_filters(|panel, handle| panel.set_amount(handle, AmountBound::Min, "50"))
            .await;

        assert!(result.is_err());
        assert_eq!(api.fetch_queries().len(), fetches);
        assert_eq!(
            session.error(),
            Some("Minimum amount cannot be greater than maximum amount")
        );
    }

    #[tokio::test]
    async fn selection_change_does_not_refetch() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        session
            .change_bulk_target(BulkOperationKind::Label)
            .unwrap();
        session.toggle_row(1).unwrap();

        assert_eq!(session.sync().await, None);
        assert_eq!(api.fetch_queries().len(), 1);
    }

    #[tokio::test]
    async fn go_to_page_outside_range_is_ignored() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 4);
        session.sync().await;

        assert_eq!(session.go_to_page(0).await, None);
        assert_eq!(session.go_to_page(4).await, None);
        assert_eq!(session.go_to_page(3).await, Some(FetchOutcome::Loaded));
        assert_eq!(ids(&session), vec![2, 1]);
    }

    #[tokio::test]
    async fn bulk_update_refreshes_list() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;
        session
            .change_bulk_target(BulkOperationKind::Business)
            .unwrap();
        session.select_all_eligible().unwrap();

        let response = session.apply_bulk(&BulkOperation::Business).await.unwrap();

        // Odd IDs except the locked #3 and the hidden #5, which is not on display.
        assert_eq!(response.status, BulkUpdateStatus::Success);
        assert_eq!(response.updated_count, 3);
        assert!(session.state().bulk_selection.selected_ids.is_empty());
        assert!(session.list().rows.iter().find(|row| row.id == 9).unwrap().business);
        assert_eq!(api.fetch_queries().len(), 2);
    }

    #[tokio::test]
    async fn failed_bulk_update_is_surfaced_and_keeps_selection() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        api.reject_bulk_updates("Bulk update failed: 1 row is locked");
        let mut session = open_session(api.clone(), 20);
        session.sync().await;
        session.change_bulk_target(BulkOperationKind::Label).unwrap();
        session.select_all_eligible().unwrap();
        session.set_bulk_label("Client lunch").unwrap();

        let result = session.apply_bulk_label().await;

        assert!(matches!(result, Err(Error::BulkUpdateFailed(_))));
        assert_eq!(session.error(), Some("Bulk update failed: 1 row is locked"));
        assert_eq!(session.state().bulk_selection.selected_ids.len(), 8);
        assert_eq!(
            session.state().bulk_selection.label.as_deref(),
            Some("Client lunch")
        );
    }

    #[tokio::test]
    async fn toggle_status_carries_other_flags() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        session.toggle_status(7, StatusField::Split).await.unwrap();

        let (id, update) = api.category_updates().pop().unwrap();
        assert_eq!(id, 7);
        assert!(update.flag, "flag should be carried over");
        assert!(update.split);
        assert!(!update.business);
        assert!(api.transaction(7).unwrap().split);
    }

    #[tokio::test]
    async fn set_business_switches_side() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        session.set_business(2, false).await.unwrap();
        session.set_business(7, true).await.unwrap();

        assert!(!api.transaction(2).unwrap().business);
        assert!(!session.list().rows.iter().find(|row| row.id == 2).unwrap().business);
        let moved = api.transaction(7).unwrap();
        assert!(moved.business);
        assert!(moved.flag, "status flags survive a side switch");
    }

    #[tokio::test]
    async fn edit_of_row_not_on_page_is_rejected() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        let result = session.toggle_status(5, StatusField::Flag).await;

        assert_eq!(result, Err(Error::TransactionNotOnPage(5)));
        assert!(api.category_updates().is_empty());
    }

    #[tokio::test]
    async fn label_and_tag_edits_refresh_the_list() {
        let tags = vec![Tag {
            id: 4,
            name: "Home office".to_owned(),
            tag_type: TransactionType::Business,
        }];
        let api = Arc::new(StubApi::with_transactions(sample_transactions()).with_tags(tags));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        session.update_label(2, "Desk lamp").await.unwrap();
        session.assign_tag(2, 4).await.unwrap();

        let row = session
            .list()
            .rows
            .into_iter()
            .find(|row| row.id == 2)
            .unwrap();
        assert_eq!(row.display_label(), "Desk lamp");
        assert_eq!(row.tag.map(|tag| tag.name).as_deref(), Some("Home office"));
        assert_eq!(
            session.tags(Some(TransactionType::Personal)).await.unwrap(),
            vec![]
        );
    }

    #[tokio::test]
    async fn failed_edit_is_surfaced() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;
        api.fail_with("timed out");

        let result = session.update_label(2, "Desk lamp").await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert!(session.error().unwrap().contains("timed out"));
        assert_eq!(session.list().rows.len(), 9, "list is left as it was");
    }

    #[tokio::test]
    async fn failed_fetch_is_surfaced() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        api.fail_with("connection refused");
        let mut session = open_session(api.clone(), 20);

        let outcome = session.sync().await;

        assert!(matches!(outcome, Some(FetchOutcome::Failed(_))));
        assert!(session.list().rows.is_empty());
        assert_eq!(session.pagination().total_pages(), 0);
        assert!(session.error().is_some());
    }

    #[tokio::test]
    async fn refresh_drops_rows_that_became_ineligible() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;
        session.change_bulk_target(BulkOperationKind::Tag).unwrap();
        session.toggle_row(1).unwrap();
        session.toggle_row(2).unwrap();

        session.toggle_status(1, StatusField::Lock).await.unwrap();

        assert_eq!(
            session.state().bulk_selection.selected_ids.into_iter().collect::<Vec<_>>(),
            vec![2]
        );
        session.apply_bulk(&BulkOperation::Tag { tag_id: 4 }).await.unwrap();
        assert_eq!(api.bulk_requests()[0].transaction_ids, vec![2]);
    }

    #[tokio::test]
    async fn edits_are_logged_with_old_and_new_values() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        session.update_label(2, "  Desk lamp ").await.unwrap();
        session.toggle_status(2, StatusField::Flag).await.unwrap();
        session.set_business(2, false).await.unwrap();

        let history = session.history(2).await.unwrap();
        let changes: Vec<_> = history
            .iter()
            .map(|log| {
                (
                    log.field_name.as_str(),
                    log.old_value.as_deref(),
                    log.new_value.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                ("label", Some("TRANSACTION 2"), Some("Desk lamp")),
                ("flag", Some("false"), Some("true")),
                ("business", Some("business"), Some("personal")),
            ]
        );
        assert!(history.iter().all(|log| log.method == ChangeMethod::Human));
        assert_eq!(session.log_count(2).await, 3);
        assert_eq!(session.log_count(4).await, 0);
    }

    #[tokio::test]
    async fn failed_log_write_keeps_the_edit() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        api.fail_logs_with("log table is read-only");
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        let result = session.toggle_status(4, StatusField::Hidden).await;

        assert_eq!(result, Ok(()));
        assert!(api.transaction(4).unwrap().hidden);
        assert!(api.logs().is_empty());
        assert!(session.error().unwrap().contains("log table is read-only"));
    }

    #[tokio::test]
    async fn failed_edit_is_not_logged() {
        let api = Arc::new(StubApi::with_transactions(sample_transactions()));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;
        api.fail_with("timed out");

        assert!(session.set_business(1, true).await.is_err());

        assert!(api.logs().is_empty());
        assert_eq!(session.log_count(1).await, 0, "count falls back to 0");
    }

    #[tokio::test]
    async fn relabel_can_cover_every_matching_bank_label() {
        let mut transactions = sample_transactions();
        transactions[3].label = "TRANSACTION 2".to_owned();
        let api = Arc::new(StubApi::with_transactions(transactions));
        let mut session = open_session(api.clone(), 20);
        session.sync().await;

        session
            .relabel(
                2,
                LabelUpdate::single("Stationery")
                    .replace_all(true)
                    .for_future(true),
            )
            .await
            .unwrap();

        let (id, update) = api.label_updates().pop().unwrap();
        assert_eq!(id, 2);
        assert!(update.replace_all_label);
        assert!(update.apply_to_future);
        assert_eq!(api.transaction(4).unwrap().display_label(), "Stationery");
        assert_eq!(api.transaction(6).unwrap().display_label(), "TRANSACTION 6");
    }
}
