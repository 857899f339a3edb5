//! Turns raw filter input into validated changes to the query state.

use std::time::Duration;

use crate::{
    Error,
    debounce::Debouncer,
    query_state::{
        SortColumn, TransactionFilters, ValidationError, VisibilityPreference,
        VisibilityPreferences, normalize_month,
    },
    query_store::QueryStateHandle,
    transaction::TransactionType,
};

/// One end of the amount range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountBound {
    /// `minAmount`
    Min,
    /// `maxAmount`
    Max,
}

/// The filter controls of the transaction list.
///
/// Every method returns the error it records, so callers can either show
/// [FilterPanel::error] or handle the result directly. A successful change
/// clears the recorded error.
#[derive(Debug)]
pub struct FilterPanel {
    search: Debouncer<String>,
    error: Option<String>,
}

impl FilterPanel {
    /// Create a panel that applies search input once it has been stable for
    /// `search_debounce`.
    pub fn new(search_debounce: Duration) -> Self {
        Self {
            search: Debouncer::new(search_debounce),
            error: None,
        }
    }

    /// The message of the last rejected change.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Forget the last error.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Record a keystroke in the search box. Nothing is applied until the
    /// input settles.
    pub fn type_search(&mut self, text: &str) {
        self.search.push(text.to_owned());
    }

    /// Whether search input is waiting to settle.
    pub fn search_pending(&self) -> bool {
        self.search.is_pending()
    }

    /// Wait for the search input to settle and return it.
    ///
    /// Never resolves while no input is pending.
    pub async fn settled_search(&mut self) -> String {
        self.search.settled().await
    }

    /// Apply settled search input. Blank input removes the search filter.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn apply_search(&mut self, handle: &QueryStateHandle, text: &str) -> Result<(), Error> {
        let search = Some(text.trim())
            .filter(|search| !search.is_empty())
            .map(str::to_owned);

        self.apply_filters(handle, |filters| filters.search = search)
    }

    /// Change the filters through `update`, keeping the old filters if the
    /// result is invalid.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the new filters break a rule, e.g. the
    /// minimum amount is above the maximum.
    pub fn apply_filters(
        &mut self,
        handle: &QueryStateHandle,
        update: impl FnOnce(&mut TransactionFilters),
    ) -> Result<(), Error> {
        let result = handle.update(|state| update(&mut state.filters));
        self.record(result)
    }

    /// Set one end of the amount range from raw input. Blank input removes
    /// that bound.
    ///
    /// # Errors
    /// Returns [ValidationError::InvalidAmount] if `raw` is not a number, or
    /// [ValidationError::AmountRange] if the range would be inverted.
    pub fn set_amount(
        &mut self,
        handle: &QueryStateHandle,
        bound: AmountBound,
        raw: &str,
    ) -> Result<(), Error> {
        let amount = match parse_amount(raw) {
            Ok(amount) => amount,
            Err(error) => return self.record(Err(error.into())),
        };

        self.apply_filters(handle, |filters| match bound {
            AmountBound::Min => filters.min_amount = amount,
            AmountBound::Max => filters.max_amount = amount,
        })
    }

    /// Set both ends of the amount range in one change.
    ///
    /// # Errors
    /// Returns [ValidationError::InvalidAmount] if either input is not a
    /// number, or [ValidationError::AmountRange] if the range is inverted.
    pub fn set_amount_range(
        &mut self,
        handle: &QueryStateHandle,
        min_raw: &str,
        max_raw: &str,
    ) -> Result<(), Error> {
        let (min_amount, max_amount) = match (parse_amount(min_raw), parse_amount(max_raw)) {
            (Ok(min), Ok(max)) => (min, max),
            (Err(error), _) | (_, Err(error)) => return self.record(Err(error.into())),
        };

        self.apply_filters(handle, |filters| {
            filters.min_amount = min_amount;
            filters.max_amount = max_amount;
        })
    }

    /// Set the month filter from raw input such as "3" or "03". Blank input
    /// removes the month filter.
    ///
    /// # Errors
    /// Returns [ValidationError::InvalidMonth] unless `raw` is a month number.
    pub fn set_month(&mut self, handle: &QueryStateHandle, raw: &str) -> Result<(), Error> {
        let month = if raw.trim().is_empty() {
            None
        } else {
            match normalize_month(raw) {
                Ok(month) => Some(month),
                Err(error) => return self.record(Err(error.into())),
            }
        };

        self.apply_filters(handle, |filters| filters.month = month)
    }

    /// Show only `transaction_type`, or stop filtering by type if it is the
    /// current type.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn toggle_type(
        &mut self,
        handle: &QueryStateHandle,
        transaction_type: TransactionType,
    ) -> Result<(), Error> {
        let result = handle.update(|state| {
            state.transaction_type = match state.transaction_type {
                Some(current) if current == transaction_type => None,
                _ => Some(transaction_type),
            };
        });
        self.record(result)
    }

    /// Clear every filter and the type in one change, and drop any pending
    /// search input.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn reset(&mut self, handle: &QueryStateHandle) -> Result<(), Error> {
        self.search.cancel();
        let result = handle.update(|state| {
            state.filters = TransactionFilters::default();
            state.transaction_type = None;
        });
        self.record(result)
    }

    /// Flip one visibility preference.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn toggle_visibility(
        &mut self,
        handle: &QueryStateHandle,
        preference: VisibilityPreference,
    ) -> Result<(), Error> {
        let result = handle.update(|state| state.visibility_preferences.toggle(preference));
        self.record(result)
    }

    /// Hide every hidden, locked, flagged and split transaction.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn clear_visibility(&mut self, handle: &QueryStateHandle) -> Result<(), Error> {
        let result =
            handle.update(|state| state.visibility_preferences = VisibilityPreferences::none());
        self.record(result)
    }

    /// Sort by `column`, see [crate::SortState::toggled].
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn sort_by(&mut self, handle: &QueryStateHandle, column: SortColumn) -> Result<(), Error> {
        let result = handle.update(|state| state.sort = state.sort.toggled(column));
        self.record(result)
    }

    fn record(&mut self, result: Result<(), Error>) -> Result<(), Error> {
        match &result {
            Ok(()) => self.error = None,
            Err(error) => {
                tracing::warn!("rejected filter change: {error}");
                self.error = Some(error.to_string());
            }
        }

        result
    }
}

fn parse_amount(raw: &str) -> Result<Option<f64>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(Some(amount)),
        _ => Err(ValidationError::InvalidAmount(raw.to_owned())),
    }
}
