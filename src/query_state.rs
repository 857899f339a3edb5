//! The query state that decides how the transaction list is viewed.
//!
//! [TransactionQueryState] is the single source of truth for filters, sort
//! order, visibility preferences and the bulk selection. It is persisted as a
//! versionless JSON blob, so every field here keeps the camelCase name the
//! stored blob uses.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionType},
};

/// Reasons a state, or a mutation of it, is rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    /// Both amount bounds are set and the lower bound is above the upper one.
    #[error("Minimum amount cannot be greater than maximum amount")]
    AmountRange {
        /// The lower bound that was rejected.
        min: f64,
        /// The upper bound that was rejected.
        max: f64,
    },

    /// An amount bound is not a finite number.
    #[error("\"{0}\" is not a valid amount")]
    InvalidAmount(String),

    /// The month filter does not name a month between 1 and 12.
    #[error("\"{0}\" is not a valid month, expected a number from 1 to 12")]
    InvalidMonth(String),

    /// A label update with nothing but whitespace.
    #[error("Label cannot be empty")]
    EmptyLabel,

    /// A transaction type other than business or personal.
    #[error("unknown transaction type \"{0}\"")]
    UnknownTransactionType(String),

    /// A bulk operation target that is not one of the known kinds.
    #[error("unknown bulk operation \"{0}\"")]
    UnknownBulkTarget(String),

    /// A status field other than flag, lock, hidden or split.
    #[error("unknown status field \"{0}\"")]
    UnknownStatusField(String),

    /// A sort column other than date, label or amount.
    #[error("unknown sort column \"{0}\"")]
    UnknownSortColumn(String),

    /// A visibility preference other than hidden, locked, flagged or split.
    #[error("unknown visibility preference \"{0}\"")]
    UnknownVisibilityPreference(String),
}

/// Which kinds of transactions survive the client-side display filter.
///
/// These are applied after the server has paginated, see
/// [crate::fetcher::TransactionFetcher].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityPreferences {
    /// Show transactions the user hid.
    pub show_hidden: bool,
    /// Show locked transactions.
    pub show_locked: bool,
    /// Show flagged transactions.
    pub show_flagged: bool,
    /// Show split transactions.
    pub show_split: bool,
}

impl Default for VisibilityPreferences {
    fn default() -> Self {
        Self {
            show_hidden: false,
            show_locked: true,
            show_flagged: true,
            show_split: true,
        }
    }
}

impl VisibilityPreferences {
    /// Whether `transaction` should be displayed under these preferences.
    pub fn shows(&self, transaction: &Transaction) -> bool {
        (!transaction.hidden || self.show_hidden)
            && (!transaction.lock || self.show_locked)
            && (!transaction.flag || self.show_flagged)
            && (!transaction.split || self.show_split)
    }

    /// Flip a single preference.
    pub fn toggle(&mut self, preference: VisibilityPreference) {
        let value = match preference {
            VisibilityPreference::Hidden => &mut self.show_hidden,
            VisibilityPreference::Locked => &mut self.show_locked,
            VisibilityPreference::Flagged => &mut self.show_flagged,
            VisibilityPreference::Split => &mut self.show_split,
        };
        *value = !*value;
    }

    /// Preferences that hide every hidden, locked, flagged and split row.
    pub fn none() -> Self {
        Self {
            show_hidden: false,
            show_locked: false,
            show_flagged: false,
            show_split: false,
        }
    }
}

/// Names one of the four [VisibilityPreferences].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityPreference {
    /// `showHidden`
    Hidden,
    /// `showLocked`
    Locked,
    /// `showFlagged`
    Flagged,
    /// `showSplit`
    Split,
}

impl FromStr for VisibilityPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hidden" => Ok(Self::Hidden),
            "locked" | "lock" => Ok(Self::Locked),
            "flagged" | "flag" => Ok(Self::Flagged),
            "split" => Ok(Self::Split),
            _ => Err(ValidationError::UnknownVisibilityPreference(s.to_owned()).into()),
        }
    }
}

/// The server-side filters for the transaction list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilters {
    /// Free text matched against the transaction label by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Inclusive lower bound on the amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    /// Inclusive upper bound on the amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// Two-digit month, "01" to "12".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

impl TransactionFilters {
    /// Check the filter invariants.
    ///
    /// # Errors
    /// Returns [ValidationError::AmountRange] if `min_amount > max_amount`,
    /// [ValidationError::InvalidAmount] for non-finite bounds, or
    /// [ValidationError::InvalidMonth] if the month is not in 1..=12.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for bound in [self.min_amount, self.max_amount].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(ValidationError::InvalidAmount(bound.to_string()));
            }
        }

        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount)
            && min > max
        {
            return Err(ValidationError::AmountRange { min, max });
        }

        if let Some(month) = &self.month {
            parse_month(month)?;
        }

        Ok(())
    }

    /// Whether no filter is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Parse a month number, accepting "3" as well as "03".
///
/// # Errors
/// Returns [ValidationError::InvalidMonth] unless `text` is an integer in
/// 1..=12.
pub fn parse_month(text: &str) -> Result<time::Month, ValidationError> {
    text.trim()
        .parse::<u8>()
        .ok()
        .and_then(|number| time::Month::try_from(number).ok())
        .ok_or_else(|| ValidationError::InvalidMonth(text.to_owned()))
}

/// Normalize month input to the stored two-digit form, e.g. "3" -> "03".
///
/// # Errors
/// Returns [ValidationError::InvalidMonth] if `text` is not a month number.
pub fn normalize_month(text: &str) -> Result<String, ValidationError> {
    let month = parse_month(text)?;
    Ok(format!("{:02}", u8::from(month)))
}

/// The column the transaction list is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    /// Transaction date.
    #[default]
    Date,
    /// Display label.
    Label,
    /// Amount.
    Amount,
}

impl SortColumn {
    /// The value used for this column in query strings.
    pub fn as_query_value(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Label => "label",
            Self::Amount => "amount",
        }
    }
}

impl FromStr for SortColumn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "label" => Ok(Self::Label),
            "amount" => Ok(Self::Amount),
            _ => Err(ValidationError::UnknownSortColumn(s.to_owned()).into()),
        }
    }
}

/// The order to sort transactions in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Sort in order of increasing value.
    Asc,
    /// Sort in order of decreasing value.
    #[default]
    Desc,
}

impl SortDirection {
    /// The value used for this direction in query strings.
    pub fn as_query_value(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Column and direction of the transaction list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    /// The column to sort by.
    pub column: SortColumn,
    /// The direction to sort in.
    pub direction: SortDirection,
}

impl SortState {
    /// The sort state after the user picks `column`.
    ///
    /// Picking the current column while it is ascending flips it to
    /// descending, every other pick sorts ascending.
    pub fn toggled(self, column: SortColumn) -> Self {
        let direction = if column == self.column && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };

        Self { column, direction }
    }
}

/// The kind of change a bulk update applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperationKind {
    /// Mark personal transactions as business.
    Business,
    /// Mark business transactions as personal.
    Personal,
    /// Replace the label.
    Label,
    /// Assign a deduction tag.
    Tag,
    /// Set the free-text category.
    Category,
    /// Set one of the status flags.
    Status,
}

impl BulkOperationKind {
    /// The value used for this kind in API requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Business => "BUSINESS",
            Self::Personal => "PERSONAL",
            Self::Label => "LABEL",
            Self::Tag => "TAG",
            Self::Category => "CATEGORY",
            Self::Status => "STATUS",
        }
    }
}

impl FromStr for BulkOperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUSINESS" => Ok(Self::Business),
            "PERSONAL" => Ok(Self::Personal),
            "LABEL" => Ok(Self::Label),
            "TAG" => Ok(Self::Tag),
            "CATEGORY" => Ok(Self::Category),
            "STATUS" => Ok(Self::Status),
            _ => Err(ValidationError::UnknownBulkTarget(s.to_owned()).into()),
        }
    }
}

impl Display for BulkOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The rows picked for a bulk update and the update they are picked for.
///
/// `selected_ids` is kept ordered so the stored blob and the bulk request are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSelection {
    /// The bulk operation the rows are being selected for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<BulkOperationKind>,
    /// IDs of the selected transactions.
    pub selected_ids: BTreeSet<TransactionId>,
    /// The new label while in label-edit mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BulkSelection {
    /// Whether `kind` is the active bulk operation.
    pub fn is_active(&self, kind: BulkOperationKind) -> bool {
        self.target_type == Some(kind)
    }

    /// Whether the selection is in label-edit mode.
    pub fn is_label_edit(&self) -> bool {
        self.is_active(BulkOperationKind::Label)
    }
}

/// Everything that decides how the transaction list is viewed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQueryState {
    /// The client-side display filter.
    pub visibility_preferences: VisibilityPreferences,
    /// Restrict the list to business or personal transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// The server-side filters.
    pub filters: TransactionFilters,
    /// The sort order.
    pub sort: SortState,
    /// The bulk selection.
    pub bulk_selection: BulkSelection,
}

impl TransactionQueryState {
    /// Check every invariant of the state.
    ///
    /// Structural checks (field presence, types and enum values) are done by
    /// deserialization, this checks the rules that cross fields.
    ///
    /// # Errors
    /// Returns the first [ValidationError] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.filters.validate()
    }

    /// The part of the state that decides which rows the backend returns and
    /// how they are displayed, i.e. everything except the bulk selection.
    pub fn fetch_key(&self) -> FetchKey {
        FetchKey {
            visibility_preferences: self.visibility_preferences,
            transaction_type: self.transaction_type,
            filters: self.filters.clone(),
            sort: self.sort,
        }
    }
}

/// The fetch-relevant projection of a [TransactionQueryState].
///
/// Two states with equal keys display the same page, so a change to the bulk
/// selection alone never triggers a refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchKey {
    /// See [TransactionQueryState::visibility_preferences].
    pub visibility_preferences: VisibilityPreferences,
    /// See [TransactionQueryState::transaction_type].
    pub transaction_type: Option<TransactionType>,
    /// See [TransactionQueryState::filters].
    pub filters: TransactionFilters,
    /// See [TransactionQueryState::sort].
    pub sort: SortState,
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::transaction::{StatusField, Transaction};

    use super::{
        SortColumn, SortDirection, SortState, TransactionFilters, TransactionQueryState,
        ValidationError, VisibilityPreference, VisibilityPreferences, normalize_month,
    };

    #[test]
    fn default_state_hides_only_hidden_rows() {
        let state = TransactionQueryState::default();

        assert_eq!(
            state.visibility_preferences,
            VisibilityPreferences {
                show_hidden: false,
                show_locked: true,
                show_flagged: true,
                show_split: true,
            }
        );
        assert_eq!(
            state.sort,
            SortState {
                column: SortColumn::Date,
                direction: SortDirection::Desc
            }
        );
        assert!(state.filters.is_empty());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn rejects_min_above_max() {
        let filters = TransactionFilters {
            min_amount: Some(50.0),
            max_amount: Some(10.0),
            ..Default::default()
        };

        assert_eq!(
            filters.validate(),
            Err(ValidationError::AmountRange {
                min: 50.0,
                max: 10.0
            })
        );
    }

    #[test]
    fn accepts_equal_bounds() {
        let filters = TransactionFilters {
            min_amount: Some(10.0),
            max_amount: Some(10.0),
            ..Default::default()
        };

        assert!(filters.validate().is_ok());
    }

    #[test]
    fn month_is_normalized_to_two_digits() {
        assert_eq!(normalize_month("3").unwrap(), "03");
        assert_eq!(normalize_month("12").unwrap(), "12");
        assert_eq!(normalize_month(" 07 ").unwrap(), "07");
    }

    #[test]
    fn month_outside_range_is_rejected() {
        for input in ["0", "13", "march", ""] {
            assert_eq!(
                normalize_month(input),
                Err(ValidationError::InvalidMonth(input.to_owned())),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn sort_toggles_direction_on_same_column() {
        let ascending = SortState {
            column: SortColumn::Amount,
            direction: SortDirection::Asc,
        };

        assert_eq!(
            ascending.toggled(SortColumn::Amount).direction,
            SortDirection::Desc
        );
        assert_eq!(
            ascending.toggled(SortColumn::Label),
            SortState {
                column: SortColumn::Label,
                direction: SortDirection::Asc
            }
        );
        // The default is date descending, so clicking date sorts ascending.
        assert_eq!(
            SortState::default().toggled(SortColumn::Date).direction,
            SortDirection::Asc
        );
    }

    #[test]
    fn visibility_filter_checks_each_flag_independently() {
        let preferences = VisibilityPreferences {
            show_locked: false,
            ..Default::default()
        };
        let locked_and_flagged = Transaction::build(1, 1.0, date!(2024 - 01 - 01), "a")
            .status(StatusField::Lock, true)
            .status(StatusField::Flag, true)
            .finalize();
        let flagged = Transaction::build(2, 1.0, date!(2024 - 01 - 01), "b")
            .status(StatusField::Flag, true)
            .finalize();

        assert!(!preferences.shows(&locked_and_flagged));
        assert!(preferences.shows(&flagged));
    }

    #[test]
    fn toggle_flips_one_preference() {
        let mut preferences = VisibilityPreferences::default();

        preferences.toggle(VisibilityPreference::Hidden);

        assert!(preferences.show_hidden);
        assert!(preferences.show_locked);
    }

    #[test]
    fn fetch_key_ignores_bulk_selection() {
        let state = TransactionQueryState::default();
        let mut selected = state.clone();
        selected.bulk_selection.selected_ids.insert(4);

        assert_eq!(state.fetch_key(), selected.fetch_key());
    }
}
