//! Mirrors the query state to and from a shareable query string.
//!
//! The query string carries the transaction type, the filters and the sort
//! order. Visibility preferences and the bulk selection are local to the
//! user and only live in durable storage.

use serde::{Deserialize, Serialize};

use crate::query_state::{
    SortDirection, SortState, TransactionFilters, TransactionQueryState, normalize_month,
};

/// URL encoding helper for the transaction list query params.
///
/// Values are kept as raw strings so a single bad parameter can be dropped
/// without losing the rest of the URL.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    transaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_direction: Option<String>,
}

/// Encode the shareable part of `state` as a query string, without the
/// leading `?`.
pub fn to_query_string(state: &TransactionQueryState) -> String {
    let params = QueryParams {
        transaction_type: state
            .transaction_type
            .map(|transaction_type| transaction_type.as_query_value().to_owned()),
        search: state.filters.search.clone(),
        min_amount: state.filters.min_amount.map(|amount| amount.to_string()),
        max_amount: state.filters.max_amount.map(|amount| amount.to_string()),
        month: state.filters.month.clone(),
        sort_column: Some(state.sort.column.as_query_value().to_owned()),
        sort_direction: Some(state.sort.direction.as_query_value().to_owned()),
    };

    serde_urlencoded::to_string(&params)
        .inspect_err(|error| tracing::error!("could not encode query string: {error}"))
        .unwrap_or_default()
}

/// Merge a query string read at session start into `base`.
///
/// An empty query string leaves `base` as it is. Otherwise the query string
/// is authoritative for the transaction type and the filters: keys it does
/// not carry are cleared. The sort order is only replaced when the query
/// string names it. Invalid values are dropped one by one and logged.
pub fn merge_query_string(base: &TransactionQueryState, query: &str) -> TransactionQueryState {
    let query = query.trim().trim_start_matches('?');
    if query.is_empty() {
        return base.clone();
    }

    let params: QueryParams = match serde_urlencoded::from_str(query) {
        Ok(params) => params,
        Err(error) => {
            tracing::warn!("ignoring malformed query string \"{query}\": {error}");
            return base.clone();
        }
    };

    let mut state = base.clone();
    state.transaction_type = params
        .transaction_type
        .as_deref()
        .and_then(|value| parse_or_warn("type", value));
    state.filters = filters_from_params(&params);
    state.sort = sort_from_params(&params, base.sort);

    state
}

fn filters_from_params(params: &QueryParams) -> TransactionFilters {
    let mut filters = TransactionFilters {
        search: params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_owned),
        min_amount: params
            .min_amount
            .as_deref()
            .and_then(|value| parse_amount("minAmount", value)),
        max_amount: params
            .max_amount
            .as_deref()
            .and_then(|value| parse_amount("maxAmount", value)),
        month: params.month.as_deref().and_then(|value| {
            normalize_month(value)
                .inspect_err(|error| tracing::warn!("dropping query param month: {error}"))
                .ok()
        }),
    };

    if let Err(error) = filters.validate() {
        tracing::warn!("dropping amount range from query string: {error}");
        filters.min_amount = None;
        filters.max_amount = None;
    }

    filters
}

fn sort_from_params(params: &QueryParams, fallback: SortState) -> SortState {
    let column = params
        .sort_column
        .as_deref()
        .and_then(|value| parse_or_warn("sortColumn", value))
        .unwrap_or(fallback.column);
    let direction = match params.sort_direction.as_deref() {
        Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        Some(other) => {
            tracing::warn!("dropping query param sortDirection: unknown direction \"{other}\"");
            fallback.direction
        }
        None => fallback.direction,
    };

    SortState { column, direction }
}

fn parse_amount(name: &str, value: &str) -> Option<f64> {
    match value.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => Some(amount),
        _ => {
            tracing::warn!("dropping query param {name}: \"{value}\" is not a number");
            None
        }
    }
}

fn parse_or_warn<T>(name: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr<Err = crate::Error>,
{
    value
        .parse()
        .inspect_err(|error| tracing::warn!("dropping query param {name}: {error}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use crate::{
        query_state::{SortColumn, SortDirection, TransactionQueryState},
        transaction::TransactionType,
    };

    use super::{merge_query_string, to_query_string};

    #[test]
    fn default_state_only_carries_sort() {
        let query = to_query_string(&TransactionQueryState::default());

        assert_eq!(query, "sortColumn=date&sortDirection=desc");
    }

    #[test]
    fn encodes_type_and_filters() {
        let mut state = TransactionQueryState::default();
        state.transaction_type = Some(TransactionType::Business);
        state.filters.search = Some("uber eats".to_owned());
        state.filters.min_amount = Some(0.0);
        state.filters.max_amount = Some(12.5);
        state.filters.month = Some("04".to_owned());

        let query = to_query_string(&state);

        assert_eq!(
            query,
            "type=BUSINESS&search=uber+eats&minAmount=0&maxAmount=12.5&month=04\
            &sortColumn=date&sortDirection=desc"
        );
    }

    #[test]
    fn query_string_round_trips_shareable_fields() {
        let mut state = TransactionQueryState::default();
        state.transaction_type = Some(TransactionType::Personal);
        state.filters.search = Some("rent & rates".to_owned());
        state.filters.min_amount = Some(100.0);
        state.filters.month = Some("12".to_owned());
        state.sort.column = SortColumn::Label;
        state.sort.direction = SortDirection::Asc;

        let merged = merge_query_string(&TransactionQueryState::default(), &to_query_string(&state));

        assert_eq!(merged, state);
    }

    #[test]
    fn empty_query_keeps_stored_state() {
        let mut stored = TransactionQueryState::default();
        stored.filters.search = Some("coffee".to_owned());

        assert_eq!(merge_query_string(&stored, ""), stored);
        assert_eq!(merge_query_string(&stored, "?"), stored);
    }

    #[test]
    fn query_replaces_stored_filters_but_keeps_local_preferences() {
        let mut stored = TransactionQueryState::default();
        stored.filters.search = Some("coffee".to_owned());
        stored.transaction_type = Some(TransactionType::Business);
        stored.visibility_preferences.show_hidden = true;
        stored.bulk_selection.selected_ids.insert(8);

        let merged = merge_query_string(&stored, "?month=3");

        assert_eq!(merged.filters.search, None);
        assert_eq!(merged.transaction_type, None);
        assert_eq!(merged.filters.month.as_deref(), Some("03"));
        assert!(merged.visibility_preferences.show_hidden);
        assert!(merged.bulk_selection.selected_ids.contains(&8));
    }

    #[test]
    fn invalid_params_are_dropped_individually() {
        let merged = merge_query_string(
            &TransactionQueryState::default(),
            "type=HOUSEHOLD&search=fuel&month=13&minAmount=abc&maxAmount=20&sortColumn=merchant",
        );

        assert_eq!(merged.transaction_type, None);
        assert_eq!(merged.filters.search.as_deref(), Some("fuel"));
        assert_eq!(merged.filters.month, None);
        assert_eq!(merged.filters.min_amount, None);
        assert_eq!(merged.filters.max_amount, Some(20.0));
        assert_eq!(merged.sort.column, SortColumn::Date);
    }

    #[test]
    fn inverted_amount_range_is_dropped() {
        let merged = merge_query_string(
            &TransactionQueryState::default(),
            "minAmount=50&maxAmount=10",
        );

        assert_eq!(merged.filters.min_amount, None);
        assert_eq!(merged.filters.max_amount, None);
        assert!(merged.validate().is_ok());
    }
}
