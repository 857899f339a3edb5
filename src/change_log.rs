//! The per-transaction change log kept by the Transactions API.
//!
//! Every single-row edit made through the session is followed by a log entry
//! with the old and new value of the field that changed.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    database_id::TransactionId,
    transaction::{StatusField, Transaction},
};

/// Who or what made a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeMethod {
    /// An edit made by the user.
    Human,
    /// An automatic categorisation.
    Robot,
    /// A saved labelling rule.
    Rule,
    /// A bulk update.
    Bulk,
}

impl Display for ChangeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self {
            Self::Human => "human",
            Self::Robot => "robot",
            Self::Rule => "rule",
            Self::Bulk => "bulk",
        };
        f.write_str(method)
    }
}

/// Marks log entries that are not plain edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSpecial {
    /// The transaction was split.
    Split,
    /// An earlier value was restored.
    Revert,
}

/// One entry of `GET /translog/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLog {
    /// The backend's ID for the entry.
    pub id: i64,
    /// When the change was made, as sent by the backend.
    pub timestamp: String,
    /// The transaction that changed.
    pub transaction_id: TransactionId,
    /// The field that changed, e.g. "label" or "lock".
    pub field_name: String,
    /// The value before the change.
    #[serde(default)]
    pub old_value: Option<String>,
    /// The value after the change.
    #[serde(default)]
    pub new_value: Option<String>,
    /// Who or what made the change.
    pub method: ChangeMethod,
    /// Set for splits and reverts.
    #[serde(default)]
    pub special: Option<ChangeSpecial>,
    /// A note left with the change.
    #[serde(default)]
    pub comment: Option<String>,
    /// The categorisation algorithm behind a robot change.
    #[serde(default)]
    pub algo: Option<String>,
    /// The entry this one reverts, if any.
    #[serde(default)]
    pub prior_trans_log_id: Option<i64>,
}

/// The body of `POST /translog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
    /// The transaction that changed.
    pub transaction_id: TransactionId,
    /// The field that changed.
    pub field_name: String,
    /// The value before the change.
    pub old_value: String,
    /// The value after the change.
    pub new_value: String,
    /// Who or what made the change.
    pub method: ChangeMethod,
}

impl NewLogEntry {
    /// An edit of `field_name` made by the user.
    pub fn human(
        transaction_id: TransactionId,
        field_name: &str,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            field_name: field_name.to_owned(),
            old_value: old_value.into(),
            new_value: new_value.into(),
            method: ChangeMethod::Human,
        }
    }

    /// A new custom label for `row`.
    pub fn label(row: &Transaction, label: &str) -> Self {
        Self::human(row.id, "label", row.display_label(), label)
    }

    /// A flip of `field` on `row`, logged as "true"/"false".
    pub fn status(row: &Transaction, field: StatusField) -> Self {
        let old = row.status(field);
        Self::human(row.id, field.as_str(), old.to_string(), (!old).to_string())
    }

    /// A move of `row` to the business or the personal side.
    pub fn side(row: &Transaction, business: bool) -> Self {
        let side = |business: bool| if business { "business" } else { "personal" };
        Self::human(row.id, "business", side(row.business), side(business))
    }
}

/// The body of `GET /translog/count/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCount {
    /// The number of log entries for the transaction.
    #[serde(default)]
    pub count: u64,
}
