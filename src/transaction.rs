//! Transactions and tags as exchanged with the Transactions API.
//!
//! The view core never owns these records. It reads them page by page and
//! asks the backend to change them.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, ValidationError,
    database_id::{TagId, TransactionId},
};

/// Whether a transaction (or a tag) belongs to the business or the personal
/// side of the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Business expenses and income.
    #[serde(alias = "business")]
    Business,
    /// Everything else.
    #[serde(alias = "personal")]
    Personal,
}

impl TransactionType {
    /// The value used for this type in query strings and API requests.
    pub fn as_query_value(self) -> &'static str {
        match self {
            Self::Business => "BUSINESS",
            Self::Personal => "PERSONAL",
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUSINESS" | "B" => Ok(Self::Business),
            "PERSONAL" | "P" => Ok(Self::Personal),
            _ => Err(ValidationError::UnknownTransactionType(s.to_owned()).into()),
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_query_value())
    }
}

/// The status flags that can be toggled on a single transaction or set in
/// bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusField {
    /// Marked for review.
    Flag,
    /// Protected from further edits, including bulk edits.
    Lock,
    /// Hidden from the default list view.
    Hidden,
    /// Split between business and personal use.
    Split,
}

impl StatusField {
    /// The field name used by the Transactions API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Lock => "lock",
            Self::Hidden => "hidden",
            Self::Split => "split",
        }
    }
}

impl FromStr for StatusField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flag" | "flagged" => Ok(Self::Flag),
            "lock" | "locked" => Ok(Self::Lock),
            "hidden" | "hide" => Ok(Self::Hidden),
            "split" => Ok(Self::Split),
            _ => Err(ValidationError::UnknownStatusField(s.to_owned()).into()),
        }
    }
}

/// A user-defined deduction category, scoped to business or personal
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// The backend's ID for the tag.
    pub id: TagId,
    /// The name shown to the user, e.g. "Home office".
    pub name: String,
    /// Which kind of transaction the tag applies to.
    #[serde(rename = "type")]
    pub tag_type: TransactionType,
}

/// A single ledger entry imported from a bank export.
///
/// The boolean flags are orthogonal: any combination is valid, e.g. a hidden
/// transaction is not implicitly locked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The backend's ID for the transaction.
    pub id: TransactionId,
    /// When the transaction happened.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The description from the bank export.
    pub label: String,
    /// The amount of money spent or earned.
    pub amount: f64,
    /// A user-supplied label that overrides `label` for display.
    #[serde(default)]
    pub custom: Option<String>,
    /// The deduction tag assigned to the transaction, if any.
    #[serde(default)]
    pub tag: Option<Tag>,
    /// The ID of `tag`, kept separately by the backend.
    #[serde(default)]
    pub tag_id: Option<TagId>,
    /// `true` for business transactions, `false` for personal ones.
    #[serde(default)]
    pub business: bool,
    /// Money coming in rather than going out.
    #[serde(default)]
    pub income: bool,
    /// A transfer into the account, such as a refund.
    #[serde(default)]
    pub deposit: bool,
    /// Marked for review.
    #[serde(default)]
    pub flag: bool,
    /// Hidden from the default list.
    #[serde(default)]
    pub hidden: bool,
    /// Protected from edits and bulk updates.
    #[serde(default)]
    pub lock: bool,
    /// Split between business and personal use.
    #[serde(default)]
    pub split: bool,
    /// Free-text category set by a bulk category update.
    #[serde(default)]
    pub category: Option<String>,
}

impl Transaction {
    /// Start building a transaction with every flag cleared.
    ///
    /// Useful for stub backends and tests, the view core itself only
    /// deserializes transactions.
    pub fn build(id: TransactionId, amount: f64, date: Date, label: &str) -> TransactionBuilder {
        TransactionBuilder {
            transaction: Transaction {
                id,
                date,
                label: label.to_owned(),
                amount,
                custom: None,
                tag: None,
                tag_id: None,
                business: false,
                income: false,
                deposit: false,
                flag: false,
                hidden: false,
                lock: false,
                split: false,
                category: None,
            },
        }
    }

    /// The label to display: the custom label when set, otherwise the bank's.
    pub fn display_label(&self) -> &str {
        match self.custom.as_deref() {
            Some(custom) if !custom.trim().is_empty() => custom,
            _ => &self.label,
        }
    }

    /// Read one of the status flags.
    pub fn status(&self, field: StatusField) -> bool {
        match field {
            StatusField::Flag => self.flag,
            StatusField::Lock => self.lock,
            StatusField::Hidden => self.hidden,
            StatusField::Split => self.split,
        }
    }

    /// The business/personal side this transaction currently sits on.
    pub fn transaction_type(&self) -> TransactionType {
        if self.business {
            TransactionType::Business
        } else {
            TransactionType::Personal
        }
    }
}

/// Builder for [Transaction], see [Transaction::build].
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    /// Mark the transaction as business (`true`) or personal (`false`).
    pub fn business(mut self, business: bool) -> Self {
        self.transaction.business = business;
        self
    }

    /// Set one of the status flags.
    pub fn status(mut self, field: StatusField, value: bool) -> Self {
        match field {
            StatusField::Flag => self.transaction.flag = value,
            StatusField::Lock => self.transaction.lock = value,
            StatusField::Hidden => self.transaction.hidden = value,
            StatusField::Split => self.transaction.split = value,
        }
        self
    }

    /// Set the custom label override.
    pub fn custom(mut self, custom: &str) -> Self {
        self.transaction.custom = Some(custom.to_owned());
        self
    }

    /// Finish building.
    pub fn finalize(self) -> Transaction {
        self.transaction
    }
}

/// Dates travel as `YYYY-MM-DD`. The backend may send a full RFC 3339
/// timestamp, in which case only the calendar date is kept.
mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::{Date, macros::format_description};

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = date
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        let date_part = text.get(..10).unwrap_or(text.as_str());

        Date::parse(date_part, format_description!("[year]-[month]-[day]"))
            .map_err(|error| D::Error::custom(format!("invalid date \"{text}\": {error}")))
    }
}
