//! Multi-select of transactions for a bulk update.
//!
//! The selection itself lives in [TransactionQueryState::bulk_selection] so it
//! survives a reload. [BulkSelectionController] is the only thing that
//! changes it, and it keeps every selected ID eligible for the current
//! bulk target.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;

use crate::{
    Error,
    api::{BulkUpdateRequest, BulkUpdateResponse, BulkUpdateStatus, TransactionsApi},
    database_id::TagId,
    query_state::{BulkOperationKind, BulkSelection, ValidationError},
    query_store::QueryStateHandle,
    transaction::{StatusField, Transaction},
};

/// A bulk update and the data it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Give every selected transaction the same custom label.
    Label {
        /// The new label.
        label: String,
    },
    /// Mark the selected personal transactions as business.
    Business,
    /// Mark the selected business transactions as personal.
    Personal,
    /// Assign a tag.
    Tag {
        /// The tag to assign.
        tag_id: TagId,
    },
    /// Set a free-text category.
    Category {
        /// The category name.
        category: String,
    },
    /// Set one status flag to `value`.
    Status {
        /// The flag to set.
        field: StatusField,
        /// The new value of the flag.
        value: bool,
    },
}

impl BulkOperation {
    /// The kind of operation, which must match the bulk target the rows
    /// were selected for.
    pub fn kind(&self) -> BulkOperationKind {
        match self {
            BulkOperation::Label { .. } => BulkOperationKind::Label,
            BulkOperation::Business => BulkOperationKind::Business,
            BulkOperation::Personal => BulkOperationKind::Personal,
            BulkOperation::Tag { .. } => BulkOperationKind::Tag,
            BulkOperation::Category { .. } => BulkOperationKind::Category,
            BulkOperation::Status { .. } => BulkOperationKind::Status,
        }
    }

    /// The `data` object of the bulk update request.
    pub fn data(&self) -> serde_json::Value {
        match self {
            BulkOperation::Label { label } => json!({ "label": label }),
            BulkOperation::Business => json!({ "business": true }),
            BulkOperation::Personal => json!({ "business": false }),
            BulkOperation::Tag { tag_id } => json!({ "tagId": tag_id }),
            BulkOperation::Category { category } => json!({ "category": category }),
            BulkOperation::Status { field, value } => {
                let mut data = serde_json::Map::new();
                data.insert(field.as_str().to_owned(), json!(value));
                serde_json::Value::Object(data)
            }
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            BulkOperation::Label { label } | BulkOperation::Category { category: label }
                if label.trim().is_empty() =>
            {
                Err(ValidationError::EmptyLabel)
            }
            _ => Ok(()),
        }
    }
}

/// Whether `row` may be selected for `target`.
///
/// Locked rows are never eligible. Switching to business only applies to
/// personal rows and vice versa. Every other target, including no target,
/// accepts any unlocked row.
pub fn is_eligible(row: &Transaction, target: Option<BulkOperationKind>) -> bool {
    if row.lock {
        return false;
    }

    match target {
        Some(BulkOperationKind::Business) => !row.business,
        Some(BulkOperationKind::Personal) => row.business,
        Some(BulkOperationKind::Label)
        | Some(BulkOperationKind::Tag)
        | Some(BulkOperationKind::Category)
        | Some(BulkOperationKind::Status)
        | None => true,
    }
}

/// Changes the bulk selection of a [QueryStateHandle] and submits bulk
/// updates.
#[derive(Debug, Default)]
pub struct BulkSelectionController {
    updating: AtomicBool,
}

/// Clears the updating flag when the bulk request finishes, however it ends.
struct UpdatingGuard<'a>(&'a AtomicBool);

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BulkSelectionController {
    /// Create a controller with no update in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a bulk update is in flight.
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    /// Select `row` if it is not selected, otherwise deselect it.
    ///
    /// Ineligible rows are never added, but a selected row can always be
    /// deselected.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn toggle_row(&self, handle: &QueryStateHandle, row: &Transaction) -> Result<(), Error> {
        let selection = handle.current().bulk_selection;
        let target = selection.target_type;
        if !selection.selected_ids.contains(&row.id) && !is_eligible(row, target) {
            tracing::debug!("transaction {} is not eligible for {target:?}", row.id);
            return Ok(());
        }

        handle.update(|state| {
            let selected_ids = &mut state.bulk_selection.selected_ids;
            if !selected_ids.remove(&row.id) {
                selected_ids.insert(row.id);
            }
        })
    }

    /// Replace the selection with every row in `rows` that is eligible for
    /// the current target.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn select_all_eligible(
        &self,
        handle: &QueryStateHandle,
        rows: &[Transaction],
    ) -> Result<(), Error> {
        handle.update(|state| {
            let target = state.bulk_selection.target_type;
            state.bulk_selection.selected_ids = rows
                .iter()
                .filter(|row| is_eligible(row, target))
                .map(|row| row.id)
                .collect();
        })
    }

    /// Leave bulk mode: no target, no label and nothing selected.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn clear(&self, handle: &QueryStateHandle) -> Result<(), Error> {
        handle.update(|state| state.bulk_selection = BulkSelection::default())
    }

    /// Select rows for `target` instead of the current target.
    ///
    /// Picking the current target again leaves bulk mode. Otherwise selected
    /// IDs that are not in `rows`, or are not eligible for `target`, are
    /// dropped straight away.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn change_target(
        &self,
        handle: &QueryStateHandle,
        target: BulkOperationKind,
        rows: &[Transaction],
    ) -> Result<(), Error> {
        if handle.current().bulk_selection.is_active(target) {
            return self.clear(handle);
        }

        handle.update(|state| {
            let selection = &mut state.bulk_selection;
            selection.target_type = Some(target);
            if target != BulkOperationKind::Label {
                selection.label = None;
            }
            selection.selected_ids.retain(|id| {
                rows.iter()
                    .any(|row| row.id == *id && is_eligible(row, Some(target)))
            });
        })
    }

    /// Deselect rows in `rows` that are no longer eligible for the current
    /// target, e.g. rows that were locked since they were selected.
    ///
    /// Selected IDs that are not in `rows` are left alone.
    ///
    /// # Errors
    /// Returns an error if the state cannot be updated.
    pub fn drop_ineligible(
        &self,
        handle: &QueryStateHandle,
        rows: &[Transaction],
    ) -> Result<(), Error> {
        handle.update(|state| {
            let selection = &mut state.bulk_selection;
            let Some(target) = selection.target_type else {
                return;
            };
            selection.selected_ids.retain(|id| {
                rows.iter()
                    .find(|row| row.id == *id)
                    .is_none_or(|row| is_eligible(row, Some(target)))
            });
        })
    }

    /// Set the new label while in label-edit mode.
    ///
    /// # Errors
    /// Returns [Error::NoBulkTarget] or [Error::BulkTargetMismatch] if the
    /// selection is not in label-edit mode.
    pub fn set_label(&self, handle: &QueryStateHandle, label: &str) -> Result<(), Error> {
        match handle.current().bulk_selection.target_type {
            Some(BulkOperationKind::Label) => {}
            Some(selected) => {
                return Err(Error::BulkTargetMismatch {
                    selected,
                    requested: BulkOperationKind::Label,
                });
            }
            None => return Err(Error::NoBulkTarget),
        }

        handle.update(|state| state.bulk_selection.label = Some(label.to_owned()))
    }

    /// Apply `operation` to every selected transaction in one request.
    ///
    /// On success the selection is cleared. On failure the selection is kept
    /// so the user can retry.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::UpdateInProgress] if another bulk update is in flight,
    /// - [Error::NoBulkTarget] if no bulk target was chosen,
    /// - [Error::BulkTargetMismatch] if `operation` is not the chosen target,
    /// - [Error::EmptySelection] if nothing is selected,
    /// - [Error::Validation] if `operation` carries an empty label,
    /// - [Error::BulkUpdateFailed] if the backend reports an error status,
    /// - or the API error if the request fails.
    pub async fn apply_bulk(
        &self,
        handle: &QueryStateHandle,
        api: &dyn TransactionsApi,
        operation: &BulkOperation,
    ) -> Result<BulkUpdateResponse, Error> {
        if self
            .updating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::UpdateInProgress);
        }
        let _guard = UpdatingGuard(&self.updating);

        let selection = handle.current().bulk_selection;
        let selected = selection.target_type.ok_or(Error::NoBulkTarget)?;
        if selected != operation.kind() {
            return Err(Error::BulkTargetMismatch {
                selected,
                requested: operation.kind(),
            });
        }
        if selection.selected_ids.is_empty() {
            return Err(Error::EmptySelection);
        }
        operation.validate()?;

        let request = BulkUpdateRequest::new(selection.selected_ids.iter().copied(), operation);
        tracing::info!(
            "applying {} to {} transactions",
            request.operation,
            request.transaction_ids.len()
        );

        let response = api
            .bulk_update(&request)
            .await
            .inspect_err(|error| tracing::error!("bulk update failed: {error}"))?;

        match response.status {
            BulkUpdateStatus::Success => {
                self.clear(handle)?;
                Ok(response)
            }
            BulkUpdateStatus::Error => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Bulk update failed".to_owned());
                tracing::error!("backend rejected bulk update: {message}");
                Err(Error::BulkUpdateFailed(message))
            }
        }
    }
}
