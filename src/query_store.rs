//! Persistence and change notification for the query state.
//!
//! [QueryStateStore] is the durable side: it reads and writes the validated
//! state blob. [QueryStateHandle] owns the in-memory canonical copy, funnels
//! every mutation through validation, persists accepted changes and
//! broadcasts them to subscribers.

use tokio::sync::watch;

use crate::{Error, query_state::TransactionQueryState, storage::KeyValueStorage};

/// The storage key the query state lives under.
pub const FILTER_STORAGE_KEY: &str = "transaction_filters";

/// Reads and writes the query state in durable storage.
///
/// None of these methods fail: storage problems are logged and the caller
/// falls back to defaults, so a broken store never breaks the list view.
pub struct QueryStateStore {
    storage: Box<dyn KeyValueStorage>,
}

impl QueryStateStore {
    /// Create a store backed by `storage`.
    pub fn new(storage: impl KeyValueStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    /// Get the persisted state, or the default state if nothing valid is
    /// stored.
    ///
    /// A stored blob is only returned if it parses and passes every
    /// validation rule; otherwise it is discarded whole.
    pub fn get_state(&self) -> TransactionQueryState {
        let stored = match self.storage.get(FILTER_STORAGE_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => return TransactionQueryState::default(),
            Err(error) => {
                tracing::warn!("could not read stored query state: {error}");
                return TransactionQueryState::default();
            }
        };

        parse_state(&stored)
            .inspect_err(|error| tracing::warn!("discarding stored query state: {error}"))
            .unwrap_or_default()
    }

    /// Persist `state` if it is valid.
    ///
    /// Invalid states are not written and storage failures are not
    /// returned, both are only logged.
    pub fn save_state(&self, state: &TransactionQueryState) {
        if let Err(error) = state.validate() {
            tracing::warn!("refusing to save invalid query state: {error}");
            return;
        }

        let serialized = match serde_json::to_string(state) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::error!("could not serialize query state: {error}");
                return;
            }
        };

        if let Err(error) = self.storage.set(FILTER_STORAGE_KEY, &serialized) {
            tracing::error!("failed to save filter state: {error}");
        }
    }

    /// Remove the persisted state.
    pub fn clear_state(&self) {
        if let Err(error) = self.storage.remove(FILTER_STORAGE_KEY) {
            tracing::error!("failed to clear filter state: {error}");
        }
    }
}

/// Parse and validate a stored state blob.
///
/// # Errors
/// Returns [Error::CorruptState] if `text` is not a structurally valid state
/// (missing fields, wrong types, unknown enum values), or
/// [Error::Validation] if it breaks a cross-field rule such as `min <= max`.
pub fn parse_state(text: &str) -> Result<TransactionQueryState, Error> {
    let state: TransactionQueryState =
        serde_json::from_str(text).map_err(|error| Error::CorruptState(error.to_string()))?;
    state.validate()?;

    Ok(state)
}

/// The in-memory query state shared by the list view components.
///
/// Components never assign fields directly, they call [QueryStateHandle::update]
/// which rejects invalid results before anything is stored or broadcast.
pub struct QueryStateHandle {
    store: QueryStateStore,
    sender: watch::Sender<TransactionQueryState>,
}

impl QueryStateHandle {
    /// Create a handle starting from `initial`.
    ///
    /// An invalid `initial` state is replaced by the default state.
    pub fn new(store: QueryStateStore, initial: TransactionQueryState) -> Self {
        let initial = match initial.validate() {
            Ok(()) => initial,
            Err(error) => {
                tracing::warn!("initial query state is invalid, using defaults: {error}");
                TransactionQueryState::default()
            }
        };
        let (sender, _) = watch::channel(initial);

        Self { store, sender }
    }

    /// Create a handle from whatever `store` has persisted.
    pub fn load(store: QueryStateStore) -> Self {
        let state = store.get_state();
        Self::new(store, state)
    }

    /// A copy of the current state.
    pub fn current(&self) -> TransactionQueryState {
        self.sender.borrow().clone()
    }

    /// Receive every accepted state change.
    pub fn subscribe(&self) -> watch::Receiver<TransactionQueryState> {
        self.sender.subscribe()
    }

    /// Apply `mutate` to a copy of the state and commit it if it is valid.
    ///
    /// A committed change is persisted and broadcast. A mutation that leaves
    /// the state as it was is accepted without persisting or notifying.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the mutated state breaks an invariant,
    /// in which case the current state is left unchanged.
    pub fn update(&self, mutate: impl FnOnce(&mut TransactionQueryState)) -> Result<(), Error> {
        let mut next = self.current();
        mutate(&mut next);
        next.validate()?;

        if next == *self.sender.borrow() {
            return Ok(());
        }

        self.store.save_state(&next);
        self.sender.send_replace(next);

        Ok(())
    }

    /// Forget the persisted state and go back to the defaults.
    pub fn reset_to_default(&self) {
        self.store.clear_state();
        self.sender.send_replace(TransactionQueryState::default());
    }
}
