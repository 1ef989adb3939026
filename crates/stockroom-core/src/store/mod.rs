//! Client-side collection store.
//!
//! Owns the records shown to the user and mirrors every remote mutation into
//! them once the backend confirms it. State lives behind a lock that is never
//! held across an `.await`, so a store can be shared between concurrent
//! operations (a search racing a delete, for example).

mod edit;
mod status;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

pub use edit::EditSession;
pub use status::{
    MessageKind, StatusChannel, StatusSnapshot, TransientMessage, TRANSIENT_MESSAGE_TTL,
};

use crate::audio::{AudioError, AudioPlayback, AudioPlayer, AudioSigner};
use crate::client::{ProductsApi, RemoteError};
use crate::models::{Record, RecordDraft, RecordFields, RecordId, ValidationError};
use crate::search::{SearchCoordinator, SearchState, SearchTicket};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Another operation is in progress")]
    Busy,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Product not found: {0}")]
    NotFound(RecordId),

    #[error("Product {0} is not being edited")]
    NotEditing(RecordId),

    #[error("No edit in progress")]
    NoActiveEdit,
}

/// What happened to a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    /// The response replaced the collection.
    Applied,
    /// A newer list request was issued first; the response was dropped.
    Superseded,
    /// `initialize` already ran.
    Skipped,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<Record>,
    edit: EditSession,
    status: StatusChannel,
    search: SearchCoordinator,
    playing: BTreeSet<RecordId>,
    initialized: bool,
}

impl StoreState {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }
}

/// The synchronized collection.
pub struct CollectionStore<A> {
    api: A,
    state: Arc<Mutex<StoreState>>,
}

impl<A: ProductsApi> CollectionStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    pub const fn api(&self) -> &A {
        &self.api
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        lock_state(&self.state)
    }

    /// Load the full collection. Only the first call does anything.
    pub async fn initialize(&self) -> Result<ListOutcome, StoreError> {
        let ticket = {
            let mut state = self.lock();
            if state.initialized {
                None
            } else {
                state.initialized = true;
                Some(state.search.reissue())
            }
        };
        let Some(ticket) = ticket else {
            tracing::debug!("Store already initialized; skipping initial load");
            return Ok(ListOutcome::Skipped);
        };
        tracing::debug!("Loading products");
        self.run_list(ticket).await
    }

    /// Set the search term and fetch the matching records.
    pub async fn search(&self, term: impl Into<String>) -> Result<ListOutcome, StoreError> {
        let ticket = self.set_search_term(term);
        self.run_list(ticket).await
    }

    /// Set the search term without fetching. Pair with [`Self::run_search`].
    pub fn set_search_term(&self, term: impl Into<String>) -> SearchTicket {
        self.lock().search.set_term(term)
    }

    /// Fetch for a previously issued ticket.
    pub async fn run_search(&self, ticket: SearchTicket) -> Result<ListOutcome, StoreError> {
        self.run_list(ticket).await
    }

    /// Re-fetch with the current term, superseding anything in flight.
    pub async fn refresh(&self) -> Result<ListOutcome, StoreError> {
        let ticket = self.lock().search.reissue();
        self.run_list(ticket).await
    }

    async fn run_list(&self, ticket: SearchTicket) -> Result<ListOutcome, StoreError> {
        self.lock().status.begin_request();
        let in_flight = InFlight::new(&self.state, Work::List(ticket.clone()));
        let result = self.api.list(ticket.query()).await;

        let mut state = in_flight.finish();
        if !state.search.is_latest(&ticket) {
            tracing::debug!(
                seq = ticket.seq,
                term = %ticket.term,
                "Discarding superseded list response"
            );
            return Ok(ListOutcome::Superseded);
        }

        match result {
            Ok(records) => {
                let records = unique_by_id(records);
                tracing::debug!(count = records.len(), term = %ticket.term, "Applying list response");
                state.records = records;
                state.status.clear_error();
                Ok(ListOutcome::Applied)
            }
            Err(error) => {
                tracing::warn!("Failed to fetch products: {}", error);
                let generation = state.status.fail(format!("Failed to fetch products: {error}"));
                drop(state);
                self.schedule_expiry(generation);
                Err(error.into())
            }
        }
    }

    /// Validate a draft and create it remotely. The new record is appended
    /// only after the backend confirms.
    pub async fn add_record(&self, draft: &RecordDraft) -> Result<Record, StoreError> {
        let fields = self.validate(draft)?;
        let in_flight = self.begin_mutation()?;

        let result = self.api.create(&fields).await;

        let (outcome, generation) = {
            let mut state = in_flight.finish();
            match result {
                Ok(record) => {
                    if let Some(index) = state.position(&record.id) {
                        tracing::warn!(id = %record.id, "Created product id already listed; replacing");
                        state.records[index] = record.clone();
                    } else {
                        state.records.push(record.clone());
                    }
                    tracing::info!(id = %record.id, "Product added");
                    let generation = state.status.succeed("Product added successfully!");
                    (Ok(record), generation)
                }
                Err(error) => {
                    tracing::warn!("Failed to add product: {}", error);
                    let generation = state.status.fail(format!("Failed to add product: {error}"));
                    (Err(error.into()), generation)
                }
            }
        };
        self.schedule_expiry(generation);
        outcome
    }

    /// Start editing a listed record, replacing any edit in progress.
    pub fn begin_edit(&self, id: &RecordId) -> Result<RecordDraft, StoreError> {
        let mut state = self.lock();
        let Some(index) = state.position(id) else {
            drop(state);
            return Err(self.reject(StoreError::NotFound(id.clone())));
        };
        let record = state.records[index].clone();
        Ok(state.edit.begin(&record))
    }

    /// Replace the draft of the edit in progress.
    pub fn update_draft(&self, draft: RecordDraft) -> Result<(), StoreError> {
        if self.lock().edit.set_draft(draft) {
            return Ok(());
        }
        Err(self.reject(StoreError::NoActiveEdit))
    }

    /// Drop the edit in progress. No network traffic.
    pub fn cancel_edit(&self) {
        self.lock().edit.clear();
    }

    /// Validate the draft for `id` and send it. On success the listed record
    /// takes the new values and the edit session closes.
    pub async fn commit_edit(&self, id: &RecordId) -> Result<(), StoreError> {
        let draft = {
            let state = self.lock();
            if state.edit.is_editing(id) {
                Some(state.edit.draft().clone())
            } else {
                None
            }
        };
        let Some(draft) = draft else {
            return Err(self.reject(StoreError::NotEditing(id.clone())));
        };

        let fields = self.validate(&draft)?;
        let in_flight = self.begin_mutation()?;

        let result = self.api.update(id, &fields).await;

        let (outcome, generation) = {
            let mut state = in_flight.finish();
            match result {
                Ok(()) => {
                    apply_update(&mut state, id, &fields);
                    if state.edit.is_editing(id) {
                        state.edit.clear();
                    }
                    tracing::info!(id = %id, "Product updated");
                    (Ok(()), state.status.succeed("Product updated successfully!"))
                }
                Err(error) => {
                    tracing::warn!(id = %id, "Failed to update product: {}", error);
                    let generation =
                        state.status.fail(format!("Failed to update product: {error}"));
                    (Err(error.into()), generation)
                }
            }
        };
        self.schedule_expiry(generation);
        outcome
    }

    /// Delete remotely, then drop the record locally. An edit session that
    /// targets the record is left as is.
    pub async fn remove_record(&self, id: &RecordId) -> Result<(), StoreError> {
        let in_flight = self.begin_mutation()?;

        let result = self.api.remove(id).await;

        let (outcome, generation) = {
            let mut state = in_flight.finish();
            match result {
                Ok(()) => {
                    state.records.retain(|record| &record.id != id);
                    tracing::info!(id = %id, "Product deleted");
                    (Ok(()), state.status.succeed("Product deleted successfully!"))
                }
                Err(error) => {
                    tracing::warn!(id = %id, "Failed to delete product: {}", error);
                    let generation =
                        state.status.fail(format!("Failed to delete product: {error}"));
                    (Err(error.into()), generation)
                }
            }
        };
        self.schedule_expiry(generation);
        outcome
    }

    /// Sign and play the preview for `id`. A repeat request while the same
    /// record is still playing is ignored. Failures only post a transient
    /// message.
    pub async fn play_audio_for<G, P>(
        &self,
        id: &RecordId,
        playback: &AudioPlayback<G, P>,
    ) -> Result<(), AudioError>
    where
        G: AudioSigner,
        P: AudioPlayer,
    {
        if !self.lock().playing.insert(id.clone()) {
            tracing::debug!(id = %id, "Audio already playing; ignoring request");
            return Ok(());
        }
        let in_flight = InFlight::new(&self.state, Work::Playback(id.clone()));

        let result = playback.play(id).await;

        let generation = {
            let mut state = in_flight.finish();
            match &result {
                Ok(_) => None,
                Err(error) => {
                    tracing::warn!(id = %id, "Audio playback failed: {}", error);
                    Some(state.status.warn(format!("Could not play audio: {error}")))
                }
            }
        };
        if let Some(generation) = generation {
            self.schedule_expiry(generation);
        }
        result.map(|_| ())
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    pub fn record(&self, id: &RecordId) -> Option<Record> {
        let state = self.lock();
        state.position(id).map(|index| state.records[index].clone())
    }

    pub fn edit_session(&self) -> EditSession {
        self.lock().edit.clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.lock().status.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().status.is_busy()
    }

    pub fn search_term(&self) -> String {
        self.lock().search.term().to_string()
    }

    pub fn search_state(&self) -> SearchState {
        self.lock().search.state()
    }

    pub fn is_search_pending(&self) -> bool {
        self.lock().search.is_pending()
    }

    pub fn is_playing(&self, id: &RecordId) -> bool {
        self.lock().playing.contains(id)
    }

    fn validate(&self, draft: &RecordDraft) -> Result<RecordFields, StoreError> {
        draft.validate().map_err(|error| {
            tracing::debug!("Rejected draft: {}", error);
            self.reject(StoreError::Validation(error))
        })
    }

    /// Refuse while another request is outstanding, else mark one started.
    fn begin_mutation(&self) -> Result<InFlight<'_>, StoreError> {
        let busy = {
            let mut state = self.lock();
            let busy = state.status.is_busy();
            if !busy {
                state.status.begin_request();
            }
            busy
        };
        if busy {
            tracing::debug!("Mutation refused while busy");
            return Err(self.reject(StoreError::Busy));
        }
        Ok(InFlight::new(&self.state, Work::Mutation))
    }

    /// Post `error` as a transient message and hand it back.
    fn reject(&self, error: StoreError) -> StoreError {
        let generation = self.lock().status.warn(error.to_string());
        self.schedule_expiry(generation);
        error
    }

    fn schedule_expiry(&self, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; transient message stays until replaced");
            return;
        };
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            tokio::time::sleep(TRANSIENT_MESSAGE_TTL).await;
            lock_state(&state).status.expire(generation);
        });
    }
}

fn lock_state(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Work {
    List(SearchTicket),
    Mutation,
    Playback(RecordId),
}

/// Bookkeeping for a request the store has started. Dropping it releases the
/// busy count, search pending flag or playing flag, so an abandoned future
/// leaves the store usable.
struct InFlight<'a> {
    state: &'a Mutex<StoreState>,
    work: Work,
}

impl<'a> InFlight<'a> {
    const fn new(state: &'a Mutex<StoreState>, work: Work) -> Self {
        Self { state, work }
    }

    /// Release the request and lock the state to apply its result.
    fn finish(self) -> MutexGuard<'a, StoreState> {
        let state = self.state;
        drop(self);
        lock_state(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = lock_state(self.state);
        match &self.work {
            Work::List(ticket) => {
                state.status.end_request();
                state.search.settle(ticket);
            }
            Work::Mutation => state.status.end_request(),
            Work::Playback(id) => {
                state.playing.remove(id);
            }
        }
    }
}

fn apply_update(state: &mut StoreState, id: &RecordId, fields: &RecordFields) {
    match state.position(id) {
        Some(index) => state.records[index].apply(fields),
        None => tracing::debug!(id = %id, "Updated product is not in the current view"),
    }
}

/// Keep the first occurrence of each id.
fn unique_by_id(records: Vec<Record>) -> Vec<Record> {
    let mut seen = BTreeSet::new();
    let total = records.len();
    let unique: Vec<Record> = records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect();
    if unique.len() != total {
        tracing::warn!(
            dropped = total - unique.len(),
            "List response contained duplicate ids"
        );
    }
    unique
}
