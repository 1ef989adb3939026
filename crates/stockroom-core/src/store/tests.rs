use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::audio::{AudioPlayback, AudioPlayer, AudioSigner};

fn record(id: &str, name: &str, quantity: u64, price: f64) -> Record {
    Record {
        id: id.parse().unwrap(),
        name: name.to_string(),
        quantity,
        price,
    }
}

fn id(raw: &str) -> RecordId {
    raw.parse().unwrap()
}

type Scripted<T> = VecDeque<(Duration, Result<T, RemoteError>)>;

#[derive(Default)]
struct FakeState {
    catalog: Vec<Record>,
    lists: Scripted<Vec<Record>>,
    creates: Scripted<Record>,
    updates: Scripted<()>,
    removes: Scripted<()>,
    list_calls: Vec<Option<String>>,
    create_calls: Vec<RecordFields>,
    update_calls: Vec<(RecordId, RecordFields)>,
    remove_calls: Vec<RecordId>,
}

/// Scripted backend. Unscripted calls succeed immediately: lists return the
/// catalog and creates echo the fields with the next numeric id.
#[derive(Clone, Default)]
struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    fn with_catalog(catalog: Vec<Record>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().catalog = catalog;
        api
    }

    fn script_list(&self, delay: Duration, result: Result<Vec<Record>, RemoteError>) {
        self.state.lock().unwrap().lists.push_back((delay, result));
    }

    fn script_create(&self, delay: Duration, result: Result<Record, RemoteError>) {
        self.state.lock().unwrap().creates.push_back((delay, result));
    }

    fn script_update(&self, delay: Duration, result: Result<(), RemoteError>) {
        self.state.lock().unwrap().updates.push_back((delay, result));
    }

    fn script_remove(&self, delay: Duration, result: Result<(), RemoteError>) {
        self.state.lock().unwrap().removes.push_back((delay, result));
    }

    fn list_calls(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().list_calls.clone()
    }

    fn network_mutations(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.create_calls.len() + state.update_calls.len() + state.remove_calls.len()
    }
}

async fn settle<T>(step: Option<(Duration, Result<T, RemoteError>)>, fallback: T) -> Result<T, RemoteError> {
    match step {
        Some((delay, result)) => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
        None => Ok(fallback),
    }
}

impl ProductsApi for FakeApi {
    async fn list(&self, search: Option<&str>) -> Result<Vec<Record>, RemoteError> {
        let (step, catalog) = {
            let mut state = self.state.lock().unwrap();
            state.list_calls.push(search.map(str::to_string));
            (state.lists.pop_front(), state.catalog.clone())
        };
        settle(step, catalog).await
    }

    async fn create(&self, fields: &RecordFields) -> Result<Record, RemoteError> {
        let (step, echo) = {
            let mut state = self.state.lock().unwrap();
            state.create_calls.push(fields.clone());
            let next = state.create_calls.len() + state.catalog.len();
            let echo = Record {
                id: next.to_string().parse().unwrap(),
                name: fields.name.clone(),
                quantity: fields.quantity,
                price: fields.price,
            };
            (state.creates.pop_front(), echo)
        };
        settle(step, echo).await
    }

    async fn update(&self, id: &RecordId, fields: &RecordFields) -> Result<(), RemoteError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.update_calls.push((id.clone(), fields.clone()));
            state.updates.pop_front()
        };
        settle(step, ()).await
    }

    async fn remove(&self, id: &RecordId) -> Result<(), RemoteError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.remove_calls.push(id.clone());
            state.removes.pop_front()
        };
        settle(step, ()).await
    }
}

fn pen() -> Record {
    record("1", "Pen", 10, 1.50)
}

async fn loaded_store(catalog: Vec<Record>) -> (CollectionStore<FakeApi>, FakeApi) {
    let api = FakeApi::with_catalog(catalog);
    let store = CollectionStore::new(api.clone());
    assert_eq!(store.initialize().await.unwrap(), ListOutcome::Applied);
    (store, api)
}

#[tokio::test]
async fn initialize_loads_full_list_once() {
    let (store, api) = loaded_store(vec![pen()]).await;

    assert_eq!(store.records(), vec![pen()]);
    assert_eq!(store.initialize().await.unwrap(), ListOutcome::Skipped);
    assert_eq!(api.list_calls(), vec![None]);
    assert!(!store.is_busy());
    assert_eq!(store.search_state(), SearchState::Idle);
}

#[tokio::test]
async fn initialize_failure_sets_error_message() {
    let api = FakeApi::default();
    api.script_list(
        Duration::ZERO,
        Err(RemoteError::new(Some(500), "Internal Server Error")),
    );
    let store = CollectionStore::new(api);

    let error = store.initialize().await.unwrap_err();

    assert!(matches!(error, StoreError::Remote(_)));
    assert!(store.records().is_empty());
    let status = store.status();
    assert_eq!(
        status.error_message.as_deref(),
        Some("Failed to fetch products: Internal Server Error (HTTP 500)")
    );
    assert_eq!(status.transient.unwrap().kind, MessageKind::Error);
}

#[tokio::test]
async fn list_response_is_deduplicated_by_id() {
    let (store, _) = loaded_store(vec![pen(), record("1", "Pen copy", 1, 1.0)]).await;
    assert_eq!(store.records(), vec![pen()]);
}

#[tokio::test]
async fn add_appends_server_record_after_existing_ones() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_create(Duration::ZERO, Ok(record("2", "Book", 5, 9.99)));

    let created = store
        .add_record(&RecordDraft::new("Book", "5", "9.99"))
        .await
        .unwrap();

    assert_eq!(created, record("2", "Book", 5, 9.99));
    assert_eq!(store.records(), vec![pen(), record("2", "Book", 5, 9.99)]);
    assert_eq!(api.list_calls().len(), 1, "add must not re-list");
    let status = store.status();
    assert_eq!(status.error_message, None);
    assert_eq!(
        status.transient,
        Some(TransientMessage {
            text: "Product added successfully!".to_string(),
            kind: MessageKind::Success,
        })
    );
}

#[tokio::test]
async fn invalid_drafts_never_reach_the_network() {
    let (store, api) = loaded_store(vec![pen()]).await;
    let drafts = [
        RecordDraft::new("  ", "1", "1"),
        RecordDraft::new("Book", "-1", "1"),
        RecordDraft::new("Book", "many", "1"),
        RecordDraft::new("Book", "1", "-0.5"),
        RecordDraft::new("Book", "1", "cheap"),
    ];

    for draft in &drafts {
        let error = store.add_record(draft).await.unwrap_err();
        assert!(matches!(error, StoreError::Validation(_)), "{draft:?}");
    }

    assert_eq!(api.network_mutations(), 0);
    assert_eq!(store.records(), vec![pen()]);
    let status = store.status();
    assert_eq!(status.error_message, None);
    assert_eq!(status.transient.unwrap().kind, MessageKind::Error);
}

#[tokio::test]
async fn add_failure_leaves_collection_unchanged() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_create(Duration::ZERO, Err(RemoteError::new(Some(400), "name taken")));

    store
        .add_record(&RecordDraft::new("Book", "5", "9.99"))
        .await
        .unwrap_err();

    assert_eq!(store.records(), vec![pen()]);
    assert_eq!(
        store.status().error_message.as_deref(),
        Some("Failed to add product: name taken (HTTP 400)")
    );
}

#[tokio::test]
async fn commit_edit_merges_draft_into_target_only() {
    let book = record("2", "Book", 5, 9.99);
    let (store, api) = loaded_store(vec![pen(), book.clone()]).await;

    let draft = store.begin_edit(&id("1")).unwrap();
    assert_eq!(draft, RecordDraft::new("Pen", "10", "1.5"));
    store
        .update_draft(RecordDraft::new("Blue Pen", "12", "1.75"))
        .unwrap();
    store.commit_edit(&id("1")).await.unwrap();

    assert_eq!(
        store.records(),
        vec![record("1", "Blue Pen", 12, 1.75), book]
    );
    assert!(!store.edit_session().is_active());
    let calls = api.state.lock().unwrap().update_calls.clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, id("1"));
    assert_eq!(
        store.status().transient.unwrap().text,
        "Product updated successfully!"
    );
}

#[tokio::test]
async fn commit_edit_with_negative_quantity_makes_no_call() {
    let (store, api) = loaded_store(vec![pen()]).await;
    store.begin_edit(&id("1")).unwrap();
    store
        .update_draft(RecordDraft::new("Pen", "-1", "1.5"))
        .unwrap();
    let session_before = store.edit_session();

    let error = store.commit_edit(&id("1")).await.unwrap_err();

    assert_eq!(
        error,
        StoreError::Validation(ValidationError::NegativeQuantity)
    );
    assert_eq!(api.network_mutations(), 0);
    assert_eq!(store.records(), vec![pen()]);
    assert_eq!(store.edit_session(), session_before);
    let status = store.status();
    assert_eq!(status.error_message, None);
    assert_eq!(
        status.transient.unwrap().text,
        ValidationError::NegativeQuantity.to_string()
    );
}

#[tokio::test]
async fn commit_edit_failure_keeps_session_for_retry() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_update(Duration::ZERO, Err(RemoteError::new(Some(500), "oops")));
    store.begin_edit(&id("1")).unwrap();
    store
        .update_draft(RecordDraft::new("Pencil", "3", "0.5"))
        .unwrap();

    store.commit_edit(&id("1")).await.unwrap_err();

    assert_eq!(store.records(), vec![pen()]);
    assert!(store.edit_session().is_editing(&id("1")));
    assert_eq!(store.edit_session().draft().name, "Pencil");

    store.commit_edit(&id("1")).await.unwrap();
    assert_eq!(store.records(), vec![record("1", "Pencil", 3, 0.5)]);
    assert_eq!(store.status().error_message, None);
}

#[tokio::test]
async fn commit_edit_requires_matching_session() {
    let (store, api) = loaded_store(vec![pen(), record("2", "Book", 5, 9.99)]).await;
    assert_eq!(
        store.commit_edit(&id("1")).await.unwrap_err(),
        StoreError::NotEditing(id("1"))
    );

    store.begin_edit(&id("2")).unwrap();
    assert_eq!(
        store.commit_edit(&id("1")).await.unwrap_err(),
        StoreError::NotEditing(id("1"))
    );
    assert_eq!(api.network_mutations(), 0);
}

#[tokio::test]
async fn begin_edit_replaces_previous_session_and_cancel_clears_it() {
    let (store, _) = loaded_store(vec![pen(), record("2", "Book", 5, 9.99)]).await;

    store.begin_edit(&id("1")).unwrap();
    store
        .update_draft(RecordDraft::new("Changed", "1", "1"))
        .unwrap();
    let draft = store.begin_edit(&id("2")).unwrap();
    assert_eq!(draft.name, "Book");
    assert!(store.edit_session().is_editing(&id("2")));

    store.cancel_edit();
    assert_eq!(store.edit_session(), EditSession::default());
    assert_eq!(
        store.update_draft(RecordDraft::default()).unwrap_err(),
        StoreError::NoActiveEdit
    );
}

#[tokio::test]
async fn begin_edit_unknown_id_is_not_found() {
    let (store, _) = loaded_store(vec![pen()]).await;
    assert_eq!(
        store.begin_edit(&id("9")).unwrap_err(),
        StoreError::NotFound(id("9"))
    );
    assert!(!store.edit_session().is_active());
}

#[tokio::test]
async fn remove_drops_exactly_one_record() {
    let book = record("2", "Book", 5, 9.99);
    let (store, _) = loaded_store(vec![pen(), book.clone()]).await;

    store.remove_record(&id("1")).await.unwrap();
    assert_eq!(store.records(), vec![book.clone()]);

    store.remove_record(&id("7")).await.unwrap();
    assert_eq!(store.records(), vec![book]);
    assert_eq!(
        store.status().transient.unwrap().text,
        "Product deleted successfully!"
    );
}

#[tokio::test]
async fn remove_forbidden_keeps_collection_and_sets_error() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_remove(Duration::ZERO, Err(RemoteError::new(Some(403), "forbidden")));

    let error = store.remove_record(&id("1")).await.unwrap_err();

    assert_eq!(
        error,
        StoreError::Remote(RemoteError::new(Some(403), "forbidden"))
    );
    assert_eq!(store.records(), vec![pen()]);
    let status = store.status();
    assert_eq!(
        status.error_message.as_deref(),
        Some("Failed to delete product: forbidden (HTTP 403)")
    );
    assert_eq!(
        status.transient.map(|message| message.text),
        status.error_message
    );
}

#[tokio::test]
async fn removing_record_under_edit_keeps_session() {
    let (store, _) = loaded_store(vec![pen()]).await;
    store.begin_edit(&id("1")).unwrap();

    store.remove_record(&id("1")).await.unwrap();

    assert!(store.records().is_empty());
    assert!(store.edit_session().is_editing(&id("1")));
}

#[tokio::test(start_paused = true)]
async fn mutations_are_refused_while_busy() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_remove(Duration::from_secs(1), Ok(()));
    let pen_id = id("1");

    let (removed, added) = tokio::join!(store.remove_record(&pen_id), async {
        assert!(store.is_busy());
        store.add_record(&RecordDraft::new("Book", "5", "9.99")).await
    });

    removed.unwrap();
    assert_eq!(added.unwrap_err(), StoreError::Busy);
    assert!(store.records().is_empty());
    assert!(!store.is_busy());
    assert_eq!(api.state.lock().unwrap().create_calls.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn abandoned_search_releases_busy_and_pending() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_list(Duration::from_secs(10), Ok(vec![]));

    let timed_out = tokio::time::timeout(Duration::from_millis(10), store.search("p")).await;
    assert!(timed_out.is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!store.is_busy());
    assert!(!store.is_search_pending());
    assert_eq!(store.records(), vec![pen()]);

    store
        .add_record(&RecordDraft::new("Book", "5", "9.99"))
        .await
        .unwrap();
    assert_eq!(store.records().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_mutation_releases_busy_gate() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_remove(Duration::from_secs(10), Ok(()));
    let pen_id = id("1");

    let timed_out =
        tokio::time::timeout(Duration::from_millis(10), store.remove_record(&pen_id)).await;
    assert!(timed_out.is_err());

    assert!(!store.is_busy());
    assert_eq!(store.records(), vec![pen()]);
    store.remove_record(&pen_id).await.unwrap();
    assert!(store.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_search_responses_are_discarded() {
    let (store, api) = loaded_store(vec![pen()]).await;
    let first_a = vec![record("10", "Apple", 1, 1.0)];
    let ab = vec![record("11", "Abacus", 1, 1.0)];
    let second_a = vec![record("10", "Apple", 1, 1.0), record("11", "Abacus", 1, 1.0)];
    api.script_list(Duration::from_millis(300), Ok(first_a));
    api.script_list(Duration::from_millis(500), Ok(ab));
    api.script_list(Duration::from_millis(100), Ok(second_a.clone()));

    let (first, second, third) =
        tokio::join!(store.search("a"), store.search("ab"), store.search("a"));

    assert_eq!(first.unwrap(), ListOutcome::Superseded);
    assert_eq!(second.unwrap(), ListOutcome::Superseded);
    assert_eq!(third.unwrap(), ListOutcome::Applied);
    assert_eq!(store.records(), second_a);
    assert_eq!(store.search_term(), "a");
    assert_eq!(
        store.search_state(),
        SearchState::Filtering {
            term: "a".to_string()
        }
    );
    assert!(!store.is_search_pending());
    assert_eq!(
        api.list_calls(),
        vec![
            None,
            Some("a".to_string()),
            Some("ab".to_string()),
            Some("a".to_string())
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn stale_search_failure_is_not_reported() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_list(
        Duration::from_millis(200),
        Err(RemoteError::new(None, "Request timed out")),
    );
    api.script_list(Duration::from_millis(50), Ok(vec![]));

    let (first, second) = tokio::join!(store.search("p"), store.search("pe"));

    assert_eq!(first.unwrap(), ListOutcome::Superseded);
    assert_eq!(second.unwrap(), ListOutcome::Applied);
    assert_eq!(store.status().error_message, None);
}

#[tokio::test]
async fn clearing_search_returns_to_idle_with_unfiltered_list() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_list(Duration::ZERO, Ok(vec![]));
    store.search("zzz").await.unwrap();
    assert!(store.records().is_empty());

    store.search("").await.unwrap();

    assert_eq!(store.search_state(), SearchState::Idle);
    assert_eq!(store.records(), vec![pen()]);
    assert_eq!(api.list_calls().last(), Some(&None));
}

#[tokio::test]
async fn set_search_term_updates_term_before_fetching() {
    let (store, _) = loaded_store(vec![pen()]).await;
    let ticket = store.set_search_term("pe");
    assert_eq!(store.search_term(), "pe");
    assert!(store.is_search_pending());

    store.run_search(ticket).await.unwrap();
    assert!(!store.is_search_pending());
}

#[tokio::test(start_paused = true)]
async fn transient_message_expires_after_ttl() {
    let (store, _) = loaded_store(vec![pen()]).await;
    store
        .add_record(&RecordDraft::new("Book", "5", "9.99"))
        .await
        .unwrap();

    tokio::time::sleep(TRANSIENT_MESSAGE_TTL - Duration::from_millis(100)).await;
    assert!(store.status().transient.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.status().transient.is_none());
    assert_eq!(store.records().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn newer_message_survives_older_timer() {
    let (store, _) = loaded_store(vec![pen()]).await;
    store
        .add_record(&RecordDraft::new("Book", "5", "9.99"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    store.remove_record(&id("1")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        store.status().transient.unwrap().text,
        "Product deleted successfully!"
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(store.status().transient.is_none());
}

#[tokio::test(start_paused = true)]
async fn expiry_keeps_persistent_error() {
    let (store, api) = loaded_store(vec![pen()]).await;
    api.script_remove(Duration::ZERO, Err(RemoteError::new(Some(403), "forbidden")));
    store.remove_record(&id("1")).await.unwrap_err();

    tokio::time::sleep(TRANSIENT_MESSAGE_TTL + Duration::from_millis(10)).await;

    let status = store.status();
    assert!(status.transient.is_none());
    assert!(status.error_message.is_some());
}

#[derive(Clone)]
struct FakeSigner {
    fail: bool,
}

impl AudioSigner for FakeSigner {
    async fn signed_url(&self, object_key: &str, _ttl: Duration) -> Result<String, AudioError> {
        if self.fail {
            return Err(AudioError::Signing("identity pool unavailable".to_string()));
        }
        Ok(format!("https://audio.example.com/{object_key}"))
    }
}

#[derive(Clone, Default)]
struct SlowPlayer {
    played: Arc<Mutex<Vec<String>>>,
}

impl AudioPlayer for SlowPlayer {
    async fn play(&self, url: &str) -> Result<(), AudioError> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.played.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn audio_failure_is_transient_only() {
    let (store, _) = loaded_store(vec![pen()]).await;
    let playback = AudioPlayback::new(FakeSigner { fail: true }, SlowPlayer::default());

    let error = store.play_audio_for(&id("1"), &playback).await.unwrap_err();

    assert!(matches!(error, AudioError::Signing(_)));
    let status = store.status();
    assert_eq!(status.error_message, None);
    assert!(!status.busy);
    assert_eq!(status.transient.unwrap().kind, MessageKind::Error);
    assert_eq!(store.records(), vec![pen()]);
    assert!(!store.is_playing(&id("1")));
}

#[tokio::test(start_paused = true)]
async fn playback_is_tracked_per_record() {
    let (store, _) = loaded_store(vec![pen(), record("2", "Book", 5, 9.99)]).await;
    let player = SlowPlayer::default();
    let playback = AudioPlayback::new(FakeSigner { fail: false }, player.clone());
    let pen_id = id("1");
    let book_id = id("2");

    let (one, repeat, two) = tokio::join!(
        store.play_audio_for(&pen_id, &playback),
        async {
            assert!(store.is_playing(&pen_id));
            assert!(!store.is_busy());
            store.play_audio_for(&pen_id, &playback).await
        },
        store.play_audio_for(&book_id, &playback),
    );

    one.unwrap();
    repeat.unwrap();
    two.unwrap();
    let mut played = player.played.lock().unwrap().clone();
    played.sort();
    assert_eq!(
        played,
        vec![
            "https://audio.example.com/1.mp3".to_string(),
            "https://audio.example.com/2.mp3".to_string()
        ]
    );
    assert!(!store.is_playing(&id("1")));
}

#[tokio::test(start_paused = true)]
async fn abandoned_playback_clears_playing_flag() {
    let (store, _) = loaded_store(vec![pen()]).await;
    let player = SlowPlayer::default();
    let playback = AudioPlayback::new(FakeSigner { fail: false }, player.clone());
    let pen_id = id("1");

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        store.play_audio_for(&pen_id, &playback),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!store.is_playing(&pen_id));

    store.play_audio_for(&pen_id, &playback).await.unwrap();
    assert_eq!(
        player.played.lock().unwrap().clone(),
        vec!["https://audio.example.com/1.mp3".to_string()]
    );
}
