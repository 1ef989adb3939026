//! stockroom-core - Core library for Stockroom
//!
//! Records, the authenticated products client, identity session handling,
//! audio preview signing, and the collection store that keeps a local view
//! of the remote catalogue in step with every confirmed mutation.

pub mod audio;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{Record, RecordDraft, RecordFields, RecordId, ValidationError};
pub use store::{CollectionStore, ListOutcome, StoreError};
