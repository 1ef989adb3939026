//! Data models for Stockroom

mod record;

pub use record::{Record, RecordDraft, RecordFields, RecordId, ValidationError};
