//! Single in-progress edit.

use crate::models::{Record, RecordDraft, RecordId};

/// At most one record under edit. Starting a new edit discards the old draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSession {
    target: Option<RecordId>,
    draft: RecordDraft,
}

impl EditSession {
    pub fn begin(&mut self, record: &Record) -> RecordDraft {
        self.target = Some(record.id.clone());
        self.draft = RecordDraft::from_record(record);
        self.draft.clone()
    }

    pub const fn target(&self) -> Option<&RecordId> {
        self.target.as_ref()
    }

    pub const fn draft(&self) -> &RecordDraft {
        &self.draft
    }

    pub const fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_editing(&self, id: &RecordId) -> bool {
        self.target.as_ref() == Some(id)
    }

    /// Replace the draft text; ignored when nothing is being edited.
    pub fn set_draft(&mut self, draft: RecordDraft) -> bool {
        if self.target.is_none() {
            return false;
        }
        self.draft = draft;
        true
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.draft = RecordDraft::default();
    }
}
