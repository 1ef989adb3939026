//! Search term state and request sequencing.
//!
//! Every list request (initial load included) takes a ticket with a
//! monotonically increasing sequence number. Only the response to the most
//! recently issued ticket may be applied; earlier responses that arrive late
//! are dropped, so the collection always reflects the last term typed.

/// Which view of the collection the store is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    /// Empty term; the collection is the full list.
    Idle,
    /// Non-empty term; the collection is the last result for `term`.
    Filtering { term: String },
}

/// An issued list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub seq: u64,
    pub term: String,
}

impl SearchTicket {
    /// Term to send to the backend, `None` for the unfiltered list.
    pub fn query(&self) -> Option<&str> {
        let term = self.term.trim();
        (!term.is_empty()).then_some(term)
    }
}

#[derive(Debug, Default)]
pub struct SearchCoordinator {
    term: String,
    latest_seq: u64,
    settled_seq: u64,
}

impl SearchCoordinator {
    /// Record a new term and issue a ticket for it.
    pub fn set_term(&mut self, term: impl Into<String>) -> SearchTicket {
        self.term = term.into();
        self.issue()
    }

    /// Issue a ticket for the current term without changing it.
    pub fn reissue(&mut self) -> SearchTicket {
        self.issue()
    }

    fn issue(&mut self) -> SearchTicket {
        self.latest_seq += 1;
        SearchTicket {
            seq: self.latest_seq,
            term: self.term.clone(),
        }
    }

    /// Whether `ticket` is still the most recently issued one.
    pub const fn is_latest(&self, ticket: &SearchTicket) -> bool {
        ticket.seq == self.latest_seq
    }

    /// Mark a ticket's request as over, answered or abandoned.
    pub fn settle(&mut self, ticket: &SearchTicket) {
        if self.is_latest(ticket) {
            self.settled_seq = ticket.seq;
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn state(&self) -> SearchState {
        let term = self.term.trim();
        if term.is_empty() {
            SearchState::Idle
        } else {
            SearchState::Filtering {
                term: term.to_string(),
            }
        }
    }

    /// Whether the latest issued list request is still outstanding.
    pub const fn is_pending(&self) -> bool {
        self.settled_seq < self.latest_seq
    }
}
