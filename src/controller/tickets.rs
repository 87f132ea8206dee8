use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stamp carried by a fetch so its completion can be matched against the
/// latest request of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Monotonic request counter for one section.
///
/// Every new request supersedes the previous ones; only a completion
/// carrying the latest ticket may touch state.
#[derive(Debug, Clone, Default)]
pub struct TicketCounter(Arc<AtomicU64>);

impl TicketCounter {
    pub fn issue(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The latest ticket issued, for work that must be tied to it without
    /// superseding it
    pub fn current(&self) -> Ticket {
        Ticket(self.0.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tickets {
    pub gallery: TicketCounter,
    pub image: TicketCounter,
    pub comments: TicketCounter,
}
