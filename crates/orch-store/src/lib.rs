//! Durable storage for the orchestration runtime: the append-only event
//! log, the hash-chained evidence ledger, and a SQLite index over both for
//! fast cross-session queries. The JSONL files are the source of truth;
//! the index is an accelerator and can always be rebuilt from them.

mod error;
mod event_store;
mod index;
mod ledger;

pub use error::{Error, Result};
pub use event_store::{AppendOutcome, EventStore};
pub use index::Index;
pub use ledger::{EvidenceRow, Filter as LedgerFilter, Ledger, NewEvidence, Verdict};
