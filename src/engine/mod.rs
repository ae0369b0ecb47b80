//! The multi-pattern matching engine seam.
//!
//! The query pipeline never looks inside the engine. It relies on three
//! capabilities only:
//!
//! - [`MatchEngine::compile`] turns the full rule set into an immutable,
//!   shareable database.
//! - [`MatchEngine::alloc_scratch`] produces the mutable scan workspace the
//!   engine needs, sized for one database.
//! - [`MatchEngine::scan`] runs one database over one input buffer using one
//!   scratch, reporting every match to a [`MatchSink`].
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Database (Sync, read-only)  │  shared by every request
//! └──────────────┬───────────────┘
//!                │
//!                ▼
//!       ┌─────────────────┐
//!       │ Scratch (mut)   │  one per database, exclusive during a scan
//!       └─────────────────┘
//! ```
//!
//! [`RegexEngine`] is the backend bundled with the crate.

pub mod flags;
pub mod regex_engine;

pub use self::flags::{CompileFlags, DEFAULT_FLAG_SPEC};
pub use self::regex_engine::{RegexDatabase, RegexEngine, RegexScratch};

use crate::error::Result;
use crate::ir::{MatchEvent, Rule};

/// Receives match events from a scan.
///
/// Scans never stop early: every match found in the input is delivered.
pub trait MatchSink {
    fn record(&mut self, event: MatchEvent);
}

impl MatchSink for Vec<MatchEvent> {
    fn record(&mut self, event: MatchEvent) {
        self.push(event);
    }
}

/// A multi-pattern matching engine.
pub trait MatchEngine: Send + Sync {
    /// Immutable compiled form of a rule set.
    type Database: Send + Sync;

    /// Mutable per-database scan workspace.
    type Scratch: Send;

    /// Compile every rule into one database. Any rule failing to compile
    /// fails the whole batch.
    fn compile(&self, rules: &[Rule]) -> Result<Self::Database>;

    /// Allocate a scan workspace sized for `database`.
    fn alloc_scratch(&self, database: &Self::Database) -> Result<Self::Scratch>;

    /// Scan `input`, calling `sink.record` once per match.
    ///
    /// Matches are reported in an order that is deterministic for a fixed
    /// database and input.
    fn scan(
        &self,
        database: &Self::Database,
        scratch: &mut Self::Scratch,
        input: &[u8],
        sink: &mut dyn MatchSink,
    ) -> Result<()>;
}
