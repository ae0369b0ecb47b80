//! Per-request accumulation of match events.

use crate::engine::MatchSink;
use crate::ir::{MatchEvent, MatchRecord, RuleId, RuleMetadata};
use std::collections::HashMap;
use tracing::debug;

/// Collects the matches of one scan, resolving each rule id to its metadata.
///
/// A collector belongs to exactly one request; it is created fresh for every
/// scan and consumed when the scan completes. Unknown rule ids get empty
/// metadata.
#[derive(Debug)]
pub struct MatchCollector<'a> {
    metadata: &'a HashMap<RuleId, RuleMetadata>,
    input: &'a [u8],
    matches: Vec<MatchRecord>,
}

impl<'a> MatchCollector<'a> {
    pub fn new(metadata: &'a HashMap<RuleId, RuleMetadata>, input: &'a [u8]) -> Self {
        Self {
            metadata,
            input,
            matches: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn into_matches(self) -> Vec<MatchRecord> {
        self.matches
    }
}

impl MatchSink for MatchCollector<'_> {
    fn record(&mut self, event: MatchEvent) {
        let metadata = self
            .metadata
            .get(&event.rule_id)
            .cloned()
            .unwrap_or_default();

        debug!(
            id = event.rule_id,
            from = event.from,
            to = event.to,
            flags = event.flags,
            context = %String::from_utf8_lossy(self.input.get(event.from..event.to).unwrap_or_default()),
            "Match"
        );

        self.matches.push(MatchRecord::new(event, metadata));
    }
}
