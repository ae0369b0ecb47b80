//! Core records shared by rule loading, the engine, and the query pipeline.

use crate::engine::CompileFlags;
use serde::Serialize;

pub type RuleId = u32;

/// Metadata attached to a rule and returned alongside each of its matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub expression: String,
    pub payload: String,
}

impl RuleMetadata {
    pub fn new(expression: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            payload: payload.into(),
        }
    }
}

/// One compiled-to-be rule: a pattern, the flags it is compiled with, and
/// its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: RuleId,
    pub pattern: String,
    pub flags: CompileFlags,
    pub metadata: RuleMetadata,
}

impl Rule {
    pub fn new(id: RuleId, pattern: impl Into<String>, payload: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            id,
            metadata: RuleMetadata::new(pattern.clone(), payload),
            pattern,
            flags: CompileFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: CompileFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// A single match reported by the engine.
///
/// `from` and `to` are byte offsets into the scanned input with
/// `from <= to`. `flags` is engine-defined and passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchEvent {
    pub rule_id: RuleId,
    pub from: usize,
    pub to: usize,
    pub flags: u32,
}

impl MatchEvent {
    pub fn new(rule_id: RuleId, from: usize, to: usize, flags: u32) -> Self {
        debug_assert!(from <= to, "match start {from} past end {to}");
        Self {
            rule_id,
            from,
            to,
            flags,
        }
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// A match event enriched with the metadata of the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    #[serde(rename = "id")]
    pub rule_id: RuleId,
    pub from: usize,
    pub to: usize,
    pub flags: u32,
    #[serde(flatten)]
    pub metadata: RuleMetadata,
}

impl MatchRecord {
    pub fn new(event: MatchEvent, metadata: RuleMetadata) -> Self {
        Self {
            rule_id: event.rule_id,
            from: event.from,
            to: event.to,
            flags: event.flags,
            metadata,
        }
    }

    /// The matched bytes within `input`, if the offsets fit.
    pub fn matched<'a>(&self, input: &'a [u8]) -> Option<&'a [u8]> {
        input.get(self.from..self.to)
    }
}
