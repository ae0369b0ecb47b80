//! JSON envelope returned by the match endpoint.

use crate::ir::MatchRecord;
use crate::pipeline::QueryResult;
use serde::Serialize;

/// `{"errno": .., "message": .., "data": [..]}`
///
/// `errno` is 0 on match, 1 on no match, -1 on bad input and -2 on scan
/// error. `data` is always an array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResponse {
    pub errno: i32,
    pub message: String,
    pub data: Vec<MatchRecord>,
}

impl From<QueryResult> for MatchResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            errno: result.errno(),
            message: result.message,
            data: result.matches,
        }
    }
}

impl MatchResponse {
    pub fn to_json(&self) -> String {
        // Only strings and integers inside, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"errno":-2,"message":"serialization error: {e}","data":[]}}"#)
        })
    }
}
