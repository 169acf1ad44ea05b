// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conditional Engine (C11) — `If-Match`/`If-None-Match` handling, uniform
//! across the fast and slow read paths and every write route (spec §4.11).

use axum::http::HeaderMap;
use titan_error::TitanError;

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn unquote(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}

/// Parse an `If-Match` or `If-None-Match` header's comma-separated list of
/// etags (or the literal `*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchHeader {
    /// `*` — matches any current representation (or its absence).
    Any,
    /// An explicit list of etags (already unquoted).
    Etags(Vec<String>),
}

impl MatchHeader {
    fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return Self::Any;
        }
        Self::Etags(raw.split(',').map(|s| unquote(s).to_string()).collect())
    }

    fn matches(&self, current: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Etags(etags) => etags.iter().any(|e| e == current),
        }
    }
}

/// Outcome of evaluating request preconditions against a resource's current
/// state before a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDecision {
    /// Preconditions passed (or there were none); proceed with the write.
    Proceed,
    /// `412 Precondition Failed`.
    PreconditionFailed,
}

/// Evaluate `If-Match`/`If-None-Match: *` against the entity's current etag
/// (`None` if the entity does not yet exist), as required before any PUT or
/// DELETE (spec §4.11, §8 boundary cases).
#[must_use]
pub fn evaluate_write(headers: &HeaderMap, current_etag: Option<&str>) -> WriteDecision {
    if let Some(raw) = header_value(headers, "if-match") {
        let want = MatchHeader::parse(raw);
        let ok = match current_etag {
            Some(etag) => want.matches(etag),
            None => false,
        };
        if !ok {
            return WriteDecision::PreconditionFailed;
        }
    }

    if let Some(raw) = header_value(headers, "if-none-match") {
        let forbid = MatchHeader::parse(raw);
        // Spec only defines `If-None-Match` for writes as `*` guarding
        // against overwriting an entity that already exists.
        let blocks = match (&forbid, current_etag) {
            (MatchHeader::Any, Some(_)) => true,
            (MatchHeader::Etags(_), Some(etag)) => forbid.matches(etag),
            _ => false,
        };
        if blocks {
            return WriteDecision::PreconditionFailed;
        }
    }

    WriteDecision::Proceed
}

/// Evaluate `If-None-Match` against a read's current etag: `true` means the
/// client's cached copy is still fresh and the handler should respond `304`.
#[must_use]
pub fn read_not_modified(headers: &HeaderMap, current_etag: &str) -> bool {
    header_value(headers, "if-none-match")
        .map(MatchHeader::parse)
        .is_some_and(|h| h.matches(current_etag))
}

/// Build the `412` error for a failed write precondition.
#[must_use]
pub fn precondition_failed_error(entity_id: &str) -> TitanError {
    TitanError::precondition_failed(format!(
        "precondition failed for '{entity_id}': conditional header did not match current state"
    ))
}
