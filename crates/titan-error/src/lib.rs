// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for Titan-AAS.
//!
//! Every component-level failure is translated, at the HTTP boundary, into
//! a [`TitanError`] carrying a machine-readable [`ErrorCode`], a human
//! message, an ISO-8601 timestamp, and an optional `correlation_id`. No
//! internal error type from `titan-store`, `titan-eventlog`, etc. crosses
//! the wire directly — callers convert with `From` impls or `.map_err`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to, mirroring the taxonomy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Metamodel/canonicalization input errors.
    Validation,
    /// Unknown or illegal query modifier.
    Modifier,
    /// Entity not found.
    NotFound,
    /// Duplicate identifier on create.
    Conflict,
    /// ETag mismatch on a conditional write.
    Precondition,
    /// Request body exceeded a size cap.
    Payload,
    /// Rate-limited by an external gate.
    RateLimit,
    /// Store I/O fault.
    Store,
    /// Event Log I/O fault.
    EventLog,
    /// Cache I/O fault (never surfaced to callers — fail-open).
    Cache,
    /// Uncaught internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Modifier => "modifier",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Precondition => "precondition",
            Self::Payload => "payload",
            Self::RateLimit => "rate_limit",
            Self::Store => "store",
            Self::EventLog => "event_log",
            Self::Cache => "cache",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code. Serializes `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input violates the AAS metamodel or canonicalization rules.
    ValidationError,
    /// Unknown or illegal combination of query modifiers.
    BadModifier,
    /// The requested entity does not exist.
    NotFound,
    /// A create attempted to reuse an existing identifier.
    Conflict,
    /// `If-Match`/`If-None-Match` did not match the current ETag.
    PreconditionFailed,
    /// Request body exceeded the configured size cap.
    PayloadTooLarge,
    /// Caller is being rate-limited.
    TooManyRequests,
    /// The Store could not be reached or failed durably.
    StoreUnavailable,
    /// The Event Log could not durably accept a write.
    EventLogUnavailable,
    /// The Cache could not be reached (never surfaced — fail-open).
    CacheUnavailable,
    /// Uncaught internal error.
    Internal,
}

impl ErrorCode {
    /// The [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::ValidationError => ErrorCategory::Validation,
            Self::BadModifier => ErrorCategory::Modifier,
            Self::NotFound => ErrorCategory::NotFound,
            Self::Conflict => ErrorCategory::Conflict,
            Self::PreconditionFailed => ErrorCategory::Precondition,
            Self::PayloadTooLarge => ErrorCategory::Payload,
            Self::TooManyRequests => ErrorCategory::RateLimit,
            Self::StoreUnavailable => ErrorCategory::Store,
            Self::EventLogUnavailable => ErrorCategory::EventLog,
            Self::CacheUnavailable => ErrorCategory::Cache,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// The HTTP status code this error maps to (spec §7).
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::ValidationError | Self::BadModifier => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::PreconditionFailed => 412,
            Self::PayloadTooLarge => 413,
            Self::TooManyRequests => 429,
            Self::StoreUnavailable | Self::EventLogUnavailable => 503,
            Self::CacheUnavailable | Self::Internal => 500,
        }
    }

    /// Whether this error kind is safe to retry with backoff locally before
    /// surfacing to the caller (spec §7 retry policy).
    #[must_use]
    pub fn retryable(self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::BadModifier => "BAD_MODIFIER",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::EventLogUnavailable => "EVENT_LOG_UNAVAILABLE",
            Self::CacheUnavailable => "CACHE_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// TitanError
// ---------------------------------------------------------------------------

/// A structured, wire-ready error.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct TitanError {
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// When the error was produced.
    pub timestamp: DateTime<Utc>,
    /// Correlation id of the request that triggered this error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Optional structured detail (field name, expected/actual, etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl TitanError {
    /// Build a new error of the given kind.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            details: None,
        }
    }

    /// Attach a correlation id (typically the request's `X-Request-Id`).
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The HTTP status this error should be surfaced as.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    // -- Convenience constructors matching spec §7 -------------------------

    /// 400 — metamodel/canonicalization violation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// 400 — unknown or illegal modifier combination.
    #[must_use]
    pub fn bad_modifier(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadModifier, message)
    }

    /// 404 — entity absent.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// 409 — duplicate id on create.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// 412 — ETag mismatch on write.
    #[must_use]
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PreconditionFailed, message)
    }

    /// 413 — body over cap.
    #[must_use]
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    /// 503 — Store I/O fault.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    /// 503 — Event Log cannot durably accept a write.
    #[must_use]
    pub fn event_log_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EventLogUnavailable, message)
    }

    /// 500 — uncaught internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

// ---------------------------------------------------------------------------
// Wire envelope (spec §6 "messages" error body)
// ---------------------------------------------------------------------------

/// Severity tag for a single message in an [`ErrorEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// An error — the request failed.
    Error,
    /// A warning — the request may have succeeded with caveats.
    Warning,
    /// Informational only.
    Info,
}

/// One message inside an [`ErrorEnvelope`]'s `messages` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Machine-readable code.
    pub code: String,
    /// Severity.
    pub message_type: MessageType,
    /// Human-readable text.
    pub text: String,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
}

/// The `{ "messages": [...] }` wire body used for every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// One or more messages describing the failure.
    pub messages: Vec<ErrorMessage>,
}

impl From<&TitanError> for ErrorEnvelope {
    fn from(err: &TitanError) -> Self {
        ErrorEnvelope {
            messages: vec![ErrorMessage {
                code: err.code.to_string(),
                message_type: MessageType::Error,
                text: err.message.clone(),
                timestamp: err.timestamp,
            }],
        }
    }
}
