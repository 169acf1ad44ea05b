// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! titan-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for Titan-AAS: entity types plus the canonical-bytes
//! hashing helpers every component that computes an ETag shares.

/// Concept descriptions — standalone dictionary entries.
pub mod concept;
/// Registry descriptors (Shell/Submodel) and their endpoints.
pub mod descriptor;
/// The fixed Submodel Element variant set.
pub mod element;
/// References, keys, and language-tagged strings.
pub mod reference;
/// The Shell (Asset Administration Shell) entity.
pub mod shell;
/// The Submodel entity and its tree invariants.
pub mod submodel;

pub use concept::ConceptDescription;
pub use descriptor::{Endpoint, ShellDescriptor, SubmodelDescriptor};
pub use element::{ElementCommon, EntityType, EventDirection, StateOfEvent, SubmodelElement, ValueType};
pub use reference::{Key, KeyType, LangString, Reference, ReferenceType, SpecificAssetId};
pub use shell::{AssetInformation, AssetKind, Shell};
pub use submodel::{ModelingKind, Submodel, SubmodelInvariantError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current wire contract version, embedded in service metadata responses.
pub const CONTRACT_VERSION: &str = "titan-aas/v1";

/// The fixed set of entity kinds the Store persists (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Asset Administration Shell.
    Shell,
    /// Submodel.
    Submodel,
    /// Concept description.
    ConceptDescription,
    /// Shell registry descriptor.
    ShellDescriptor,
    /// Submodel registry descriptor.
    SubmodelDescriptor,
}

impl EntityKind {
    /// The lowercase wire name used in cache keys and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Submodel => "submodel",
            Self::ConceptDescription => "concept_description",
            Self::ShellDescriptor => "shell_descriptor",
            Self::SubmodelDescriptor => "submodel_descriptor",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the hex-encoded SHA-256 digest of `bytes` — used as the ETag
/// (spec §4.1, Glossary: "Canonical bytes").
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Produce a deterministic JSON string for a serializable value.
///
/// `serde_json::Value`'s default map representation is a `BTreeMap`, so
/// object keys are already sorted ascending by codepoint once round-tripped
/// through [`serde_json::to_value`] — this is the mechanism behind spec
/// I6's "stable key order within objects" without a bespoke serializer.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if `value` cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    serde_json::to_string(&v)
}

/// The durable row shape the Store persists for one entity (spec §3
/// "Stored record shape").
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Opaque identifier, unique within `kind`.
    pub id: String,
    /// URL-safe token form of `id` (spec §4.2).
    pub id_token: String,
    /// Canonical serialized bytes of the document (what fast-path reads
    /// stream verbatim).
    pub doc_bytes: Vec<u8>,
    /// `sha256_hex(doc_bytes)`.
    pub etag: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// When this row was first created.
    pub created_at: DateTime<Utc>,
    /// When this row was last updated. Strictly monotonic across
    /// successful writes to the same id (spec I5).
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Build a record from canonical bytes, computing the ETag.
    #[must_use]
    pub fn new(
        id: String,
        id_token: String,
        doc_bytes: Vec<u8>,
        kind: EntityKind,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let etag = sha256_hex(&doc_bytes);
        Self {
            id,
            id_token,
            doc_bytes,
            etag,
            kind,
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_deterministic() {
        let a = sha256_hex(b"hello");
        let b = sha256_hex(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }

    #[test]
    fn canonical_json_sorts_object_keys() {
        #[derive(Serialize)]
        struct Unsorted {
            z: i32,
            a: i32,
        }
        let json = canonical_json(&Unsorted { z: 1, a: 2 }).unwrap();
        assert_eq!(json, r#"{"a":2,"z":1}"#);
    }

    #[test]
    fn entity_kind_round_trips_serde() {
        for kind in [
            EntityKind::Shell,
            EntityKind::Submodel,
            EntityKind::ConceptDescription,
            EntityKind::ShellDescriptor,
            EntityKind::SubmodelDescriptor,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: EntityKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn stored_record_computes_etag_from_bytes() {
        let now = Utc::now();
        let rec = StoredRecord::new(
            "urn:ex:aas:1".into(),
            "token".into(),
            b"{\"id\":\"urn:ex:aas:1\"}".to_vec(),
            EntityKind::Shell,
            now,
            now,
        );
        assert_eq!(rec.etag, sha256_hex(b"{\"id\":\"urn:ex:aas:1\"}"));
    }
}
