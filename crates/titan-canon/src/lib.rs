// SPDX-License-Identifier: MIT OR Apache-2.0
//! titan-canon
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Validates raw JSON against the Titan-AAS metamodel and produces the
//! canonical bytes + ETag every downstream component treats as the
//! document's identity.

mod dupes;
mod fields;

use serde::Serialize;
use titan_core::{
    ConceptDescription, EntityKind, Shell, ShellDescriptor, Submodel, SubmodelDescriptor,
    SubmodelElement, SubmodelInvariantError, ValueType,
};
use unicode_normalization::UnicodeNormalization;

/// Everything that can go wrong validating or canonicalizing a document.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CanonError {
    /// Raw payload was not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    /// The raw bytes are not syntactically valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),
    /// The same key appeared twice within one JSON object.
    #[error("duplicate key '{0}' within one object")]
    DuplicateKey(String),
    /// A key not in the known shape for this entity/element appeared.
    #[error("unknown key '{key}' at '{path}'")]
    UnknownKey {
        /// Dot/bracket path to the offending object.
        path: String,
        /// The unrecognized key.
        key: String,
    },
    /// A `modelType` tag outside the fixed Submodel Element set.
    #[error("unknown modelType '{0}'")]
    UnknownModelType(String),
    /// Typed deserialization failed after the structural checks passed.
    #[error("document does not match the expected shape: {0}")]
    Shape(String),
    /// `id` was empty or exceeded the size cap.
    #[error("identifier at '{path}' is invalid: {reason}")]
    InvalidId {
        /// Path to the offending identifier field.
        path: String,
        /// What's wrong with it.
        reason: String,
    },
    /// A Property/Range value did not match its declared `valueType`.
    #[error("value at '{path}' does not match valueType {value_type:?}: '{value}'")]
    InvalidLiteral {
        /// Path to the offending element.
        path: String,
        /// The declared value type.
        value_type: ValueType,
        /// The literal text that failed validation.
        value: String,
    },
    /// A Submodel tree violated I4 (duplicate sibling `idShort`) or the
    /// recursion depth cap.
    #[error(transparent)]
    Invariant(#[from] SubmodelInvariantError),
    /// Serialization to canonical bytes failed (should not happen for a
    /// document that passed the prior checks).
    #[error("failed to serialize canonical form: {0}")]
    Canonicalize(String),
}

impl From<CanonError> for titan_error::TitanError {
    fn from(err: CanonError) -> Self {
        titan_error::TitanError::validation(err.to_string())
    }
}

/// Limits applied while validating a document (spec §4.1, §6 config table).
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    /// Maximum byte length of any entity `id` (default 2048).
    pub max_id_bytes: usize,
    /// Maximum element-tree recursion depth within a Submodel (default 64).
    pub max_recursion_depth: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_id_bytes: titan_idcodec::MAX_ID_BYTES,
            max_recursion_depth: 64,
        }
    }
}

/// A parsed, validated document of one of the five stored entity kinds.
#[derive(Debug, Clone)]
pub enum ParsedDoc {
    /// A Shell.
    Shell(Shell),
    /// A Submodel.
    Submodel(Submodel),
    /// A ConceptDescription.
    ConceptDescription(ConceptDescription),
    /// A Shell registry descriptor.
    ShellDescriptor(ShellDescriptor),
    /// A Submodel registry descriptor.
    SubmodelDescriptor(SubmodelDescriptor),
}

impl ParsedDoc {
    /// The entity's `id` field.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Shell(s) => &s.id,
            Self::Submodel(s) => &s.id,
            Self::ConceptDescription(c) => &c.id,
            Self::ShellDescriptor(d) => &d.id,
            Self::SubmodelDescriptor(d) => &d.id,
        }
    }

    /// The [`EntityKind`] this document belongs to.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Shell(_) => EntityKind::Shell,
            Self::Submodel(_) => EntityKind::Submodel,
            Self::ConceptDescription(_) => EntityKind::ConceptDescription,
            Self::ShellDescriptor(_) => EntityKind::ShellDescriptor,
            Self::SubmodelDescriptor(_) => EntityKind::SubmodelDescriptor,
        }
    }

    fn set_id(&mut self, id: String) {
        match self {
            Self::Shell(s) => s.id = id,
            Self::Submodel(s) => s.id = id,
            Self::ConceptDescription(c) => c.id = id,
            Self::ShellDescriptor(d) => d.id = id,
            Self::SubmodelDescriptor(d) => d.id = id,
        }
    }
}

fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    titan_core::canonical_json(value)
        .map(String::into_bytes)
        .map_err(|e| CanonError::Canonicalize(e.to_string()))
}

fn validate_id(id: &str, path: &str, limits: &ValidationLimits) -> Result<String, CanonError> {
    if id.is_empty() {
        return Err(CanonError::InvalidId {
            path: path.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    let normalized: String = id.nfc().collect();
    if normalized.len() > limits.max_id_bytes {
        return Err(CanonError::InvalidId {
            path: path.to_string(),
            reason: format!("exceeds {} bytes", limits.max_id_bytes),
        });
    }
    Ok(normalized)
}

fn validate_element_tree(el: &SubmodelElement, path: &str) -> Result<(), CanonError> {
    match el {
        SubmodelElement::Property { value_type, value, .. } => {
            if let Some(v) = value {
                if !value_type.validate_literal(v) {
                    return Err(CanonError::InvalidLiteral {
                        path: path.to_string(),
                        value_type: *value_type,
                        value: v.clone(),
                    });
                }
            }
        }
        SubmodelElement::Range { value_type, min, max, .. } => {
            for (label, v) in [("min", min), ("max", max)] {
                if let Some(v) = v {
                    if !value_type.validate_literal(v) {
                        return Err(CanonError::InvalidLiteral {
                            path: format!("{path}.{label}"),
                            value_type: *value_type,
                            value: v.clone(),
                        });
                    }
                }
            }
        }
        SubmodelElement::AnnotatedRelationshipElement { annotations, .. } => {
            for (i, child) in annotations.iter().enumerate() {
                validate_element_tree(child, &format!("{path}.annotations[{i}]"))?;
            }
        }
        SubmodelElement::SubmodelElementCollection { value, .. }
        | SubmodelElement::SubmodelElementList { value, .. } => {
            for (i, child) in value.iter().enumerate() {
                validate_element_tree(child, &format!("{path}[{i}]"))?;
            }
        }
        SubmodelElement::Entity { statements, .. } => {
            for (i, child) in statements.iter().enumerate() {
                validate_element_tree(child, &format!("{path}.statements[{i}]"))?;
            }
        }
        SubmodelElement::Operation {
            input_variables,
            output_variables,
            inoutput_variables,
            ..
        } => {
            for (label, vars) in [
                ("inputVariables", input_variables),
                ("outputVariables", output_variables),
                ("inoutputVariables", inoutput_variables),
            ] {
                for (i, child) in vars.iter().enumerate() {
                    validate_element_tree(child, &format!("{path}.{label}[{i}]"))?;
                }
            }
        }
        SubmodelElement::MultiLanguageProperty { .. }
        | SubmodelElement::Blob { .. }
        | SubmodelElement::File { .. }
        | SubmodelElement::ReferenceElement { .. }
        | SubmodelElement::RelationshipElement { .. }
        | SubmodelElement::BasicEventElement { .. }
        | SubmodelElement::Capability { .. } => {}
    }
    Ok(())
}

/// Parse, validate, and canonicalize a raw JSON payload for the given
/// entity kind (spec §4.1 `parse_and_validate`).
///
/// # Errors
///
/// Returns [`titan_error::TitanError`] (category `Validation`) on any
/// metamodel violation: invalid UTF-8, malformed JSON, duplicate or
/// unknown keys, an invalid or oversized `id`, a value that doesn't match
/// its declared `valueType`, or a Submodel tree that violates I4 or the
/// recursion depth cap.
pub fn parse_and_validate(
    raw: &[u8],
    kind: EntityKind,
    limits: &ValidationLimits,
) -> Result<(ParsedDoc, Vec<u8>, String), titan_error::TitanError> {
    parse_and_validate_inner(raw, kind, limits).map_err(Into::into)
}

fn parse_and_validate_inner(
    raw: &[u8],
    kind: EntityKind,
    limits: &ValidationLimits,
) -> Result<(ParsedDoc, Vec<u8>, String), CanonError> {
    let text = std::str::from_utf8(raw).map_err(|_| CanonError::InvalidUtf8)?;
    dupes::check_no_duplicate_keys(text)?;

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CanonError::Malformed(e.to_string()))?;
    fields::check_known_fields(&value, kind)?;

    let mut doc = match kind {
        EntityKind::Shell => ParsedDoc::Shell(
            serde_json::from_value(value).map_err(|e| CanonError::Shape(e.to_string()))?,
        ),
        EntityKind::Submodel => ParsedDoc::Submodel(
            serde_json::from_value(value).map_err(|e| CanonError::Shape(e.to_string()))?,
        ),
        EntityKind::ConceptDescription => ParsedDoc::ConceptDescription(
            serde_json::from_value(value).map_err(|e| CanonError::Shape(e.to_string()))?,
        ),
        EntityKind::ShellDescriptor => ParsedDoc::ShellDescriptor(
            serde_json::from_value(value).map_err(|e| CanonError::Shape(e.to_string()))?,
        ),
        EntityKind::SubmodelDescriptor => ParsedDoc::SubmodelDescriptor(
            serde_json::from_value(value).map_err(|e| CanonError::Shape(e.to_string()))?,
        ),
    };

    let normalized_id = validate_id(doc.id(), "$.id", limits)?;
    doc.set_id(normalized_id);

    if let ParsedDoc::Submodel(sm) = &doc {
        sm.check_invariants(limits.max_recursion_depth)?;
        for (i, el) in sm.submodel_elements.iter().enumerate() {
            validate_element_tree(el, &format!("$.submodelElements[{i}]"))?;
        }
    }

    let (bytes, etag) = recanonicalize_inner(&doc)?;
    Ok((doc, bytes, etag))
}

/// Recompute canonical bytes and ETag for an already-validated document
/// (spec §4.1 `recanonicalize`) — used after an element-wise mutation
/// inside a Submodel, where the whole payload was never re-submitted.
///
/// # Errors
///
/// Returns [`titan_error::TitanError`] only if serialization itself fails,
/// which should not happen for a document built from already-valid types.
pub fn recanonicalize(doc: &ParsedDoc) -> Result<(Vec<u8>, String), titan_error::TitanError> {
    recanonicalize_inner(doc).map_err(Into::into)
}

fn recanonicalize_inner(doc: &ParsedDoc) -> Result<(Vec<u8>, String), CanonError> {
    let bytes = match doc {
        ParsedDoc::Shell(s) => canonicalize(s)?,
        ParsedDoc::Submodel(s) => canonicalize(s)?,
        ParsedDoc::ConceptDescription(c) => canonicalize(c)?,
        ParsedDoc::ShellDescriptor(d) => canonicalize(d)?,
        ParsedDoc::SubmodelDescriptor(d) => canonicalize(d)?,
    };
    let etag = titan_core::sha256_hex(&bytes);
    Ok((bytes, etag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits() -> ValidationLimits {
        ValidationLimits::default()
    }

    #[test]
    fn parses_minimal_valid_shell() {
        let raw = json!({
            "id": "urn:ex:aas:1",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": []
        })
        .to_string();
        let (doc, bytes, etag) =
            parse_and_validate(raw.as_bytes(), EntityKind::Shell, &limits()).unwrap();
        assert_eq!(doc.id(), "urn:ex:aas:1");
        assert_eq!(etag, titan_core::sha256_hex(&bytes));
        assert!(!bytes.iter().any(|b| *b == b'\n'));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let raw = br#"{"id":"a","id":"b","idShort":"A","assetInformation":{"assetKind":"Instance"}}"#;
        assert!(parse_and_validate(raw, EntityKind::Shell, &limits()).is_err());
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let raw = json!({
            "id": "urn:ex:aas:1",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": [],
            "unexpected": true
        })
        .to_string();
        assert!(parse_and_validate(raw.as_bytes(), EntityKind::Shell, &limits()).is_err());
    }

    #[test]
    fn rejects_invalid_literal_for_declared_value_type() {
        let raw = json!({
            "id": "urn:ex:sm:1",
            "idShort": "SM",
            "kind": "Instance",
            "submodelElements": [
                {"modelType": "Property", "idShort": "Temp", "valueType": "xs:double", "value": "not-a-number"}
            ]
        })
        .to_string();
        assert!(parse_and_validate(raw.as_bytes(), EntityKind::Submodel, &limits()).is_err());
    }

    #[test]
    fn rejects_duplicate_sibling_id_short() {
        let raw = json!({
            "id": "urn:ex:sm:1",
            "idShort": "SM",
            "kind": "Instance",
            "submodelElements": [
                {"modelType": "Capability", "idShort": "X"},
                {"modelType": "Capability", "idShort": "X"}
            ]
        })
        .to_string();
        assert!(parse_and_validate(raw.as_bytes(), EntityKind::Submodel, &limits()).is_err());
    }

    #[test]
    fn rejects_empty_id() {
        let raw = json!({
            "id": "",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": []
        })
        .to_string();
        assert!(parse_and_validate(raw.as_bytes(), EntityKind::Shell, &limits()).is_err());
    }

    #[test]
    fn canonical_bytes_are_deterministic_regardless_of_input_key_order() {
        let a = json!({
            "id": "urn:ex:aas:1",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": []
        })
        .to_string();
        let b = json!({
            "submodels": [],
            "assetInformation": {"assetKind": "Instance"},
            "idShort": "A1",
            "id": "urn:ex:aas:1"
        })
        .to_string();
        let (_, bytes_a, _) = parse_and_validate(a.as_bytes(), EntityKind::Shell, &limits()).unwrap();
        let (_, bytes_b, _) = parse_and_validate(b.as_bytes(), EntityKind::Shell, &limits()).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn recanonicalize_matches_original_canonical_bytes() {
        let raw = json!({
            "id": "urn:ex:aas:1",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": []
        })
        .to_string();
        let (doc, bytes, etag) =
            parse_and_validate(raw.as_bytes(), EntityKind::Shell, &limits()).unwrap();
        let (bytes2, etag2) = recanonicalize(&doc).unwrap();
        assert_eq!(bytes, bytes2);
        assert_eq!(etag, etag2);
    }
}
