// SPDX-License-Identifier: MIT OR Apache-2.0
//! References, keys, and multi-language strings shared across entities.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a [`Reference`] should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceType {
    /// Points at a model element within the same environment.
    ModelReference,
    /// Points at an external, globally unique identifier.
    ExternalReference,
}

/// The type of entity a [`Key`] segment addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum KeyType {
    /// Addresses a Shell.
    AssetAdministrationShell,
    /// Addresses a Submodel.
    Submodel,
    /// Addresses a ConceptDescription.
    ConceptDescription,
    /// Addresses a generic submodel element (the variant is carried by the
    /// element itself, not the key).
    SubmodelElement,
    /// Addresses a value outside the AAS metamodel (e.g. IRI, IRDI).
    GlobalReference,
}

/// A single segment of a [`Reference`]'s key chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    /// The kind of entity this segment addresses.
    #[serde(rename = "type")]
    pub key_type: KeyType,
    /// The identifier or idShort-path segment value.
    pub value: String,
}

impl Key {
    /// Construct a new key segment.
    #[must_use]
    pub fn new(key_type: KeyType, value: impl Into<String>) -> Self {
        Self {
            key_type,
            value: value.into(),
        }
    }
}

/// A weak reference to a Shell, Submodel, ConceptDescription, or external
/// resource. References are never resolved eagerly (spec invariant I3):
/// a Shell may hold a Submodel reference whose target does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    pub keys: Vec<Key>,
}

impl Reference {
    /// Build a single-key model reference to the given identifier.
    #[must_use]
    pub fn to_submodel(id: impl Into<String>) -> Self {
        Self {
            reference_type: ReferenceType::ModelReference,
            keys: vec![Key::new(KeyType::Submodel, id)],
        }
    }

    /// The identifier at the end of the key chain, if any.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.keys.last().map(|k| k.value.as_str())
    }
}

/// A text value paired with a BCP-47 language tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LangString {
    pub language: String,
    pub text: String,
}

/// An asset identifier keyed by a semantic name (used by `Entity` elements
/// and discovery lookups).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_subject_id: Option<Reference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_id_returns_last_key_value() {
        let r = Reference::to_submodel("urn:ex:sm:1");
        assert_eq!(r.target_id(), Some("urn:ex:sm:1"));
    }

    #[test]
    fn empty_reference_has_no_target() {
        let r = Reference {
            reference_type: ReferenceType::ExternalReference,
            keys: vec![],
        };
        assert_eq!(r.target_id(), None);
    }
}
