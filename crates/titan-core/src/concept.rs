// SPDX-License-Identifier: MIT OR Apache-2.0
//! ConceptDescription — a standalone dictionary entry referenced by
//! elements via their `semanticId` (spec §3, Glossary).

use crate::reference::LangString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A dictionary entry describing the meaning of a semantic id.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDescription {
    pub id: String,
    pub id_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let cd = ConceptDescription {
            id: "urn:ex:cd:temperature".into(),
            id_short: "Temperature".into(),
            description: None,
            category: Some("PROPERTY".into()),
        };
        let json = serde_json::to_string(&cd).unwrap();
        let back: ConceptDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, cd.id);
    }
}
