// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shell (Asset Administration Shell) — the root digital-twin record.

use crate::reference::{LangString, Reference};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether an asset is a concrete instance, a reusable template, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Instance,
    Template,
    NotApplicable,
}

/// Metadata about the physical/digital asset a Shell twins.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetInformation {
    pub asset_kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
}

/// A Shell: identity, asset metadata, and an ordered set of weak
/// references to Submodels (spec §3). Removing a reference never deletes
/// its target; deleting a target never cascades to referring Shells
/// (spec §9 Open Questions — no cascade).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shell {
    pub id: String,
    pub id_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    pub asset_information: AssetInformation,
    #[serde(default)]
    pub submodels: Vec<Reference>,
}

impl Shell {
    /// Identifiers of every Submodel this Shell references, in order.
    /// Targets are not guaranteed to exist (spec invariant I3).
    #[must_use]
    pub fn submodel_ids(&self) -> Vec<&str> {
        self.submodels.iter().filter_map(Reference::target_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;

    #[test]
    fn submodel_ids_reads_targets_in_order() {
        let shell = Shell {
            id: "urn:ex:aas:1".into(),
            id_short: "A1".into(),
            description: None,
            asset_information: AssetInformation {
                asset_kind: AssetKind::Instance,
                global_asset_id: Some("urn:ex:asset:1".into()),
            },
            submodels: vec![
                Reference::to_submodel("urn:ex:sm:1"),
                Reference::to_submodel("urn:ex:sm:2"),
            ],
        };
        assert_eq!(shell.submodel_ids(), vec!["urn:ex:sm:1", "urn:ex:sm:2"]);
    }

    #[test]
    fn shell_round_trips_through_json() {
        let shell = Shell {
            id: "urn:ex:aas:1".into(),
            id_short: "A1".into(),
            description: None,
            asset_information: AssetInformation {
                asset_kind: AssetKind::Instance,
                global_asset_id: Some("urn:ex:asset:1".into()),
            },
            submodels: vec![],
        };
        let json = serde_json::to_string(&shell).unwrap();
        let back: Shell = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, shell.id);
    }
}
