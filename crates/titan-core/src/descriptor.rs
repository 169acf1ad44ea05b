// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry descriptors — entries advertising where a Shell/Submodel is
//! served (spec §3, Glossary). Independent artifacts: deleting a Shell
//! never cascades to its descriptor (spec §9 Open Questions).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One endpoint a descriptor advertises.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub interface: String,
    pub href: String,
}

/// Registry entry for a Shell.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShellDescriptor {
    pub id: String,
    pub id_short: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
}

/// Registry entry for a Submodel.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelDescriptor {
    pub id: String,
    pub id_short: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<crate::reference::Reference>,
}
