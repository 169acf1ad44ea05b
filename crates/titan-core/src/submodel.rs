// SPDX-License-Identifier: MIT OR Apache-2.0
//! Submodel — a named container of typed Elements (spec §3).

use crate::element::SubmodelElement;
use crate::reference::{LangString, Reference};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether a Submodel describes a concrete instance or a reusable template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ModelingKind {
    Instance,
    Template,
}

/// A Submodel: identity plus an ordered tree of [`SubmodelElement`]s.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Submodel {
    pub id: String,
    pub id_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    pub kind: ModelingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default)]
    pub submodel_elements: Vec<SubmodelElement>,
}

/// Error describing which invariant a Submodel tree violates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmodelInvariantError {
    /// Two siblings under the same parent share an `idShort` (spec I4).
    #[error("duplicate idShort '{id_short}' among siblings at path '{path}'")]
    DuplicateSiblingIdShort { path: String, id_short: String },
    /// The element tree exceeds the configured recursion depth.
    #[error("element tree exceeds recursion depth limit of {limit} at path '{path}'")]
    DepthExceeded { path: String, limit: usize },
}

impl Submodel {
    /// An empty Submodel is a valid boundary case (spec §8): no elements,
    /// still round-trips and is listable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.submodel_elements.is_empty()
    }

    /// Check spec invariant I4 (no two siblings share an `idShort`) and the
    /// recursion-depth cap, recursively over the whole tree.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, depth-first, left-to-right.
    pub fn check_invariants(&self, depth_limit: usize) -> Result<(), SubmodelInvariantError> {
        check_siblings(&self.submodel_elements, "", 1, depth_limit)
    }
}

fn check_siblings(
    elements: &[SubmodelElement],
    path: &str,
    depth: usize,
    depth_limit: usize,
) -> Result<(), SubmodelInvariantError> {
    if depth > depth_limit {
        return Err(SubmodelInvariantError::DepthExceeded {
            path: path.to_string(),
            limit: depth_limit,
        });
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for el in elements {
        let id_short = el.id_short();
        if !seen.insert(id_short) {
            return Err(SubmodelInvariantError::DuplicateSiblingIdShort {
                path: path.to_string(),
                id_short: id_short.to_string(),
            });
        }
        let child_path = if path.is_empty() {
            id_short.to_string()
        } else {
            format!("{path}.{id_short}")
        };
        for (label, group) in el.nested_groups() {
            let group_path = match label {
                Some(segment) => format!("{child_path}.{segment}"),
                None => child_path.clone(),
            };
            check_siblings(group, &group_path, depth + 1, depth_limit)?;
        }
    }
    Ok(())
}
