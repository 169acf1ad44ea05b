// SPDX-License-Identifier: MIT OR Apache-2.0
//! Submodel Elements — the fixed, tagged-union set of typed nodes that make
//! up a Submodel's tree (spec §3). Duck-typed variants in the source
//! metamodel become a closed Rust sum type discriminated by `modelType`;
//! parsing and projection are exhaustive matches over it.

use crate::reference::{LangString, Reference};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The XSD-derived value type of a `Property`/`Range`. Values are always
/// retained as the caller's original text (spec I6, §4.1) — never
/// re-parsed into a native numeric type — to preserve lossless precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    #[serde(rename = "xs:string")]
    XsString,
    #[serde(rename = "xs:boolean")]
    XsBoolean,
    #[serde(rename = "xs:int")]
    XsInt,
    #[serde(rename = "xs:integer")]
    XsInteger,
    #[serde(rename = "xs:long")]
    XsLong,
    #[serde(rename = "xs:double")]
    XsDouble,
    #[serde(rename = "xs:float")]
    XsFloat,
    #[serde(rename = "xs:dateTime")]
    XsDateTime,
    #[serde(rename = "xs:date")]
    XsDate,
    #[serde(rename = "xs:anyURI")]
    XsAnyUri,
}

impl ValueType {
    /// Validate that `text` is a syntactically valid literal for this value
    /// type (spec §4.1 "Element-value syntactic form must match declared
    /// valueType"). This is a structural check, not a parse into a native
    /// type — the text is retained verbatim regardless of outcome.
    #[must_use]
    pub fn validate_literal(self, text: &str) -> bool {
        match self {
            Self::XsBoolean => text == "true" || text == "false",
            Self::XsInt | Self::XsInteger | Self::XsLong => {
                !text.is_empty() && text.parse::<i64>().is_ok()
            }
            Self::XsDouble | Self::XsFloat => !text.is_empty() && text.parse::<f64>().is_ok(),
            Self::XsDateTime => chrono::DateTime::parse_from_rfc3339(text).is_ok(),
            Self::XsDate => {
                chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
            }
            Self::XsString | Self::XsAnyUri => true,
        }
    }
}

/// Fields shared by every [`SubmodelElement`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementCommon {
    pub id_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
}

impl ElementCommon {
    /// Construct with only the required `idShort`.
    #[must_use]
    pub fn new(id_short: impl Into<String>) -> Self {
        Self {
            id_short: id_short.into(),
            description: None,
            semantic_id: None,
        }
    }
}

/// Which direction a [`SubmodelElement::BasicEventElement`] observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EventDirection {
    Input,
    Output,
}

/// Subscription state of a [`SubmodelElement::BasicEventElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum StateOfEvent {
    On,
    Off,
}

/// Whether an `Entity` element models a concrete instance or a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    CoManagedEntity,
    SelfManagedEntity,
}

/// The fixed set of Submodel Element variants (spec §3). Tagged by
/// `modelType` exactly as the wire format requires; unknown tags are a
/// [`crate::ValidationError`](titan-canon) concern, not representable here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "modelType")]
pub enum SubmodelElement {
    Property {
        #[serde(flatten)]
        common: ElementCommon,
        value_type: ValueType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    MultiLanguageProperty {
        #[serde(flatten)]
        common: ElementCommon,
        #[serde(default)]
        value: Vec<LangString>,
    },
    Range {
        #[serde(flatten)]
        common: ElementCommon,
        value_type: ValueType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<String>,
    },
    Blob {
        #[serde(flatten)]
        common: ElementCommon,
        content_type: String,
        /// Base64 payload. Present in the stored doc; the Projection
        /// Engine strips it unless `extent=withBlobValue` (spec §4.6).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    File {
        #[serde(flatten)]
        common: ElementCommon,
        content_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    ReferenceElement {
        #[serde(flatten)]
        common: ElementCommon,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Reference>,
    },
    RelationshipElement {
        #[serde(flatten)]
        common: ElementCommon,
        first: Reference,
        second: Reference,
    },
    AnnotatedRelationshipElement {
        #[serde(flatten)]
        common: ElementCommon,
        first: Reference,
        second: Reference,
        #[serde(default)]
        annotations: Vec<SubmodelElement>,
    },
    SubmodelElementCollection {
        #[serde(flatten)]
        common: ElementCommon,
        #[serde(default)]
        value: Vec<SubmodelElement>,
    },
    SubmodelElementList {
        #[serde(flatten)]
        common: ElementCommon,
        #[serde(default)]
        order_relevant: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_value_list_element: Option<String>,
        #[serde(default)]
        value: Vec<SubmodelElement>,
    },
    Entity {
        #[serde(flatten)]
        common: ElementCommon,
        entity_type: EntityType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        global_asset_id: Option<String>,
        #[serde(default)]
        specific_asset_ids: Vec<crate::reference::SpecificAssetId>,
        #[serde(default)]
        statements: Vec<SubmodelElement>,
    },
    BasicEventElement {
        #[serde(flatten)]
        common: ElementCommon,
        observed: Reference,
        direction: EventDirection,
        state: StateOfEvent,
    },
    Operation {
        #[serde(flatten)]
        common: ElementCommon,
        #[serde(default)]
        input_variables: Vec<SubmodelElement>,
        #[serde(default)]
        output_variables: Vec<SubmodelElement>,
        #[serde(default)]
        inoutput_variables: Vec<SubmodelElement>,
    },
    Capability {
        #[serde(flatten)]
        common: ElementCommon,
    },
}

impl SubmodelElement {
    /// The `idShort` of this element (present on every variant).
    #[must_use]
    pub fn id_short(&self) -> &str {
        &self.common().id_short
    }

    /// Borrow the fields shared by every variant.
    #[must_use]
    pub fn common(&self) -> &ElementCommon {
        match self {
            Self::Property { common, .. }
            | Self::MultiLanguageProperty { common, .. }
            | Self::Range { common, .. }
            | Self::Blob { common, .. }
            | Self::File { common, .. }
            | Self::ReferenceElement { common, .. }
            | Self::RelationshipElement { common, .. }
            | Self::AnnotatedRelationshipElement { common, .. }
            | Self::SubmodelElementCollection { common, .. }
            | Self::SubmodelElementList { common, .. }
            | Self::Entity { common, .. }
            | Self::BasicEventElement { common, .. }
            | Self::Operation { common, .. }
            | Self::Capability { common } => common,
        }
    }

    /// The direct children of this element, if it is a container variant
    /// (`SubmodelElementCollection`, `SubmodelElementList`). Leaf variants
    /// return an empty slice.
    ///
    /// This does *not* cover every variant with nested elements — see
    /// [`Self::nested_groups`] for the exhaustive form `AnnotatedRelationshipElement`,
    /// `Entity`, and `Operation` also need.
    #[must_use]
    pub fn children(&self) -> &[SubmodelElement] {
        match self {
            Self::SubmodelElementCollection { value, .. } => value,
            Self::SubmodelElementList { value, .. } => value,
            _ => &[],
        }
    }

    /// Every nested element list this variant carries, tagged with the
    /// path segment (spec §6 idShort-path addressing) a caller must name
    /// to pick that list, or `None` when the variant has only one such
    /// list and no segment is needed to disambiguate it (I4 sibling
    /// uniqueness is enforced within each returned list independently,
    /// never across two different lists of the same element — an
    /// `Operation`'s `inputVariables` and `outputVariables` may share an
    /// `idShort` because the segment makes their paths distinct).
    #[must_use]
    pub fn nested_groups(&self) -> Vec<(Option<&'static str>, &[SubmodelElement])> {
        match self {
            Self::SubmodelElementCollection { value, .. } => vec![(None, value.as_slice())],
            Self::SubmodelElementList { value, .. } => vec![(None, value.as_slice())],
            Self::AnnotatedRelationshipElement { annotations, .. } => vec![(None, annotations.as_slice())],
            Self::Entity { statements, .. } => vec![(None, statements.as_slice())],
            Self::Operation { input_variables, output_variables, inoutput_variables, .. } => vec![
                (Some("inputVariables"), input_variables.as_slice()),
                (Some("outputVariables"), output_variables.as_slice()),
                (Some("inoutputVariables"), inoutput_variables.as_slice()),
            ],
            _ => vec![],
        }
    }

    /// The `modelType` discriminant name, as written on the wire.
    #[must_use]
    pub fn model_type(&self) -> &'static str {
        match self {
            Self::Property { .. } => "Property",
            Self::MultiLanguageProperty { .. } => "MultiLanguageProperty",
            Self::Range { .. } => "Range",
            Self::Blob { .. } => "Blob",
            Self::File { .. } => "File",
            Self::ReferenceElement { .. } => "ReferenceElement",
            Self::RelationshipElement { .. } => "RelationshipElement",
            Self::AnnotatedRelationshipElement { .. } => "AnnotatedRelationshipElement",
            Self::SubmodelElementCollection { .. } => "SubmodelElementCollection",
            Self::SubmodelElementList { .. } => "SubmodelElementList",
            Self::Entity { .. } => "Entity",
            Self::BasicEventElement { .. } => "BasicEventElement",
            Self::Operation { .. } => "Operation",
            Self::Capability { .. } => "Capability",
        }
    }
}
