// SPDX-License-Identifier: MIT OR Apache-2.0
//! Projection Engine (C6) — applies AAS query modifiers (`level`, `extent`,
//! `$value`, `$metadata`, `$path`) to a parsed Submodel. Purely functional:
//! no I/O, no mutation of its input.
//!
//! Modifiers compose in a fixed order: `level` first, then `extent`, then at
//! most one of `$value`/`$metadata`/`$path`. An unrecognized modifier name or
//! value is always a [`TitanError::bad_modifier`] — there is no silent
//! ignore path.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde_json::{Map, Value, json};
use titan_core::element::{EntityType, EventDirection, StateOfEvent, SubmodelElement, ValueType};
use titan_core::reference::{LangString, Reference};
use titan_core::{EntityKind, Submodel};
use titan_error::TitanError;

// ── Modifier parsing ────────────────────────────────────────────────────

/// `level` modifier value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Drop nested element structure below the top level; keep top-level
    /// metadata. "Top level" means direct children of the Submodel itself —
    /// a container's own `value` array is cleared, but the container and
    /// its siblings keep their own `idShort`/description/semanticId.
    Core,
    /// Keep the full tree. The default.
    #[default]
    Deep,
}

/// `extent` modifier value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extent {
    /// Include binary `value` fields of Blob elements, base64-encoded.
    WithBlobValue,
    /// Omit Blob value bytes, keep `contentType`. The default.
    #[default]
    WithoutBlobValue,
}

/// The terminal, shape-changing modifier, mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Return only element values, recursively; strip types, semantic ids,
    /// descriptions.
    Value,
    /// Return only metadata — everything except values.
    Metadata,
    /// Return the list of addressable element paths.
    Path,
}

/// A fully parsed, legal set of query modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// The `level` modifier, or its default.
    pub level: Level,
    /// The `extent` modifier, or its default.
    pub extent: Extent,
    /// At most one of `$value`/`$metadata`/`$path`, if requested.
    pub terminal: Option<Terminal>,
}

impl Modifiers {
    /// Parse `level`/`extent` query parameters plus an optional terminal
    /// suffix (`value`, `metadata`, or `path`, with the leading `$` already
    /// stripped by the caller). Any unrecognized parameter name, value, or
    /// suffix is a `BadModifier` error.
    pub fn parse(
        params: &[(&str, &str)],
        terminal_suffix: Option<&str>,
    ) -> Result<Self, TitanError> {
        let mut level = Level::default();
        let mut extent = Extent::default();

        for &(name, value) in params {
            match name {
                "level" => {
                    level = match value {
                        "core" => Level::Core,
                        "deep" => Level::Deep,
                        other => {
                            return Err(TitanError::bad_modifier(format!(
                                "unknown level value '{other}'"
                            )));
                        }
                    };
                }
                "extent" => {
                    extent = match value {
                        "withBlobValue" => Extent::WithBlobValue,
                        "withoutBlobValue" => Extent::WithoutBlobValue,
                        other => {
                            return Err(TitanError::bad_modifier(format!(
                                "unknown extent value '{other}'"
                            )));
                        }
                    };
                }
                "cursor" | "limit" | "content" => {
                    // Not projection modifiers; the Router/list layer owns these.
                }
                other => {
                    return Err(TitanError::bad_modifier(format!(
                        "unknown query modifier '{other}'"
                    )));
                }
            }
        }

        let terminal = match terminal_suffix {
            None => None,
            Some("value") => Some(Terminal::Value),
            Some("metadata") => Some(Terminal::Metadata),
            Some("path") => Some(Terminal::Path),
            Some(other) => {
                return Err(TitanError::bad_modifier(format!(
                    "unknown path suffix '${other}'"
                )));
            }
        };

        Ok(Self { level, extent, terminal })
    }
}

/// The shape-varying result of a projection: `level`/`extent` alone still
/// produce a full Submodel; a terminal modifier changes the output shape
/// entirely.
#[derive(Debug, Clone)]
pub enum Projected {
    /// `level`/`extent` applied, no terminal modifier: still a Submodel.
    Full(Submodel),
    /// `$value` output.
    Value(Value),
    /// `$metadata` output.
    Metadata(Value),
    /// `$path` output: every addressable element path, depth-first,
    /// left-to-right.
    Paths(Vec<String>),
}

/// Reject terminal modifiers on entity kinds that have no Submodel element
/// tree. The source implementation leaves this undefined; here, `$value`,
/// `$metadata`, and `$path` are rejected outright for anything that isn't a
/// Submodel, while `level`/`extent` are accepted as no-ops (nothing in a
/// Shell, ConceptDescription, or descriptor is nested structure or a Blob).
pub fn validate_for_kind(kind: EntityKind, modifiers: &Modifiers) -> Result<(), TitanError> {
    if kind != EntityKind::Submodel && modifiers.terminal.is_some() {
        return Err(TitanError::bad_modifier(format!(
            "'$value'/'$metadata'/'$path' only apply to submodels, not {}",
            kind.as_str()
        )));
    }
    Ok(())
}

/// Apply `modifiers` to a Submodel, in the fixed order `level`, `extent`,
/// then the terminal modifier.
#[must_use]
pub fn project(sm: &Submodel, modifiers: &Modifiers) -> Projected {
    let mut elements = apply_level(&sm.submodel_elements, modifiers.level);
    elements = elements.iter().map(|e| apply_extent(e, modifiers.extent)).collect();

    match modifiers.terminal {
        None => Projected::Full(Submodel { submodel_elements: elements, ..sm.clone() }),
        Some(Terminal::Value) => Projected::Value(elements_to_value(&elements)),
        Some(Terminal::Metadata) => Projected::Metadata(elements_to_metadata(&elements)),
        Some(Terminal::Path) => {
            let mut paths = Vec::new();
            collect_paths(&elements, "", &mut paths);
            Projected::Paths(paths)
        }
    }
}

// ── level ───────────────────────────────────────────────────────────────

fn apply_level(elements: &[SubmodelElement], level: Level) -> Vec<SubmodelElement> {
    match level {
        Level::Deep => elements.to_vec(),
        Level::Core => elements.iter().map(strip_below_top_level).collect(),
    }
}

fn strip_below_top_level(el: &SubmodelElement) -> SubmodelElement {
    match el.clone() {
        SubmodelElement::SubmodelElementCollection { common, .. } => {
            SubmodelElement::SubmodelElementCollection { common, value: Vec::new() }
        }
        SubmodelElement::SubmodelElementList { common, order_relevant, type_value_list_element, .. } => {
            SubmodelElement::SubmodelElementList {
                common,
                order_relevant,
                type_value_list_element,
                value: Vec::new(),
            }
        }
        SubmodelElement::AnnotatedRelationshipElement { common, first, second, .. } => {
            SubmodelElement::AnnotatedRelationshipElement {
                common,
                first,
                second,
                annotations: Vec::new(),
            }
        }
        SubmodelElement::Entity { common, entity_type, global_asset_id, specific_asset_ids, .. } => {
            SubmodelElement::Entity {
                common,
                entity_type,
                global_asset_id,
                specific_asset_ids,
                statements: Vec::new(),
            }
        }
        SubmodelElement::Operation { common, .. } => SubmodelElement::Operation {
            common,
            input_variables: Vec::new(),
            output_variables: Vec::new(),
            inoutput_variables: Vec::new(),
        },
        leaf => leaf,
    }
}

// ── extent ──────────────────────────────────────────────────────────────

fn apply_extent(el: &SubmodelElement, extent: Extent) -> SubmodelElement {
    match el.clone() {
        SubmodelElement::Blob { common, content_type, value } => {
            let value = match extent {
                Extent::WithBlobValue => value,
                Extent::WithoutBlobValue => None,
            };
            SubmodelElement::Blob { common, content_type, value }
        }
        SubmodelElement::SubmodelElementCollection { common, value } => {
            SubmodelElement::SubmodelElementCollection {
                common,
                value: value.iter().map(|c| apply_extent(c, extent)).collect(),
            }
        }
        SubmodelElement::SubmodelElementList { common, order_relevant, type_value_list_element, value } => {
            SubmodelElement::SubmodelElementList {
                common,
                order_relevant,
                type_value_list_element,
                value: value.iter().map(|c| apply_extent(c, extent)).collect(),
            }
        }
        SubmodelElement::AnnotatedRelationshipElement { common, first, second, annotations } => {
            SubmodelElement::AnnotatedRelationshipElement {
                common,
                first,
                second,
                annotations: annotations.iter().map(|c| apply_extent(c, extent)).collect(),
            }
        }
        SubmodelElement::Entity { common, entity_type, global_asset_id, specific_asset_ids, statements } => {
            SubmodelElement::Entity {
                common,
                entity_type,
                global_asset_id,
                specific_asset_ids,
                statements: statements.iter().map(|c| apply_extent(c, extent)).collect(),
            }
        }
        SubmodelElement::Operation { common, input_variables, output_variables, inoutput_variables } => {
            SubmodelElement::Operation {
                common,
                input_variables: input_variables.iter().map(|c| apply_extent(c, extent)).collect(),
                output_variables: output_variables.iter().map(|c| apply_extent(c, extent)).collect(),
                inoutput_variables: inoutput_variables.iter().map(|c| apply_extent(c, extent)).collect(),
            }
        }
        other => other,
    }
}

// ── $value ──────────────────────────────────────────────────────────────

fn elements_to_value(elements: &[SubmodelElement]) -> Value {
    let mut obj = Map::new();
    for el in elements {
        obj.insert(el.id_short().to_string(), element_value(el));
    }
    Value::Object(obj)
}

fn element_value(el: &SubmodelElement) -> Value {
    match el {
        SubmodelElement::Property { value, .. } => value.clone().map_or(Value::Null, Value::String),
        SubmodelElement::MultiLanguageProperty { value, .. } => lang_strings_to_value(value),
        SubmodelElement::Range { min, max, .. } => json!({ "min": min, "max": max }),
        SubmodelElement::Blob { content_type, value, .. } => {
            json!({ "contentType": content_type, "value": value })
        }
        SubmodelElement::File { content_type, value, .. } => {
            json!({ "contentType": content_type, "value": value })
        }
        SubmodelElement::ReferenceElement { value, .. } => {
            value.as_ref().map_or(Value::Null, reference_to_value)
        }
        SubmodelElement::RelationshipElement { first, second, .. } => {
            json!({ "first": reference_to_value(first), "second": reference_to_value(second) })
        }
        SubmodelElement::AnnotatedRelationshipElement { first, second, annotations, .. } => {
            json!({
                "first": reference_to_value(first),
                "second": reference_to_value(second),
                "annotations": elements_to_value(annotations),
            })
        }
        SubmodelElement::SubmodelElementCollection { value, .. } => elements_to_value(value),
        SubmodelElement::SubmodelElementList { value, .. } => {
            Value::Array(value.iter().map(element_value).collect())
        }
        SubmodelElement::Entity { entity_type, global_asset_id, specific_asset_ids, statements, .. } => {
            json!({
                "entityType": entity_type_str(*entity_type),
                "globalAssetId": global_asset_id,
                "specificAssetIds": specific_asset_ids.iter().map(|s| json!({
                    "name": s.name, "value": s.value,
                })).collect::<Vec<_>>(),
                "statements": elements_to_value(statements),
            })
        }
        SubmodelElement::BasicEventElement { observed, direction, state, .. } => {
            json!({
                "observed": reference_to_value(observed),
                "direction": event_direction_str(*direction),
                "state": state_of_event_str(*state),
            })
        }
        SubmodelElement::Operation { input_variables, output_variables, inoutput_variables, .. } => {
            json!({
                "inputVariables": elements_to_value(input_variables),
                "outputVariables": elements_to_value(output_variables),
                "inoutputVariables": elements_to_value(inoutput_variables),
            })
        }
        SubmodelElement::Capability { .. } => Value::Null,
    }
}

fn lang_strings_to_value(langs: &[LangString]) -> Value {
    let mut obj = Map::new();
    for l in langs {
        obj.insert(l.language.clone(), Value::String(l.text.clone()));
    }
    Value::Object(obj)
}

fn reference_to_value(r: &Reference) -> Value {
    serde_json::to_value(r).unwrap_or(Value::Null)
}

fn entity_type_str(t: EntityType) -> &'static str {
    match t {
        EntityType::CoManagedEntity => "CoManagedEntity",
        EntityType::SelfManagedEntity => "SelfManagedEntity",
    }
}

fn event_direction_str(d: EventDirection) -> &'static str {
    match d {
        EventDirection::Input => "input",
        EventDirection::Output => "output",
    }
}

fn state_of_event_str(s: StateOfEvent) -> &'static str {
    match s {
        StateOfEvent::On => "on",
        StateOfEvent::Off => "off",
    }
}

// ── $metadata ───────────────────────────────────────────────────────────

fn elements_to_metadata(elements: &[SubmodelElement]) -> Value {
    Value::Array(elements.iter().map(element_metadata).collect())
}

fn element_metadata(el: &SubmodelElement) -> Value {
    let common = el.common();
    let mut obj = Map::new();
    obj.insert("modelType".to_string(), Value::String(el.model_type().to_string()));
    obj.insert("idShort".to_string(), Value::String(common.id_short.clone()));
    if let Some(desc) = &common.description {
        obj.insert("description".to_string(), lang_strings_to_value(desc));
    }
    if let Some(sem) = &common.semantic_id {
        obj.insert("semanticId".to_string(), reference_to_value(sem));
    }
    match el {
        SubmodelElement::Property { value_type, .. } | SubmodelElement::Range { value_type, .. } => {
            obj.insert("valueType".to_string(), Value::String(value_type_str(*value_type).to_string()));
        }
        SubmodelElement::Blob { content_type, .. } | SubmodelElement::File { content_type, .. } => {
            obj.insert("contentType".to_string(), Value::String(content_type.clone()));
        }
        SubmodelElement::SubmodelElementCollection { value, .. } => {
            obj.insert("value".to_string(), elements_to_metadata(value));
        }
        SubmodelElement::SubmodelElementList { value, .. } => {
            obj.insert("value".to_string(), elements_to_metadata(value));
        }
        SubmodelElement::AnnotatedRelationshipElement { annotations, .. } => {
            obj.insert("annotations".to_string(), elements_to_metadata(annotations));
        }
        SubmodelElement::Entity { statements, .. } => {
            obj.insert("statements".to_string(), elements_to_metadata(statements));
        }
        SubmodelElement::Operation { input_variables, output_variables, inoutput_variables, .. } => {
            obj.insert("inputVariables".to_string(), elements_to_metadata(input_variables));
            obj.insert("outputVariables".to_string(), elements_to_metadata(output_variables));
            obj.insert("inoutputVariables".to_string(), elements_to_metadata(inoutput_variables));
        }
        _ => {}
    }
    Value::Object(obj)
}

fn value_type_str(vt: ValueType) -> &'static str {
    match vt {
        ValueType::XsString => "xs:string",
        ValueType::XsBoolean => "xs:boolean",
        ValueType::XsInt => "xs:int",
        ValueType::XsInteger => "xs:integer",
        ValueType::XsLong => "xs:long",
        ValueType::XsDouble => "xs:double",
        ValueType::XsFloat => "xs:float",
        ValueType::XsDateTime => "xs:dateTime",
        ValueType::XsDate => "xs:date",
        ValueType::XsAnyUri => "xs:anyURI",
    }
}

// ── $path ───────────────────────────────────────────────────────────────

fn collect_paths(elements: &[SubmodelElement], prefix: &str, out: &mut Vec<String>) {
    for el in elements {
        let path = if prefix.is_empty() {
            el.id_short().to_string()
        } else {
            format!("{prefix}.{}", el.id_short())
        };
        out.push(path.clone());
        if let SubmodelElement::SubmodelElementList { value, .. } = el {
            for (i, child) in value.iter().enumerate() {
                let indexed = format!("{path}[{i}]");
                out.push(indexed.clone());
                for (label, group) in child.nested_groups() {
                    let group_path = match label {
                        Some(segment) => format!("{indexed}.{segment}"),
                        None => indexed.clone(),
                    };
                    collect_paths(group, &group_path, out);
                }
            }
            continue;
        }
        for (label, group) in el.nested_groups() {
            let group_path = match label {
                Some(segment) => format!("{path}.{segment}"),
                None => path.clone(),
            };
            collect_paths(group, &group_path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titan_core::element::ElementCommon;
    use titan_core::submodel::ModelingKind;

    fn prop(name: &str, value: &str) -> SubmodelElement {
        SubmodelElement::Property {
            common: ElementCommon::new(name),
            value_type: ValueType::XsString,
            value: Some(value.to_string()),
        }
    }

    fn blob(name: &str) -> SubmodelElement {
        SubmodelElement::Blob {
            common: ElementCommon::new(name),
            content_type: "image/png".to_string(),
            value: Some("YmFzZTY0".to_string()),
        }
    }

    fn submodel(elements: Vec<SubmodelElement>) -> Submodel {
        Submodel {
            id: "urn:ex:sm:1".to_string(),
            id_short: "SM".to_string(),
            description: None,
            kind: ModelingKind::Instance,
            semantic_id: None,
            submodel_elements: elements,
        }
    }

    #[test]
    fn default_modifiers_are_deep_and_without_blob_value() {
        let m = Modifiers::default();
        assert_eq!(m.level, Level::Deep);
        assert_eq!(m.extent, Extent::WithoutBlobValue);
        assert!(m.terminal.is_none());
    }

    #[test]
    fn parse_rejects_unknown_modifier_name() {
        let err = Modifiers::parse(&[("bogus", "x")], None).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn parse_rejects_unknown_level_value() {
        assert!(Modifiers::parse(&[("level", "shallow")], None).is_err());
    }

    #[test]
    fn parse_rejects_unknown_path_suffix() {
        assert!(Modifiers::parse(&[], Some("bogus")).is_err());
    }

    #[test]
    fn parse_accepts_known_modifiers() {
        let m = Modifiers::parse(&[("level", "core"), ("extent", "withBlobValue")], Some("value")).unwrap();
        assert_eq!(m.level, Level::Core);
        assert_eq!(m.extent, Extent::WithBlobValue);
        assert_eq!(m.terminal, Some(Terminal::Value));
    }

    #[test]
    fn validate_for_kind_rejects_terminal_on_shell() {
        let m = Modifiers { terminal: Some(Terminal::Value), ..Modifiers::default() };
        assert!(validate_for_kind(EntityKind::Shell, &m).is_err());
    }

    #[test]
    fn validate_for_kind_allows_level_extent_on_shell() {
        let m = Modifiers::default();
        assert!(validate_for_kind(EntityKind::Shell, &m).is_ok());
    }

    #[test]
    fn level_core_drops_nested_collection_children() {
        let coll = SubmodelElement::SubmodelElementCollection {
            common: ElementCommon::new("Coll"),
            value: vec![prop("Inner", "v")],
        };
        let sm = submodel(vec![coll]);
        let result = project(&sm, &Modifiers { level: Level::Core, ..Modifiers::default() });
        match result {
            Projected::Full(out) => {
                assert_eq!(out.submodel_elements[0].children().len(), 0);
            }
            _ => panic!("expected Full"),
        }
    }

    #[test]
    fn level_deep_keeps_nested_children() {
        let coll = SubmodelElement::SubmodelElementCollection {
            common: ElementCommon::new("Coll"),
            value: vec![prop("Inner", "v")],
        };
        let sm = submodel(vec![coll]);
        let result = project(&sm, &Modifiers::default());
        match result {
            Projected::Full(out) => assert_eq!(out.submodel_elements[0].children().len(), 1),
            _ => panic!("expected Full"),
        }
    }

    #[test]
    fn extent_without_blob_value_strips_bytes_but_keeps_content_type() {
        let sm = submodel(vec![blob("Image")]);
        let result = project(&sm, &Modifiers::default());
        match result {
            Projected::Full(out) => match &out.submodel_elements[0] {
                SubmodelElement::Blob { value, content_type, .. } => {
                    assert!(value.is_none());
                    assert_eq!(content_type, "image/png");
                }
                _ => panic!("expected Blob"),
            },
            _ => panic!("expected Full"),
        }
    }

    #[test]
    fn extent_with_blob_value_keeps_bytes() {
        let sm = submodel(vec![blob("Image")]);
        let result = project(&sm, &Modifiers { extent: Extent::WithBlobValue, ..Modifiers::default() });
        match result {
            Projected::Full(out) => match &out.submodel_elements[0] {
                SubmodelElement::Blob { value, .. } => assert!(value.is_some()),
                _ => panic!("expected Blob"),
            },
            _ => panic!("expected Full"),
        }
    }

    #[test]
    fn extent_strips_blob_nested_inside_a_collection() {
        let coll = SubmodelElement::SubmodelElementCollection {
            common: ElementCommon::new("Coll"),
            value: vec![blob("Image")],
        };
        let sm = submodel(vec![coll]);
        let result = project(&sm, &Modifiers::default());
        match result {
            Projected::Full(out) => match &out.submodel_elements[0] {
                SubmodelElement::SubmodelElementCollection { value, .. } => match &value[0] {
                    SubmodelElement::Blob { value, .. } => assert!(value.is_none()),
                    _ => panic!("expected Blob"),
                },
                _ => panic!("expected Collection"),
            },
            _ => panic!("expected Full"),
        }
    }

    #[test]
    fn value_projection_strips_types_and_descriptions() {
        let sm = submodel(vec![prop("Temp", "21.5")]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Value), ..Modifiers::default() });
        match result {
            Projected::Value(v) => assert_eq!(v["Temp"], Value::String("21.5".to_string())),
            _ => panic!("expected Value"),
        }
    }

    #[test]
    fn value_projection_handles_collection_recursively() {
        let coll = SubmodelElement::SubmodelElementCollection {
            common: ElementCommon::new("Coll"),
            value: vec![prop("Inner", "v")],
        };
        let sm = submodel(vec![coll]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Value), ..Modifiers::default() });
        match result {
            Projected::Value(v) => assert_eq!(v["Coll"]["Inner"], Value::String("v".to_string())),
            _ => panic!("expected Value"),
        }
    }

    #[test]
    fn value_projection_handles_list_as_array() {
        let list = SubmodelElement::SubmodelElementList {
            common: ElementCommon::new("List"),
            order_relevant: true,
            type_value_list_element: None,
            value: vec![prop("Item0", "a"), prop("Item1", "b")],
        };
        let sm = submodel(vec![list]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Value), ..Modifiers::default() });
        match result {
            Projected::Value(v) => {
                assert_eq!(v["List"], serde_json::json!(["a", "b"]));
            }
            _ => panic!("expected Value"),
        }
    }

    #[test]
    fn metadata_projection_omits_values() {
        let sm = submodel(vec![prop("Temp", "21.5")]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Metadata), ..Modifiers::default() });
        match result {
            Projected::Metadata(v) => {
                let obj = v[0].as_object().unwrap();
                assert_eq!(obj["idShort"], "Temp");
                assert!(!obj.contains_key("value"));
            }
            _ => panic!("expected Metadata"),
        }
    }

    #[test]
    fn path_projection_lists_nested_collection_paths() {
        let coll = SubmodelElement::SubmodelElementCollection {
            common: ElementCommon::new("Coll"),
            value: vec![prop("Inner", "v")],
        };
        let sm = submodel(vec![coll]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Path), ..Modifiers::default() });
        match result {
            Projected::Paths(paths) => {
                assert!(paths.contains(&"Coll".to_string()));
                assert!(paths.contains(&"Coll.Inner".to_string()));
            }
            _ => panic!("expected Paths"),
        }
    }

    #[test]
    fn path_projection_uses_bracket_indices_for_list_items() {
        let list = SubmodelElement::SubmodelElementList {
            common: ElementCommon::new("List"),
            order_relevant: true,
            type_value_list_element: None,
            value: vec![prop("Item0", "a"), prop("Item1", "b")],
        };
        let sm = submodel(vec![list]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Path), ..Modifiers::default() });
        match result {
            Projected::Paths(paths) => {
                assert!(paths.contains(&"List".to_string()));
                assert!(paths.contains(&"List[0]".to_string()));
                assert!(paths.contains(&"List[1]".to_string()));
            }
            _ => panic!("expected Paths"),
        }
    }

    #[test]
    fn path_projection_disambiguates_operation_variable_lists_sharing_an_id_short() {
        let op = SubmodelElement::Operation {
            common: ElementCommon::new("Op"),
            input_variables: vec![prop("X", "in")],
            output_variables: vec![prop("X", "out")],
            inoutput_variables: vec![],
        };
        let sm = submodel(vec![op]);
        let result = project(&sm, &Modifiers { terminal: Some(Terminal::Path), ..Modifiers::default() });
        match result {
            Projected::Paths(paths) => {
                assert!(paths.contains(&"Op".to_string()));
                assert!(paths.contains(&"Op.inputVariables.X".to_string()));
                assert!(paths.contains(&"Op.outputVariables.X".to_string()));
                assert_ne!(
                    paths.iter().filter(|p| p.ends_with(".X")).count(),
                    1,
                    "input and output variables sharing an idShort must not collapse to one path"
                );
            }
            _ => panic!("expected Paths"),
        }
    }

    #[test]
    fn order_is_level_then_extent_then_terminal() {
        // level=core on a collection containing a Blob should drop the
        // Blob entirely (level runs first), not merely strip its bytes.
        let coll = SubmodelElement::SubmodelElementCollection {
            common: ElementCommon::new("Coll"),
            value: vec![blob("Image")],
        };
        let sm = submodel(vec![coll]);
        let result = project(
            &sm,
            &Modifiers { level: Level::Core, extent: Extent::WithBlobValue, terminal: None },
        );
        match result {
            Projected::Full(out) => assert_eq!(out.submodel_elements[0].children().len(), 0),
            _ => panic!("expected Full"),
        }
    }
}
