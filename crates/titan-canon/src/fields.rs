// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unknown-key rejection (spec §4.1 "reject unknown keys at any object
//! level, strict").
//!
//! `#[serde(flatten)]` on [`titan_core::SubmodelElement`]'s variants rules
//! out a blanket `#[serde(deny_unknown_fields)]` derive (the two attributes
//! don't compose), so unknown fields are instead checked here by walking
//! the raw `serde_json::Value` tree against the known shape for each
//! entity/element kind, independent of the typed `Deserialize` impl used
//! to build the in-memory document.

use serde_json::{Map, Value};
use titan_core::EntityKind;

use crate::CanonError;

fn check_object_keys(map: &Map<String, Value>, allowed: &[&str], path: &str) -> Result<(), CanonError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(CanonError::UnknownKey {
                path: path.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, CanonError> {
    value.as_object().ok_or_else(|| CanonError::Malformed(format!("expected object at '{path}'")))
}

fn as_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, CanonError> {
    value.as_array().ok_or_else(|| CanonError::Malformed(format!("expected array at '{path}'")))
}

const LANG_STRING_FIELDS: &[&str] = &["language", "text"];
const KEY_FIELDS: &[&str] = &["type", "value"];
const REFERENCE_FIELDS: &[&str] = &["type", "keys"];
const SPECIFIC_ASSET_ID_FIELDS: &[&str] = &["name", "value", "externalSubjectId"];
const ENDPOINT_FIELDS: &[&str] = &["interface", "href"];
const ASSET_INFORMATION_FIELDS: &[&str] = &["assetKind", "globalAssetId"];

fn check_lang_strings(value: &Value, path: &str) -> Result<(), CanonError> {
    for (i, item) in as_array(value, path)?.iter().enumerate() {
        check_object_keys(as_object(item, path)?, LANG_STRING_FIELDS, &format!("{path}[{i}]"))?;
    }
    Ok(())
}

fn check_reference(value: &Value, path: &str) -> Result<(), CanonError> {
    let obj = as_object(value, path)?;
    check_object_keys(obj, REFERENCE_FIELDS, path)?;
    if let Some(keys) = obj.get("keys") {
        for (i, k) in as_array(keys, &format!("{path}.keys"))?.iter().enumerate() {
            check_object_keys(as_object(k, path)?, KEY_FIELDS, &format!("{path}.keys[{i}]"))?;
        }
    }
    Ok(())
}

fn check_specific_asset_ids(value: &Value, path: &str) -> Result<(), CanonError> {
    for (i, item) in as_array(value, path)?.iter().enumerate() {
        let item_path = format!("{path}[{i}]");
        let obj = as_object(item, &item_path)?;
        check_object_keys(obj, SPECIFIC_ASSET_ID_FIELDS, &item_path)?;
        if let Some(r) = obj.get("externalSubjectId") {
            check_reference(r, &format!("{item_path}.externalSubjectId"))?;
        }
    }
    Ok(())
}

fn check_endpoints(value: &Value, path: &str) -> Result<(), CanonError> {
    for (i, item) in as_array(value, path)?.iter().enumerate() {
        check_object_keys(as_object(item, path)?, ENDPOINT_FIELDS, &format!("{path}[{i}]"))?;
    }
    Ok(())
}

const ELEMENT_COMMON_FIELDS: &[&str] = &["modelType", "idShort", "description", "semanticId"];

fn element_specific_fields(model_type: &str) -> Result<&'static [&'static str], CanonError> {
    Ok(match model_type {
        "Property" => &["valueType", "value"],
        "MultiLanguageProperty" => &["value"],
        "Range" => &["valueType", "min", "max"],
        "Blob" => &["contentType", "value"],
        "File" => &["contentType", "value"],
        "ReferenceElement" => &["value"],
        "RelationshipElement" => &["first", "second"],
        "AnnotatedRelationshipElement" => &["first", "second", "annotations"],
        "SubmodelElementCollection" => &["value"],
        "SubmodelElementList" => &["orderRelevant", "typeValueListElement", "value"],
        "Entity" => &["entityType", "globalAssetId", "specificAssetIds", "statements"],
        "BasicEventElement" => &["observed", "direction", "state"],
        "Operation" => &["inputVariables", "outputVariables", "inoutputVariables"],
        "Capability" => &[],
        other => {
            return Err(CanonError::UnknownModelType(other.to_string()));
        }
    })
}

/// Recursively check a `SubmodelElement` JSON value and its descendants.
pub fn check_element(value: &Value, path: &str) -> Result<(), CanonError> {
    let obj = as_object(value, path)?;
    let model_type = obj
        .get("modelType")
        .and_then(Value::as_str)
        .ok_or_else(|| CanonError::Malformed(format!("missing modelType at '{path}'")))?;
    let specific = element_specific_fields(model_type)?;
    let mut allowed: Vec<&str> = ELEMENT_COMMON_FIELDS.to_vec();
    allowed.extend_from_slice(specific);
    check_object_keys(obj, &allowed, path)?;

    if let Some(desc) = obj.get("description") {
        check_lang_strings(desc, &format!("{path}.description"))?;
    }
    if let Some(sid) = obj.get("semanticId") {
        check_reference(sid, &format!("{path}.semanticId"))?;
    }

    match model_type {
        "MultiLanguageProperty" => {
            if let Some(v) = obj.get("value") {
                check_lang_strings(v, &format!("{path}.value"))?;
            }
        }
        "ReferenceElement" => {
            if let Some(v) = obj.get("value") {
                check_reference(v, &format!("{path}.value"))?;
            }
        }
        "RelationshipElement" | "AnnotatedRelationshipElement" => {
            if let Some(v) = obj.get("first") {
                check_reference(v, &format!("{path}.first"))?;
            }
            if let Some(v) = obj.get("second") {
                check_reference(v, &format!("{path}.second"))?;
            }
            if model_type == "AnnotatedRelationshipElement" {
                if let Some(v) = obj.get("annotations") {
                    check_elements(v, &format!("{path}.annotations"))?;
                }
            }
        }
        "SubmodelElementCollection" | "SubmodelElementList" => {
            if let Some(v) = obj.get("value") {
                check_elements(v, &format!("{path}.value"))?;
            }
        }
        "Entity" => {
            if let Some(v) = obj.get("specificAssetIds") {
                check_specific_asset_ids(v, &format!("{path}.specificAssetIds"))?;
            }
            if let Some(v) = obj.get("statements") {
                check_elements(v, &format!("{path}.statements"))?;
            }
        }
        "BasicEventElement" => {
            if let Some(v) = obj.get("observed") {
                check_reference(v, &format!("{path}.observed"))?;
            }
        }
        "Operation" => {
            for field in ["inputVariables", "outputVariables", "inoutputVariables"] {
                if let Some(v) = obj.get(field) {
                    check_elements(v, &format!("{path}.{field}"))?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_elements(value: &Value, path: &str) -> Result<(), CanonError> {
    for (i, item) in as_array(value, path)?.iter().enumerate() {
        check_element(item, &format!("{path}[{i}]"))?;
    }
    Ok(())
}

const SHELL_FIELDS: &[&str] = &["id", "idShort", "description", "assetInformation", "submodels"];
const SUBMODEL_FIELDS: &[&str] = &["id", "idShort", "description", "kind", "semanticId", "submodelElements"];
const CONCEPT_DESCRIPTION_FIELDS: &[&str] = &["id", "idShort", "description", "category"];
const SHELL_DESCRIPTOR_FIELDS: &[&str] = &["id", "idShort", "endpoints", "globalAssetId"];
const SUBMODEL_DESCRIPTOR_FIELDS: &[&str] = &["id", "idShort", "endpoints", "semanticId"];

/// Check `value`'s object keys against the known shape for `kind`, at every
/// nesting level, recursively.
pub fn check_known_fields(value: &Value, kind: EntityKind) -> Result<(), CanonError> {
    let obj = as_object(value, "$")?;
    match kind {
        EntityKind::Shell => {
            check_object_keys(obj, SHELL_FIELDS, "$")?;
            if let Some(d) = obj.get("description") {
                check_lang_strings(d, "$.description")?;
            }
            if let Some(info) = obj.get("assetInformation") {
                check_object_keys(as_object(info, "$.assetInformation")?, ASSET_INFORMATION_FIELDS, "$.assetInformation")?;
            }
            if let Some(sms) = obj.get("submodels") {
                for (i, r) in as_array(sms, "$.submodels")?.iter().enumerate() {
                    check_reference(r, &format!("$.submodels[{i}]"))?;
                }
            }
        }
        EntityKind::Submodel => {
            check_object_keys(obj, SUBMODEL_FIELDS, "$")?;
            if let Some(d) = obj.get("description") {
                check_lang_strings(d, "$.description")?;
            }
            if let Some(sid) = obj.get("semanticId") {
                check_reference(sid, "$.semanticId")?;
            }
            if let Some(els) = obj.get("submodelElements") {
                check_elements(els, "$.submodelElements")?;
            }
        }
        EntityKind::ConceptDescription => {
            check_object_keys(obj, CONCEPT_DESCRIPTION_FIELDS, "$")?;
            if let Some(d) = obj.get("description") {
                check_lang_strings(d, "$.description")?;
            }
        }
        EntityKind::ShellDescriptor => {
            check_object_keys(obj, SHELL_DESCRIPTOR_FIELDS, "$")?;
            if let Some(e) = obj.get("endpoints") {
                check_endpoints(e, "$.endpoints")?;
            }
        }
        EntityKind::SubmodelDescriptor => {
            check_object_keys(obj, SUBMODEL_DESCRIPTOR_FIELDS, "$")?;
            if let Some(e) = obj.get("endpoints") {
                check_endpoints(e, "$.endpoints")?;
            }
            if let Some(sid) = obj.get("semanticId") {
                check_reference(sid, "$.semanticId")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_shell() {
        let v = json!({
            "id": "urn:ex:aas:1",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": []
        });
        assert!(check_known_fields(&v, EntityKind::Shell).is_ok());
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let v = json!({
            "id": "urn:ex:aas:1",
            "idShort": "A1",
            "assetInformation": {"assetKind": "Instance"},
            "submodels": [],
            "extraField": 1
        });
        let err = check_known_fields(&v, EntityKind::Shell).unwrap_err();
        assert!(matches!(err, CanonError::UnknownKey { key, .. } if key == "extraField"));
    }

    #[test]
    fn rejects_unknown_key_inside_nested_element() {
        let v = json!({
            "id": "urn:ex:sm:1",
            "idShort": "SM",
            "kind": "Instance",
            "submodelElements": [
                {"modelType": "Property", "idShort": "T", "valueType": "xs:double", "value": "1", "bogus": true}
            ]
        });
        let err = check_known_fields(&v, EntityKind::Submodel).unwrap_err();
        assert!(matches!(err, CanonError::UnknownKey { key, .. } if key == "bogus"));
    }

    #[test]
    fn rejects_unknown_model_type() {
        let v = json!({
            "id": "urn:ex:sm:1",
            "idShort": "SM",
            "kind": "Instance",
            "submodelElements": [
                {"modelType": "NotARealType", "idShort": "T"}
            ]
        });
        let err = check_known_fields(&v, EntityKind::Submodel).unwrap_err();
        assert!(matches!(err, CanonError::UnknownModelType(t) if t == "NotARealType"));
    }

    #[test]
    fn accepts_nested_collection() {
        let v = json!({
            "id": "urn:ex:sm:1",
            "idShort": "SM",
            "kind": "Instance",
            "submodelElements": [
                {"modelType": "SubmodelElementCollection", "idShort": "C", "value": [
                    {"modelType": "Capability", "idShort": "Cap"}
                ]}
            ]
        });
        assert!(check_known_fields(&v, EntityKind::Submodel).is_ok());
    }
}
