// SPDX-License-Identifier: MIT OR Apache-2.0
//! Addressing into a Submodel's element tree by `idShort`-path (spec §6
//! `/submodels/{id_token}/submodel-elements/{path}`).
//!
//! A path is a dot-separated chain of `idShort` segments, each optionally
//! followed by a `[n]` index into a `SubmodelElementList`'s `value` array
//! — e.g. `Documents.Sheets[2].Title`. An element with more than one
//! nested list (only `Operation`, whose `inputVariables`/
//! `outputVariables`/`inoutputVariables` may share `idShort`s) requires
//! the list's own name as an extra segment before the child's `idShort`
//! — e.g. `Calibrate.inputVariables.Raw`.

use titan_core::element::SubmodelElement;
use titan_error::TitanError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    IdShort(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>, TitanError> {
    if path.is_empty() {
        return Err(TitanError::validation("element path must not be empty"));
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(TitanError::validation(format!(
                "element path '{path}' has an empty segment"
            )));
        }
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            let (id_short, tail) = rest.split_at(bracket);
            segments.push(Segment::IdShort(id_short.to_string()));
            rest = tail;
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else {
                    return Err(TitanError::validation(format!(
                        "element path '{path}' has an unterminated index"
                    )));
                };
                let (digits, after) = stripped.split_at(close);
                let idx: usize = digits.parse().map_err(|_| {
                    TitanError::validation(format!("element path '{path}' has a non-numeric index"))
                })?;
                segments.push(Segment::Index(idx));
                rest = &after[1..];
            }
        } else {
            segments.push(Segment::IdShort(rest.to_string()));
        }
    }
    Ok(segments)
}

fn step<'a>(children: &'a [SubmodelElement], seg: &Segment, path: &str) -> Result<&'a SubmodelElement, TitanError> {
    match seg {
        Segment::IdShort(id_short) => children
            .iter()
            .find(|e| e.id_short() == id_short)
            .ok_or_else(|| TitanError::not_found(format!("no element '{id_short}' at path '{path}'"))),
        Segment::Index(idx) => children
            .get(*idx)
            .ok_or_else(|| TitanError::not_found(format!("index {idx} out of range at path '{path}'"))),
    }
}

/// Pick which nested list of `el` the next segment(s) address, and how
/// many segments that choice consumes: `0` when `el` has a single,
/// unlabeled list (`SubmodelElementCollection`/`List`/`Entity`/
/// `AnnotatedRelationshipElement` — the next segment is already the
/// child's `idShort`), or `1` when `el` exposes several labeled lists
/// (`Operation`) and `rest`'s first segment must name one of them.
fn resolve_children<'a>(
    el: &'a SubmodelElement,
    rest: &[Segment],
    path: &str,
) -> Result<(&'a [SubmodelElement], usize), TitanError> {
    let groups = el.nested_groups();
    match groups.len() {
        0 => Err(TitanError::not_found(format!("element at path '{path}' has no children"))),
        1 if groups[0].0.is_none() => Ok((groups[0].1, 0)),
        _ => {
            let Some(Segment::IdShort(name)) = rest.first() else {
                return Err(TitanError::validation(format!(
                    "element path '{path}' must name a variable list here (inputVariables/outputVariables/inoutputVariables)"
                )));
            };
            let (_, group) = groups
                .into_iter()
                .find(|(label, _)| label.as_deref() == Some(name.as_str()))
                .ok_or_else(|| TitanError::not_found(format!("unknown variable list '{name}' at path '{path}'")))?;
            if rest.len() < 2 {
                return Err(TitanError::validation(format!(
                    "element path '{path}' must name an element within '{name}'"
                )));
            }
            Ok((group, 1))
        }
    }
}

/// Locate the element at `path` within `roots`.
///
/// # Errors
///
/// Returns [`TitanError::not_found`] if any segment does not resolve, or
/// [`TitanError::validation`] if `path` is malformed.
pub fn find<'a>(roots: &'a [SubmodelElement], path: &str) -> Result<&'a SubmodelElement, TitanError> {
    let segments = parse_path(path)?;
    let mut current = step(roots, &segments[0], path)?;
    let mut rest = &segments[1..];
    while !rest.is_empty() {
        let (children, consumed) = resolve_children(current, rest, path)?;
        current = step(children, &rest[consumed], path)?;
        rest = &rest[consumed + 1..];
    }
    Ok(current)
}

/// Replace the element at `path` within `roots` with `replacement`,
/// returning the updated tree. Used by the element-write route, which
/// recanonicalizes the owning Submodel afterward.
///
/// # Errors
///
/// Returns [`TitanError::not_found`] if `path` does not resolve.
pub fn replace(
    roots: &[SubmodelElement],
    path: &str,
    replacement: SubmodelElement,
) -> Result<Vec<SubmodelElement>, TitanError> {
    let segments = parse_path(path)?;
    replace_at(roots, &segments, path, replacement)
}

fn replace_at(
    siblings: &[SubmodelElement],
    segments: &[Segment],
    path: &str,
    replacement: SubmodelElement,
) -> Result<Vec<SubmodelElement>, TitanError> {
    let (seg, rest) = segments.split_first().expect("segments non-empty");
    let idx = find_index(siblings, seg, path)?;

    let mut out = siblings.to_vec();
    if rest.is_empty() {
        out[idx] = replacement;
    } else {
        let (children, consumed) = resolve_children(&out[idx], rest, path)?;
        let label = group_label(rest, consumed);
        let new_children = replace_at(children, &rest[consumed..], path, replacement)?;
        out[idx] = with_group(&out[idx], label, new_children);
    }
    Ok(out)
}

/// Remove the element at `path` within `roots`, returning the updated tree.
///
/// # Errors
///
/// Returns [`TitanError::not_found`] if `path` does not resolve.
pub fn remove(roots: &[SubmodelElement], path: &str) -> Result<Vec<SubmodelElement>, TitanError> {
    let segments = parse_path(path)?;
    remove_at(roots, &segments, path)
}

fn remove_at(siblings: &[SubmodelElement], segments: &[Segment], path: &str) -> Result<Vec<SubmodelElement>, TitanError> {
    let (seg, rest) = segments.split_first().expect("segments non-empty");
    let idx = find_index(siblings, seg, path)?;

    let mut out = siblings.to_vec();
    if rest.is_empty() {
        out.remove(idx);
    } else {
        let (children, consumed) = resolve_children(&out[idx], rest, path)?;
        let label = group_label(rest, consumed);
        let new_children = remove_at(children, &rest[consumed..], path)?;
        out[idx] = with_group(&out[idx], label, new_children);
    }
    Ok(out)
}

/// The label `resolve_children` picked, if it consumed a segment for one
/// (`consumed == 1` only happens for `Operation`'s labeled variable lists).
fn group_label(rest: &[Segment], consumed: usize) -> Option<&str> {
    if consumed == 0 {
        return None;
    }
    match &rest[0] {
        Segment::IdShort(name) => Some(name.as_str()),
        Segment::Index(_) => None,
    }
}

fn find_index(siblings: &[SubmodelElement], seg: &Segment, path: &str) -> Result<usize, TitanError> {
    match seg {
        Segment::IdShort(id_short) => siblings
            .iter()
            .position(|e| e.id_short() == id_short)
            .ok_or_else(|| TitanError::not_found(format!("no element '{id_short}' at path '{path}'"))),
        Segment::Index(idx) => {
            if *idx < siblings.len() {
                Ok(*idx)
            } else {
                Err(TitanError::not_found(format!("index {idx} out of range at path '{path}'")))
            }
        }
    }
}

/// Rebuild `el` with one of its nested element lists replaced, preserving
/// every other field. `label` selects which list for variants with more
/// than one (`Operation`); ignored otherwise. Variants with no nested
/// list are returned unchanged (callers only reach this once they know
/// `el` has children at this path).
fn with_group(el: &SubmodelElement, label: Option<&str>, children: Vec<SubmodelElement>) -> SubmodelElement {
    match el.clone() {
        SubmodelElement::SubmodelElementCollection { common, .. } => {
            SubmodelElement::SubmodelElementCollection { common, value: children }
        }
        SubmodelElement::SubmodelElementList { common, order_relevant, type_value_list_element, .. } => {
            SubmodelElement::SubmodelElementList {
                common,
                order_relevant,
                type_value_list_element,
                value: children,
            }
        }
        SubmodelElement::AnnotatedRelationshipElement { common, first, second, .. } => {
            SubmodelElement::AnnotatedRelationshipElement { common, first, second, annotations: children }
        }
        SubmodelElement::Entity { common, entity_type, global_asset_id, specific_asset_ids, .. } => {
            SubmodelElement::Entity { common, entity_type, global_asset_id, specific_asset_ids, statements: children }
        }
        SubmodelElement::Operation { common, input_variables, output_variables, inoutput_variables } => {
            match label {
                Some("inputVariables") => {
                    SubmodelElement::Operation { common, input_variables: children, output_variables, inoutput_variables }
                }
                Some("outputVariables") => {
                    SubmodelElement::Operation { common, input_variables, output_variables: children, inoutput_variables }
                }
                Some("inoutputVariables") => {
                    SubmodelElement::Operation { common, input_variables, output_variables, inoutput_variables: children }
                }
                _ => SubmodelElement::Operation { common, input_variables, output_variables, inoutput_variables },
            }
        }
        other => other,
    }
}
