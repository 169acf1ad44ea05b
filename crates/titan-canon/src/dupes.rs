// SPDX-License-Identifier: MIT OR Apache-2.0
//! Duplicate-key detection over raw JSON text.
//!
//! `serde_json::Value`'s object map silently keeps the last occurrence of a
//! repeated key, so rejecting duplicates (spec §4.1) has to happen on the
//! raw bytes before anything is handed to serde. This is a minimal
//! recursive-descent walk of JSON syntax that tracks, per object, the set
//! of keys already seen at that nesting level.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::CanonError;

/// Walk `text` as JSON and return an error on the first duplicate key found
/// within any single object. Does not build a value; structural validity
/// beyond what's needed to track object/array boundaries is left to
/// `serde_json`'s own parse.
pub fn check_no_duplicate_keys(text: &str) -> Result<(), CanonError> {
    let mut chars = text.char_indices().peekable();
    skip_ws(&mut chars);
    parse_value(&mut chars)?;
    Ok(())
}

type Chars<'a> = Peekable<CharIndices<'a>>;

fn skip_ws(chars: &mut Chars) {
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
}

fn parse_value(chars: &mut Chars) -> Result<(), CanonError> {
    skip_ws(chars);
    match chars.peek().map(|&(_, c)| c) {
        Some('{') => parse_object(chars),
        Some('[') => parse_array(chars),
        Some('"') => parse_string(chars).map(|_| ()),
        Some(_) => {
            // number, true, false, null — consume until a structural
            // delimiter or whitespace; serde_json validates the grammar.
            while let Some(&(_, c)) = chars.peek() {
                if c == ',' || c == '}' || c == ']' || c.is_whitespace() {
                    break;
                }
                chars.next();
            }
            Ok(())
        }
        None => Err(CanonError::Malformed("unexpected end of input".into())),
    }
}

fn parse_object(chars: &mut Chars) -> Result<(), CanonError> {
    chars.next(); // consume '{'
    let mut seen: Vec<String> = Vec::new();
    skip_ws(chars);
    if let Some(&(_, '}')) = chars.peek() {
        chars.next();
        return Ok(());
    }
    loop {
        skip_ws(chars);
        let key = parse_string(chars)?;
        if seen.iter().any(|k| k == &key) {
            return Err(CanonError::DuplicateKey(key));
        }
        seen.push(key);
        skip_ws(chars);
        match chars.next() {
            Some((_, ':')) => {}
            _ => return Err(CanonError::Malformed("expected ':' after object key".into())),
        }
        parse_value(chars)?;
        skip_ws(chars);
        match chars.next() {
            Some((_, ',')) => continue,
            Some((_, '}')) => return Ok(()),
            _ => return Err(CanonError::Malformed("expected ',' or '}' in object".into())),
        }
    }
}

fn parse_array(chars: &mut Chars) -> Result<(), CanonError> {
    chars.next(); // consume '['
    skip_ws(chars);
    if let Some(&(_, ']')) = chars.peek() {
        chars.next();
        return Ok(());
    }
    loop {
        parse_value(chars)?;
        skip_ws(chars);
        match chars.next() {
            Some((_, ',')) => continue,
            Some((_, ']')) => return Ok(()),
            _ => return Err(CanonError::Malformed("expected ',' or ']' in array".into())),
        }
    }
}

fn parse_string(chars: &mut Chars) -> Result<String, CanonError> {
    match chars.next() {
        Some((_, '"')) => {}
        _ => return Err(CanonError::Malformed("expected string".into())),
    }
    let mut out = String::new();
    loop {
        match chars.next() {
            Some((_, '"')) => return Ok(out),
            Some((_, '\\')) => match chars.next() {
                Some((_, c)) => out.push(c),
                None => return Err(CanonError::Malformed("unterminated escape".into())),
            },
            Some((_, c)) => out.push(c),
            None => return Err(CanonError::Malformed("unterminated string".into())),
        }
    }
}
