// SPDX-License-Identifier: MIT OR Apache-2.0
//! Store (C3) — the one component every read and write ultimately goes
//! through.
//!
//! Each row keeps two representations in lockstep behind a single lock:
//! the typed [`titan_canon::ParsedDoc`] (for filtering and projection
//! without a re-parse) and the [`titan_core::StoredRecord`] (canonical
//! bytes + etag, what a fast-path `GET` streams verbatim). `put`/`delete`
//! update both atomically; nothing ever derives one from the other on a
//! read.
//!
//! This is an in-memory reference implementation of the C3 contract —
//! `Arc<RwLock<_>>` guarding plain collections, the same concurrency
//! primitive the daemon this crate is descended from uses for its receipt
//! map. A production deployment would swap the body of this module for a
//! real database client without touching the `Store` API surface.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use titan_canon::ParsedDoc;
use titan_core::{EntityKind, StoredRecord};
use titan_error::TitanError;
use tokio::sync::RwLock;

/// Write mode for [`Store::put`], mirroring the `If-Match`/`If-None-Match`
/// semantics at the HTTP boundary (spec §8 boundary cases).
#[derive(Debug, Clone)]
pub enum PutMode {
    /// `If-None-Match: *` — succeed only if no row exists for this id.
    Create,
    /// A `PUT` to an existing (or possibly existing) id.
    Update {
        /// `If-Match` value to compare against the current row's etag.
        /// `None` means an unconditional overwrite.
        if_match: Option<String>,
    },
}

/// A predicate evaluated against the structured representation of a row
/// while listing, without re-parsing its canonical bytes.
pub type ListPredicate<'a> = dyn Fn(&ParsedDoc) -> bool + Send + Sync + 'a;

/// One page of a cursor-paginated [`Store::list`] call.
#[derive(Debug, Clone)]
pub struct Page {
    /// Rows on this page, in `(updated_at, id)` order.
    pub items: Vec<StoredRecord>,
    /// Opaque cursor for the next page, or `None` if this was the last one.
    pub next_cursor: Option<String>,
}

struct Row {
    parsed: ParsedDoc,
    record: StoredRecord,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<(EntityKind, String), Row>,
    /// `(kind, updated_at, id) -> ()`, ordered for cursor pagination.
    order: BTreeMap<(EntityKind, DateTime<Utc>, String), ()>,
    /// `globalAssetId -> shell ids` — backs [`Store::lookup_shells_by_asset_id`].
    shells_by_asset_id: HashMap<String, BTreeSet<String>>,
}

/// The Store component (C3): `get`/`get_parsed`/`put`/`delete`/`list`, plus
/// the `lookup_shells_by_asset_id` discovery index.
///
/// A concrete struct, not a trait — nothing in this codebase needs a second
/// implementation behind `dyn Store`, and native async fns here avoid
/// pulling in `async-trait` for a single call site.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<Inner>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Fast-path read: canonical bytes + etag only, no parsing.
    pub async fn get(&self, kind: EntityKind, id: &str) -> Option<StoredRecord> {
        let inner = self.inner.read().await;
        inner.rows.get(&(kind, id.to_string())).map(|r| r.record.clone())
    }

    /// Slow-path read: the already-structured document alongside its row.
    pub async fn get_parsed(&self, kind: EntityKind, id: &str) -> Option<(ParsedDoc, StoredRecord)> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(&(kind, id.to_string()))
            .map(|r| (r.parsed.clone(), r.record.clone()))
    }

    /// Insert or overwrite a row, applying `mode`'s precondition.
    ///
    /// # Errors
    ///
    /// - [`TitanError::conflict`] — `PutMode::Create` and the id already exists.
    /// - [`TitanError::not_found`] — `PutMode::Update` with an `if_match` and
    ///   no row exists for this id.
    /// - [`TitanError::precondition_failed`] — the supplied `if_match` does
    ///   not equal the current row's etag.
    pub async fn put(
        &self,
        doc: ParsedDoc,
        doc_bytes: Vec<u8>,
        mode: PutMode,
    ) -> Result<StoredRecord, TitanError> {
        let kind = doc.kind();
        let id = doc.id().to_string();
        let id_token = titan_idcodec::encode(&id)?;
        let mut inner = self.inner.write().await;
        let key = (kind, id.clone());
        let existing_etag = inner.rows.get(&key).map(|r| r.record.etag.clone());

        match &mode {
            PutMode::Create => {
                if existing_etag.is_some() {
                    return Err(TitanError::conflict(format!(
                        "{kind} with id '{id}' already exists"
                    )));
                }
            }
            PutMode::Update { if_match } => match (&existing_etag, if_match) {
                (None, Some(_)) => {
                    return Err(TitanError::not_found(format!(
                        "{kind} with id '{id}' not found"
                    )));
                }
                (Some(current), Some(expected)) if current != expected => {
                    return Err(TitanError::precondition_failed(format!(
                        "etag mismatch on {kind} '{id}': expected {expected}, current {current}"
                    )));
                }
                _ => {}
            },
        }

        let now = Utc::now();
        let created_at = inner
            .rows
            .get(&key)
            .map_or(now, |r| r.record.created_at);
        let previous_updated_at = inner.rows.get(&key).map(|r| r.record.updated_at);
        let updated_at = match previous_updated_at {
            Some(prev) if prev >= now => prev + chrono::Duration::nanoseconds(1),
            _ => now,
        };

        let record = StoredRecord::new(id.clone(), id_token, doc_bytes, kind, created_at, updated_at);

        if let Some(prev) = previous_updated_at {
            inner.order.remove(&(kind, prev, id.clone()));
        }
        inner.order.insert((kind, updated_at, id.clone()), ());

        if let ParsedDoc::Shell(shell) = &doc {
            reindex_shell_asset_id(&mut inner, &id, shell.asset_information.global_asset_id.as_deref());
        }

        inner.rows.insert(
            key,
            Row {
                parsed: doc,
                record: record.clone(),
            },
        );

        Ok(record)
    }

    /// Remove a row, applying an optional `If-Match` precondition.
    ///
    /// # Errors
    ///
    /// - [`TitanError::not_found`] — no row exists for this id.
    /// - [`TitanError::precondition_failed`] — `if_match` does not equal the
    ///   current row's etag.
    pub async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        if_match: Option<&str>,
    ) -> Result<(), TitanError> {
        let mut inner = self.inner.write().await;
        let key = (kind, id.to_string());
        let Some(row) = inner.rows.get(&key) else {
            return Err(TitanError::not_found(format!(
                "{kind} with id '{id}' not found"
            )));
        };
        if let Some(expected) = if_match {
            if row.record.etag != expected {
                return Err(TitanError::precondition_failed(format!(
                    "etag mismatch on {kind} '{id}': expected {expected}, current {}",
                    row.record.etag
                )));
            }
        }
        let updated_at = row.record.updated_at;
        if let ParsedDoc::Shell(_) = &row.parsed {
            reindex_shell_asset_id(&mut inner, id, None);
        }
        inner.order.remove(&(kind, updated_at, id.to_string()));
        inner.rows.remove(&key);
        Ok(())
    }

    /// List rows of one kind in `(updated_at, id)` order, optionally
    /// filtered by a predicate over the structured representation
    /// (spec §4.3 cursor pagination).
    ///
    /// # Errors
    ///
    /// Returns [`TitanError::validation`] if `cursor` is not a token this
    /// store produced.
    pub async fn list(
        &self,
        kind: EntityKind,
        cursor: Option<&str>,
        limit: usize,
        predicate: Option<&ListPredicate<'_>>,
    ) -> Result<Page, TitanError> {
        let after = cursor.map(decode_cursor).transpose()?;
        let inner = self.inner.read().await;

        let lower = match &after {
            Some((ts, id)) => Bound::Excluded((kind, *ts, id.clone())),
            None => Bound::Included((kind, DateTime::<Utc>::MIN_UTC, String::new())),
        };

        let mut items = Vec::new();
        let mut last_key: Option<(DateTime<Utc>, String)> = None;
        let mut has_more = false;

        for ((k, ts, id), ()) in inner.order.range((lower, Bound::Unbounded)) {
            if *k != kind {
                break;
            }
            let Some(row) = inner.rows.get(&(kind, id.clone())) else {
                continue;
            };
            if let Some(pred) = predicate {
                if !pred(&row.parsed) {
                    continue;
                }
            }
            if items.len() == limit {
                has_more = true;
                break;
            }
            items.push(row.record.clone());
            last_key = Some((*ts, id.clone()));
        }

        let next_cursor = if has_more {
            last_key.map(|(ts, id)| encode_cursor(ts, &id))
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    /// Discovery index (spec §4.3): Shell ids whose `globalAssetId`
    /// matches `asset_id`.
    pub async fn lookup_shells_by_asset_id(&self, asset_id: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .shells_by_asset_id
            .get(asset_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn reindex_shell_asset_id(inner: &mut Inner, shell_id: &str, new_asset_id: Option<&str>) {
    inner.shells_by_asset_id.retain(|_, ids| {
        ids.remove(shell_id);
        !ids.is_empty()
    });
    if let Some(asset_id) = new_asset_id {
        inner
            .shells_by_asset_id
            .entry(asset_id.to_string())
            .or_default()
            .insert(shell_id.to_string());
    }
}

fn encode_cursor(updated_at: DateTime<Utc>, id: &str) -> String {
    let raw = format!("{}|{id}", updated_at.to_rfc3339());
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

fn decode_cursor(token: &str) -> Result<(DateTime<Utc>, String), TitanError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| TitanError::validation(format!("invalid cursor: {e}")))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| TitanError::validation("cursor did not decode to UTF-8"))?;
    let (ts, id) = raw
        .split_once('|')
        .ok_or_else(|| TitanError::validation("cursor is missing its separator"))?;
    let updated_at = DateTime::parse_from_rfc3339(ts)
        .map_err(|e| TitanError::validation(format!("invalid cursor timestamp: {e}")))?
        .with_timezone(&Utc);
    Ok((updated_at, id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use titan_canon::{ValidationLimits, parse_and_validate};

    fn shell_json(id: &str, id_short: &str, asset_id: &str) -> Vec<u8> {
        serde_json::json!({
            "id": id,
            "idShort": id_short,
            "assetInformation": {"assetKind": "Instance", "globalAssetId": asset_id},
            "submodels": []
        })
        .to_string()
        .into_bytes()
    }

    async fn parsed_shell(id: &str, id_short: &str, asset_id: &str) -> (ParsedDoc, Vec<u8>) {
        let raw = shell_json(id, id_short, asset_id);
        let (doc, bytes, _etag) =
            parse_and_validate(&raw, EntityKind::Shell, &ValidationLimits::default()).unwrap();
        (doc, bytes)
    }

    #[tokio::test]
    async fn create_then_fast_read_returns_same_bytes() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        let record = store.put(doc, bytes.clone(), PutMode::Create).await.unwrap();
        let fetched = store.get(EntityKind::Shell, "urn:ex:aas:1").await.unwrap();
        assert_eq!(fetched.doc_bytes, bytes);
        assert_eq!(fetched.etag, record.etag);
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        store.put(doc, bytes, PutMode::Create).await.unwrap();
        let (doc2, bytes2) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        let err = store.put(doc2, bytes2, PutMode::Create).await.unwrap_err();
        assert_eq!(err.code, titan_error::ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn update_with_stale_if_match_is_rejected() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        store.put(doc, bytes, PutMode::Create).await.unwrap();
        let (doc2, bytes2) = parsed_shell("urn:ex:aas:1", "A2", "urn:ex:asset:1").await;
        let err = store
            .put(
                doc2,
                bytes2,
                PutMode::Update {
                    if_match: Some("stale".into()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, titan_error::ErrorCode::PreconditionFailed);
    }

    #[tokio::test]
    async fn update_with_matching_if_match_succeeds_and_bumps_etag() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        let first = store.put(doc, bytes, PutMode::Create).await.unwrap();
        let (doc2, bytes2) = parsed_shell("urn:ex:aas:1", "A2", "urn:ex:asset:1").await;
        let second = store
            .put(
                doc2,
                bytes2,
                PutMode::Update {
                    if_match: Some(first.etag.clone()),
                },
            )
            .await
            .unwrap();
        assert_ne!(first.etag, second.etag);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn update_on_missing_id_with_if_match_is_not_found() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        let err = store
            .put(
                doc,
                bytes,
                PutMode::Update {
                    if_match: Some("whatever".into()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, titan_error::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let store = Store::new();
        let err = store
            .delete(EntityKind::Shell, "urn:ex:aas:1", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, titan_error::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_with_matching_if_match_removes_the_row() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        let record = store.put(doc, bytes, PutMode::Create).await.unwrap();
        store
            .delete(EntityKind::Shell, "urn:ex:aas:1", Some(&record.etag))
            .await
            .unwrap();
        assert!(store.get(EntityKind::Shell, "urn:ex:aas:1").await.is_none());
    }

    #[tokio::test]
    async fn list_paginates_in_updated_at_order() {
        let store = Store::new();
        for i in 0..5 {
            let (doc, bytes) = parsed_shell(&format!("urn:ex:aas:{i}"), "A", "urn:ex:asset:1").await;
            store.put(doc, bytes, PutMode::Create).await.unwrap();
        }
        let page1 = store.list(EntityKind::Shell, None, 2, None).await.unwrap();
        assert_eq!(page1.items.len(), 2);
        assert!(page1.next_cursor.is_some());

        let page2 = store
            .list(EntityKind::Shell, page1.next_cursor.as_deref(), 2, None)
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 2);
        assert!(page2.next_cursor.is_some());

        let page3 = store
            .list(EntityKind::Shell, page2.next_cursor.as_deref(), 2, None)
            .await
            .unwrap();
        assert_eq!(page3.items.len(), 1);
        assert!(page3.next_cursor.is_none());

        let mut seen: Vec<String> = page1
            .items
            .iter()
            .chain(page2.items.iter())
            .chain(page3.items.iter())
            .map(|r| r.id.clone())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn list_applies_predicate_without_reparsing() {
        let store = Store::new();
        let (doc_a, bytes_a) = parsed_shell("urn:ex:aas:1", "Keep", "urn:ex:asset:1").await;
        let (doc_b, bytes_b) = parsed_shell("urn:ex:aas:2", "Skip", "urn:ex:asset:2").await;
        store.put(doc_a, bytes_a, PutMode::Create).await.unwrap();
        store.put(doc_b, bytes_b, PutMode::Create).await.unwrap();

        let predicate: &ListPredicate = &|doc: &ParsedDoc| match doc {
            ParsedDoc::Shell(s) => s.id_short == "Keep",
            _ => false,
        };
        let page = store
            .list(EntityKind::Shell, None, 10, Some(predicate))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "urn:ex:aas:1");
    }

    #[tokio::test]
    async fn lookup_shells_by_asset_id_finds_matches_and_tracks_updates() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        store.put(doc, bytes, PutMode::Create).await.unwrap();

        let found = store.lookup_shells_by_asset_id("urn:ex:asset:1").await;
        assert_eq!(found, vec!["urn:ex:aas:1".to_string()]);

        let (doc2, bytes2) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:2").await;
        store
            .put(doc2, bytes2, PutMode::Update { if_match: None })
            .await
            .unwrap();

        assert!(store.lookup_shells_by_asset_id("urn:ex:asset:1").await.is_empty());
        assert_eq!(
            store.lookup_shells_by_asset_id("urn:ex:asset:2").await,
            vec!["urn:ex:aas:1".to_string()]
        );
    }

    #[tokio::test]
    async fn get_parsed_returns_structured_document() {
        let store = Store::new();
        let (doc, bytes) = parsed_shell("urn:ex:aas:1", "A1", "urn:ex:asset:1").await;
        store.put(doc, bytes, PutMode::Create).await.unwrap();
        let (parsed, record) = store.get_parsed(EntityKind::Shell, "urn:ex:aas:1").await.unwrap();
        match parsed {
            ParsedDoc::Shell(s) => assert_eq!(s.id_short, "A1"),
            other => panic!("expected Shell, got {other:?}"),
        }
        assert_eq!(record.id, "urn:ex:aas:1");
    }

    #[tokio::test]
    async fn decode_cursor_rejects_garbage() {
        let store = Store::new();
        let err = store
            .list(EntityKind::Shell, Some("not-a-real-cursor!!"), 10, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, titan_error::ErrorCode::ValidationError);
    }
}
