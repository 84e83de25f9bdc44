//! Stateless cursor pagination over ranged finds.
//!
//! A page is fetched with one row of lookahead. When the lookahead row comes
//! back it is dropped from the page and its sort key becomes the inclusive
//! bound of the next range, which is handed to the caller as an opaque
//! continuation token: URL-safe base64 (no padding) of the JSON array
//! `[order, lower, upper]`.
//!
//! Because the next bound is inclusive, an entity sharing the pivot's sort
//! key can be returned on both sides of a page boundary, but none is ever
//! skipped.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::query::{FindQuery, Order, Range};
use crate::store::EntityStore;

/// Hard upper bound on entities per page.
pub const MAX_PAGE_SIZE: u64 = 1000;

impl Range {
    /// Encodes this range as a continuation token.
    pub fn to_token(&self) -> String {
        let triple = (self.order, self.lower.as_deref(), self.upper.as_deref());
        // A tuple of an enum and two optional strings always serializes.
        let json = serde_json::to_vec(&triple).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a continuation token produced by [`Range::to_token`].
    pub fn from_token(token: &str) -> Result<Range, StoreError> {
        let json = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|err| StoreError::InvalidPageToken(err.to_string()))?;
        let (order, lower, upper): (Order, Option<String>, Option<String>) =
            serde_json::from_slice(&json)
                .map_err(|err| StoreError::InvalidPageToken(err.to_string()))?;
        Ok(Range::new(order, lower, upper))
    }
}

/// One page request: either an explicit range or a token, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub range: Option<Range>,
    pub token: Option<String>,
    pub limit: Option<u64>,
}

impl PageRequest {
    /// The range this request walks. Defaults to unbounded descending.
    pub fn resolve_range(&self) -> Result<Range, StoreError> {
        match (&self.range, &self.token) {
            (Some(_), Some(_)) => Err(StoreError::RangeWithPageToken),
            (Some(range), None) => Ok(range.clone()),
            (None, Some(token)) => Range::from_token(token),
            (None, None) => Ok(Range::unbounded(Order::Desc)),
        }
    }

    /// Entities per page, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(&self) -> u64 {
        self.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// One page of results plus the token for the next, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entities: IndexMap<String, Value>,
    pub next: Option<String>,
}

/// The range continuing `range` from an inclusive pivot sort key.
fn continue_from(range: &Range, pivot: String) -> Range {
    match range.order {
        Order::Desc => Range::new(Order::Desc, range.lower.clone(), Some(pivot)),
        Order::Asc => Range::new(Order::Asc, Some(pivot), range.upper.clone()),
    }
}

impl EntityStore {
    /// Fetches one page of `typ`, optionally restricted to entities related
    /// to `(relation, key)`.
    ///
    /// Token and range errors are raised before the backend is touched.
    pub fn find_page(
        &mut self,
        typ: &str,
        related_to: Option<(&str, &str)>,
        request: &PageRequest,
    ) -> Result<Page, StoreError> {
        let range = request.resolve_range()?;
        let page_size = request.page_size();

        let mut query = FindQuery::of_type(typ)
            .range(range.clone())
            .limit(page_size + 1);
        if let Some((relation, key)) = related_to {
            query = query.related_to(relation, key);
        }
        let mut rows = self.find_rows(&query)?;

        let mut next = None;
        if rows.len() as u64 > page_size {
            if let Some(pivot) = rows.pop() {
                let sort_key = pivot.sort_key.ok_or_else(|| {
                    StoreError::MalformedRow(format!("ranged row {} has no sort key", pivot.id))
                })?;
                next = Some(continue_from(&range, sort_key).to_token());
            }
        }
        debug!(typ, page_size, rows = rows.len(), more = next.is_some(), "find_page");

        Ok(Page {
            entities: rows.into_iter().map(|row| (row.id, row.payload)).collect(),
            next,
        })
    }
}
