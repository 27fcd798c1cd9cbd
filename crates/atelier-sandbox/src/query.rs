//! Sanitized list-query wrappers over the host record store.
//!
//! Two tiers: [`safe_get_list`] keeps the caller's permission context and
//! only sanitizes the requested fields; [`safe_get_all`] is strictly more
//! permissive — the sandbox surface as a whole is the trust boundary, so it
//! bypasses per-call permission checks and defaults to the unbounded result
//! set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::sanitize_fields;
use crate::RecordStore;

/// A list-query request: doctype-independent part.
///
/// `filters` and everything in `options` (ordering, paging, grouping) pass
/// through to the store untouched; only `fields` is altered, and only by
/// [`sanitize_fields`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Filter structure, interpreted by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,

    /// Requested field expressions. Empty means the store's default columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Skip the caller's permission context. Never deserialized: a script
    /// cannot set this through query JSON, only [`safe_get_all`] flips it.
    #[serde(skip)]
    pub ignore_permissions: bool,

    /// Page size. `None` asks for the store's default, `Some(0)` for the
    /// unbounded result set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_page_length: Option<u64>,

    /// Passthrough query options (ordering, paging offsets, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// List records with the requested fields sanitized.
///
/// Honors the caller's own permission context; everything other than the
/// field list reaches the store unchanged.
pub async fn safe_get_list(
    store: &dyn RecordStore,
    doctype: &str,
    mut query: ListQuery,
) -> Result<Vec<Value>, atelier_error::HostError> {
    if !query.fields.is_empty() {
        query.fields = sanitize_fields(&query.fields);
    }
    // The typed flag is the only permission channel; a copy smuggled into
    // the passthrough options must not reach the store.
    query.options.remove("ignore_permissions");
    tracing::debug!(
        doctype = %doctype,
        fields = query.fields.len(),
        ignore_permissions = query.ignore_permissions,
        "list query dispatched"
    );
    store.get_list(doctype, query).await
}

/// List records with permission checks off and, unless the caller supplied
/// an explicit page size, the unbounded result set.
///
/// Strictly more permissive than [`safe_get_list`]; exposed to scripts as
/// `host.getAll` on the grounds that reaching the sandbox surface at all is
/// the trust decision.
pub async fn safe_get_all(
    store: &dyn RecordStore,
    doctype: &str,
    mut query: ListQuery,
) -> Result<Vec<Value>, atelier_error::HostError> {
    query.ignore_permissions = true;
    if query.limit_page_length.is_none() {
        query.limit_page_length = Some(0);
    }
    safe_get_list(store, doctype, query).await
}
