//! deno_core op definitions for the Atelier sandbox.
//!
//! Every host capability a script can reach crosses this boundary, and only
//! JSON strings cross it — a script never holds a live host object. The
//! capability handles live in `OpState`, placed there by the executor at
//! runtime construction, so the full allow-list is visible in one place.
//!
//! The `#[op2]` macro generates additional public items (v8 function
//! pointers, metadata structs) that cannot carry doc comments. We suppress
//! `missing_docs` at the module level — all actual functions are documented
//! below.
#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use deno_core::op2;
use deno_core::OpState;
use deno_error::JsErrorBox;

use crate::net::{safe_get_request, GetOutcome};
use crate::query::{safe_get_all, safe_get_list, ListQuery};
use crate::{HostResolver, HttpGateway, RecordStore, Translator};

/// Bindings exported by the collection harness at the end of a run.
pub struct ExportedBindings(pub String);

fn record_store(op_state: &Rc<RefCell<OpState>>) -> Arc<dyn RecordStore> {
    op_state.borrow().borrow::<Arc<dyn RecordStore>>().clone()
}

fn parse_query(query_json: &str) -> Result<ListQuery, JsErrorBox> {
    serde_json::from_str(query_json)
        .map_err(|e| JsErrorBox::generic(format!("invalid query: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsErrorBox> {
    serde_json::to_string(value)
        .map_err(|e| JsErrorBox::generic(format!("result serialization failed: {e}")))
}

/// Count records matching a filter.
#[op2(async)]
#[string]
pub async fn op_atelier_count(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] filters_json: String,
) -> Result<String, JsErrorBox> {
    let store = record_store(&op_state);
    let filters: serde_json::Value = serde_json::from_str(&filters_json)
        .map_err(|e| JsErrorBox::generic(format!("invalid filters: {e}")))?;

    let count = store
        .count(&doctype, filters)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&count)
}

/// Whether a record exists.
#[op2(async)]
#[string]
pub async fn op_atelier_exists(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] name: String,
) -> Result<String, JsErrorBox> {
    let store = record_store(&op_state);
    let exists = store
        .exists(&doctype, &name)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&exists)
}

/// List records with sanitized fields, honoring the caller's permissions.
#[op2(async)]
#[string]
pub async fn op_atelier_get_list(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] query_json: String,
) -> Result<String, JsErrorBox> {
    tracing::debug!(doctype = %doctype, "script list query");
    let store = record_store(&op_state);
    let query = parse_query(&query_json)?;

    let rows = safe_get_list(store.as_ref(), &doctype, query)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&rows)
}

/// List records with permission checks off and an unbounded default page
/// size. See [`safe_get_all`] for why this is acceptable here.
#[op2(async)]
#[string]
pub async fn op_atelier_get_all(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] query_json: String,
) -> Result<String, JsErrorBox> {
    tracing::debug!(doctype = %doctype, "script get-all query");
    let store = record_store(&op_state);
    let query = parse_query(&query_json)?;

    let rows = safe_get_all(store.as_ref(), &doctype, query)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&rows)
}

/// Fetch a single field value from a singleton record.
#[op2(async)]
#[string]
pub async fn op_atelier_get_single_value(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] field: String,
) -> Result<String, JsErrorBox> {
    let store = record_store(&op_state);
    let value = store
        .get_single_value(&doctype, &field)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&value)
}

/// Fetch a record as a plain JSON snapshot.
#[op2(async)]
#[string]
pub async fn op_atelier_get_doc(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] name: String,
) -> Result<String, JsErrorBox> {
    let store = record_store(&op_state);
    let doc = store
        .get_doc(&doctype, &name)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&doc)
}

/// Cache-backed variant of [`op_atelier_get_doc`].
#[op2(async)]
#[string]
pub async fn op_atelier_get_cached_doc(
    op_state: Rc<RefCell<OpState>>,
    #[string] doctype: String,
    #[string] name: String,
) -> Result<String, JsErrorBox> {
    let store = record_store(&op_state);
    let doc = store
        .get_cached_doc(&doctype, &name)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    to_json(&doc)
}

/// Issue an SSRF-guarded outbound GET. Returns JSON `null` when the target
/// is denied — a policy outcome the script can inspect, not an error.
#[op2(async)]
#[string]
pub async fn op_atelier_make_get_request(
    op_state: Rc<RefCell<OpState>>,
    #[string] url: String,
    #[string] options_json: String,
) -> Result<String, JsErrorBox> {
    let (gateway, resolver) = {
        let st = op_state.borrow();
        (
            st.borrow::<Arc<dyn HttpGateway>>().clone(),
            st.borrow::<Arc<dyn HostResolver>>().clone(),
        )
    };

    let options: serde_json::Value = serde_json::from_str(&options_json)
        .map_err(|e| JsErrorBox::generic(format!("invalid options: {e}")))?;

    let outcome = safe_get_request(gateway.as_ref(), resolver.as_ref(), &url, options)
        .await
        .map_err(|e| JsErrorBox::generic(e.to_string()))?;

    match outcome {
        GetOutcome::Response(value) => to_json(&value),
        GetOutcome::Denied => Ok("null".to_string()),
    }
}

/// Translate a message through the host's translation helper.
#[op2]
#[string]
pub fn op_atelier_translate(state: &mut OpState, #[string] message: &str) -> String {
    let translator = state.borrow::<Arc<dyn Translator>>().clone();
    translator.translate(message)
}

/// Store the script's final bindings in OpState for the executor to read.
#[op2(fast)]
pub fn op_atelier_export_bindings(state: &mut OpState, #[string] json: &str) {
    state.put(ExportedBindings(json.to_string()));
}

deno_core::extension!(
    atelier_ext,
    ops = [
        op_atelier_count,
        op_atelier_exists,
        op_atelier_get_list,
        op_atelier_get_all,
        op_atelier_get_single_value,
        op_atelier_get_doc,
        op_atelier_get_cached_doc,
        op_atelier_make_get_request,
        op_atelier_translate,
        op_atelier_export_bindings
    ],
);
