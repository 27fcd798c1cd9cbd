//! Capability surface construction.
//!
//! [`build_bootstrap`] produces the script evaluated in every fresh runtime
//! before user code. It is the single place where the sandbox's allow-list
//! is spelled out: the frozen `host` namespace over the registered ops, the
//! session snapshot, and the lockdown that removes the engine namespace and
//! code-generation primitives. Anything not assembled here is unreachable
//! from script.
//!
//! The surface is built per invocation and never cached — a shared mutable
//! surface would let one script's additions leak into another's run.

use crate::error::ScriptError;
use crate::SessionContext;

/// Build the bootstrap script for one execution.
///
/// The resulting namespace contains exactly:
/// - `host` (frozen): `count`, `exists`, `getAll`, `getList`,
///   `getSingleValue`, `getDoc`, `getCachedDoc`, `makeGetRequest`, the
///   `_` translation helper, `asJson`, and a frozen read-only `session`
///   snapshot;
/// - the engine's own safe builtins (`JSON`, `Object`, `Array`, ...),
///   with `eval`, the `Function` constructor chain, and the `Deno`
///   namespace removed;
/// - the harness-internal `__exportBindings` hook and `__baseKeys` set the
///   executor uses to collect script-created bindings.
pub fn build_bootstrap(session: &SessionContext) -> Result<String, ScriptError> {
    let session_json = serde_json::to_string(session)?;

    Ok(format!(
        r#"
        ((ops) => {{
            const countOp = ops.op_atelier_count;
            const existsOp = ops.op_atelier_exists;
            const getListOp = ops.op_atelier_get_list;
            const getAllOp = ops.op_atelier_get_all;
            const getSingleValueOp = ops.op_atelier_get_single_value;
            const getDocOp = ops.op_atelier_get_doc;
            const getCachedDocOp = ops.op_atelier_get_cached_doc;
            const makeGetRequestOp = ops.op_atelier_make_get_request;
            const translateOp = ops.op_atelier_translate;
            const exportOp = ops.op_atelier_export_bindings;

            globalThis.host = Object.freeze({{
                count: async (doctype, filters) =>
                    JSON.parse(await countOp(doctype, JSON.stringify(filters || {{}}))),
                exists: async (doctype, name) =>
                    JSON.parse(await existsOp(doctype, name)),
                getList: async (doctype, query) =>
                    JSON.parse(await getListOp(doctype, JSON.stringify(query || {{}}))),
                getAll: async (doctype, query) =>
                    JSON.parse(await getAllOp(doctype, JSON.stringify(query || {{}}))),
                getSingleValue: async (doctype, field) =>
                    JSON.parse(await getSingleValueOp(doctype, field)),
                getDoc: async (doctype, name) =>
                    JSON.parse(await getDocOp(doctype, name)),
                getCachedDoc: async (doctype, name) =>
                    JSON.parse(await getCachedDocOp(doctype, name)),
                makeGetRequest: async (url, options) =>
                    JSON.parse(await makeGetRequestOp(url, JSON.stringify(options || {{}}))),
                _: (message) => translateOp(String(message)),
                asJson: (value) => JSON.stringify(value, null, 2),
                session: Object.freeze({session_json}),
            }});

            // Harness hooks: locked down so a script cannot detach them.
            Object.defineProperty(globalThis, "__exportBindings", {{
                value: exportOp, writable: false, configurable: false
            }});

            delete globalThis.Deno;

            // The validator only sees script text; every function on the
            // surface still links back to Function through its prototype
            // chain (host._.constructor and friends), so the constructors
            // themselves have to go.
            delete globalThis.eval;
            const AsyncFunction = (async function(){{}}).constructor;
            const GeneratorFunction = (function*(){{}}).constructor;
            Object.defineProperty(Function.prototype, 'constructor', {{
                value: undefined, configurable: false, writable: false
            }});
            Object.defineProperty(AsyncFunction.prototype, 'constructor', {{
                value: undefined, configurable: false, writable: false
            }});
            Object.defineProperty(GeneratorFunction.prototype, 'constructor', {{
                value: undefined, configurable: false, writable: false
            }});

            // Everything present after lockdown is base surface, not script
            // output; the executor collects only names outside this set.
            const baseKeys = new Set(Object.getOwnPropertyNames(globalThis));
            baseKeys.add("__baseKeys");
            Object.defineProperty(globalThis, "__baseKeys", {{
                value: baseKeys, writable: false, configurable: false
            }});
        }})(Deno.core.ops);
        "#
    ))
}
