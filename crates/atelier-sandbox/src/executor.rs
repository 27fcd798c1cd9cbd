//! Script executor — creates a fresh V8 isolate per run and executes
//! untrusted scripts against the capability surface.
//!
//! Each execution gets a brand new runtime, so concurrent runs share no
//! namespace state and need no locking. V8 isolates are `!Send`, so all
//! JsRuntime operations run on a dedicated thread with its own
//! single-threaded tokio runtime; the public API is fully async and
//! `Send`-safe.
//!
//! No timeout, heap limit, or retry exists here: resource limiting is the
//! caller's responsibility, and every failure surfaces immediately.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ScriptError;
use crate::ops::{atelier_ext, ExportedBindings};
use crate::surface::build_bootstrap;
use crate::validator::validate_script;
use crate::{HostResolver, HttpGateway, RecordStore, SessionContext, Translator};

/// The complete set of host capabilities a sandboxed script may reach.
///
/// Everything the surface exposes is passed in here, at one visible call
/// site — no capability is looked up ambiently from inside the sandbox.
#[derive(Clone)]
pub struct HostCapabilities {
    /// The record store behind `host.count`/`exists`/`getList`/`getAll`/
    /// `getSingleValue`/`getDoc`/`getCachedDoc`.
    pub records: Arc<dyn RecordStore>,
    /// The outbound-HTTP layer behind `host.makeGetRequest`.
    pub http: Arc<dyn HttpGateway>,
    /// DNS resolution for the SSRF guard.
    pub resolver: Arc<dyn HostResolver>,
    /// The translation helper behind `host._`.
    pub translator: Arc<dyn Translator>,
    /// The session snapshot exposed as `host.session`.
    pub session: SessionContext,
}

/// Caller-supplied context for one execution.
///
/// `globals` are merged on top of the base surface and MAY shadow its
/// entries — a deliberate escape hatch for the *host*, not the script
/// author. Never merge untrusted data into this slot.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Extra global bindings, visible to the script by name.
    pub globals: Map<String, Value>,
    /// Extra local bindings, visible to the script by name and returned in
    /// the locals slot of [`ExecutionBindings`].
    pub locals: Map<String, Value>,
    /// Diagnostic label, scrubbed into the compile origin so engine
    /// diagnostics name the script.
    pub label: Option<String>,
}

/// The final binding sets after a script ran to completion.
///
/// `locals` holds the bindings the script created (plus caller-supplied
/// locals); `globals` holds the caller-supplied globals at their final
/// values. Only JSON-serializable bindings survive the isolate boundary.
#[derive(Debug, Clone)]
pub struct ExecutionBindings {
    /// Caller-supplied globals, as last seen by the script.
    pub globals: Map<String, Value>,
    /// Script-created bindings and caller-supplied locals.
    pub locals: Map<String, Value>,
}

impl ExecutionBindings {
    /// Look up a binding in the locals slot.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Look up a binding in the globals slot.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Look up a binding, locals first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }
}

/// The script executor. Creates a fresh isolate per run.
///
/// `Send + Sync` safe — all V8 operations are dispatched to a dedicated
/// thread internally.
pub struct ScriptExecutor {
    caps: HostCapabilities,
}

impl ScriptExecutor {
    /// Create an executor over the given host capabilities.
    pub fn new(caps: HostCapabilities) -> Self {
        Self { caps }
    }

    /// Run a script with no extra bindings and no label.
    pub async fn run(&self, script: &str) -> Result<ExecutionBindings, ScriptError> {
        self.run_with_context(script, ExecutionContext::default())
            .await
    }

    /// Run a script against a fresh capability surface.
    ///
    /// Compile rejections surface as [`ScriptError::Compilation`], script
    /// throws as [`ScriptError::Runtime`] — both with the engine's
    /// diagnostic message unmodified.
    pub async fn run_with_context(
        &self,
        script: &str,
        ctx: ExecutionContext,
    ) -> Result<ExecutionBindings, ScriptError> {
        tracing::info!(
            script_len = script.len(),
            label = ctx.label.as_deref().unwrap_or(""),
            "script run: starting"
        );

        validate_script(script)?;

        let caps = self.caps.clone();
        let script = script.to_string();

        // V8 isolates are !Send — run everything on a dedicated thread.
        let (tx, rx) = tokio::sync::oneshot::channel();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    if tx.send(Err(ScriptError::Execution(e.into()))).is_err() {
                        tracing::warn!("script result receiver dropped");
                    }
                    return;
                }
            };
            let result = rt.block_on(run_in_isolate(&caps, &script, ctx));
            if tx.send(result).is_err() {
                tracing::warn!("script result receiver dropped before result was sent");
            }
        });

        let result = rx
            .await
            .map_err(|_| ScriptError::Execution(anyhow::anyhow!("sandbox thread panicked")))?;

        match &result {
            Ok(_) => tracing::info!("script run: complete"),
            Err(e) => tracing::warn!(error = %e, "script run: failed"),
        }

        result
    }
}

/// Envelope written by the collection harness.
#[derive(Deserialize)]
struct CollectedEnvelope {
    bindings: Map<String, Value>,
    error: Option<ScriptFailure>,
}

/// A script-level throw, captured with its stack by the harness.
#[derive(Deserialize)]
struct ScriptFailure {
    message: String,
    stack: Option<String>,
}

/// Collection harness: exports every JSON-serializable binding the script
/// created, plus the captured error if it threw.
const COLLECT_SCRIPT: &str = r#"
(() => {
    const out = {};
    for (const key of Object.getOwnPropertyNames(globalThis)) {
        if (__baseKeys.has(key)) continue;
        if (key === "__scriptError") continue;
        const value = globalThis[key];
        if (typeof value === "function") continue;
        try {
            out[key] = JSON.parse(JSON.stringify(value));
        } catch (_) {
            continue;
        }
    }
    __exportBindings(JSON.stringify({
        bindings: out,
        error: globalThis.__scriptError || null,
    }));
})();
"#;

/// Run one script in a fresh isolate on the current thread (must be called
/// from a dedicated thread, not the caller's tokio runtime).
async fn run_in_isolate(
    caps: &HostCapabilities,
    script: &str,
    ctx: ExecutionContext,
) -> Result<ExecutionBindings, ScriptError> {
    let mut runtime = create_runtime(caps);

    let bootstrap = build_bootstrap(&caps.session)?;
    runtime
        .execute_script("[atelier:bootstrap]", bootstrap)
        .map_err(|e| ScriptError::Execution(anyhow::anyhow!("surface bootstrap failed: {e}")))?;

    if !ctx.globals.is_empty() || !ctx.locals.is_empty() {
        let inject = build_context_injection(&ctx)?;
        runtime
            .execute_script("[atelier:context]", inject)
            .map_err(|e| {
                ScriptError::Execution(anyhow::anyhow!("context injection failed: {e}"))
            })?;
    }

    // Sloppy-mode async harness: top-level `await` works, undeclared
    // assignments land on globalThis where the collector finds them, and a
    // throw is captured with its stack instead of unwinding into the engine.
    let wrapped = format!(
        r#"
        (async () => {{
            try {{
{script}
            }} catch (e) {{
                globalThis.__scriptError = {{
                    message: (e && e.message) ? String(e.message) : String(e),
                    stack: (e && e.stack) ? String(e.stack) : null,
                }};
            }}
        }})();
        "#
    );

    // Runtime throws are captured by the harness above, so a failure here is
    // the engine rejecting the script text.
    let origin = intern_origin(script_origin(ctx.label.as_deref()));
    runtime
        .execute_script(origin, wrapped)
        .map_err(|e| ScriptError::Compilation {
            message: e.to_string(),
        })?;

    runtime
        .run_event_loop(PollEventLoopOptions::default())
        .await
        .map_err(|e| ScriptError::Runtime {
            message: e.to_string(),
        })?;

    runtime
        .execute_script("[atelier:collect]", COLLECT_SCRIPT)
        .map_err(|e| ScriptError::Execution(anyhow::anyhow!("binding collection failed: {e}")))?;

    let exported = {
        let state = runtime.op_state();
        let state = state.borrow();
        state
            .try_borrow::<ExportedBindings>()
            .map(|b| b.0.clone())
            .ok_or_else(|| {
                ScriptError::Execution(anyhow::anyhow!("no bindings exported from execution"))
            })?
    };

    let envelope: CollectedEnvelope = serde_json::from_str(&exported)?;

    if let Some(failure) = envelope.error {
        // The JS stack text starts with the message, so prefer it when the
        // engine provided one.
        return Err(ScriptError::Runtime {
            message: failure.stack.unwrap_or(failure.message),
        });
    }

    let mut globals = ctx.globals;
    let mut locals = ctx.locals;
    for (key, value) in envelope.bindings {
        if globals.contains_key(&key) {
            globals.insert(key, value);
        } else {
            locals.insert(key, value);
        }
    }

    Ok(ExecutionBindings { globals, locals })
}

/// Create a fresh JsRuntime with the atelier extension loaded and the
/// capability handles placed in OpState.
fn create_runtime(caps: &HostCapabilities) -> JsRuntime {
    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![atelier_ext::init_ops_and_esm()],
        ..Default::default()
    });

    {
        let op_state = runtime.op_state();
        let mut state = op_state.borrow_mut();
        state.put(caps.records.clone());
        state.put(caps.http.clone());
        state.put(caps.resolver.clone());
        state.put(caps.translator.clone());
    }

    runtime
}

/// Build the script that copies caller-supplied bindings onto globalThis.
///
/// The JSON text rides inside a JS string literal (double-encoded), so no
/// caller value can break out into script position.
fn build_context_injection(ctx: &ExecutionContext) -> Result<String, ScriptError> {
    let mut merged = ctx.globals.clone();
    merged.extend(ctx.locals.clone());

    let json = serde_json::to_string(&Value::Object(merged))?;
    let literal = serde_json::to_string(&json)?;

    Ok(format!(
        r#"
        ((bindings) => {{
            for (const [key, value] of Object.entries(bindings)) {{
                globalThis[key] = value;
            }}
        }})(JSON.parse({literal}));
        "#
    ))
}

/// Reduce a caller-supplied label to a safe identifier form: lowercased,
/// spaces and hyphens become underscores, everything else non-alphanumeric
/// is dropped.
fn scrub_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Compile origin for a script, carrying the scrubbed label so engine
/// diagnostics name the script that failed.
fn script_origin(label: Option<&str>) -> String {
    match label.map(scrub_label) {
        Some(scrubbed) if !scrubbed.is_empty() => format!("[atelier:script: {scrubbed}]"),
        _ => "[atelier:script]".to_string(),
    }
}

/// Intern a compile origin so it satisfies V8's `'static` origin
/// requirement. Labels come from the host, not from scripts, and are few,
/// so the leaked set stays bounded.
fn intern_origin(origin: String) -> &'static str {
    static ORIGINS: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    let mut set = ORIGINS
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = set.get(origin.as_str()) {
        return existing;
    }
    let leaked: &'static str = Box::leak(origin.into_boxed_str());
    set.insert(leaked);
    leaked
}
