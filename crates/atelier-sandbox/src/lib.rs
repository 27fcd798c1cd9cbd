#![warn(missing_docs)]

//! # atelier-sandbox
//!
//! Executes short, untrusted, user-authored scripts in a deno_core isolate
//! against a deliberately narrow, allow-listed set of host capabilities:
//! record lookup, sanitized list queries, and SSRF-guarded outbound GET
//! requests. Everything not on the surface is unreachable by design.
//!
//! ## Security model
//!
//! - **V8 isolate**: the script never shares an address space object graph
//!   with the host; only JSON crosses the op boundary
//! - **Explicit capability surface**: every exposed name is assembled at one
//!   call site in [`surface`], backed by traits supplied at construction
//! - **Fresh runtime per call**: no state leakage between executions
//! - **Plain snapshots**: `getDoc`/`getCachedDoc` return serialized record
//!   data, never live handles into the store
//! - **Query field sanitation**: call-shaped field expressions are stripped
//!   before they reach the query executor
//! - **SSRF guard**: outbound GETs to loopback or RFC1918 addresses are
//!   denied before any network I/O
//!
//! Resource limiting (CPU, memory, wall clock) is deliberately out of scope;
//! the caller owns it.

pub mod error;
pub mod executor;
pub mod fields;
pub mod net;
pub mod ops;
pub mod query;
pub mod surface;
pub mod validator;

use std::net::{IpAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};

pub use error::ScriptError;
pub use executor::{ExecutionBindings, ExecutionContext, HostCapabilities, ScriptExecutor};
pub use fields::sanitize_fields;
pub use net::{safe_get_request, GetOutcome};
pub use query::{safe_get_all, safe_get_list, ListQuery};

/// Trait for the host's document/record store, consumed through a narrow
/// read-only interface.
///
/// Implementations own permission checking (honoring
/// [`ListQuery::ignore_permissions`]), filter evaluation, and cache
/// staleness semantics for [`get_cached_doc`](RecordStore::get_cached_doc).
///
/// `get_doc` and `get_cached_doc` must return plain serializable snapshots
/// of the record. The sandbox relies on this: a live handle combined with
/// script-level attribute access could reach unvetted methods.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Count records of `doctype` matching `filters`.
    async fn count(
        &self,
        doctype: &str,
        filters: serde_json::Value,
    ) -> Result<u64, atelier_error::HostError>;

    /// Whether a record named `name` exists for `doctype`.
    async fn exists(&self, doctype: &str, name: &str)
        -> Result<bool, atelier_error::HostError>;

    /// List records of `doctype` according to `query`.
    ///
    /// The sandbox only calls this through [`query::safe_get_list`], so the
    /// field list has already been sanitized.
    async fn get_list(
        &self,
        doctype: &str,
        query: ListQuery,
    ) -> Result<Vec<serde_json::Value>, atelier_error::HostError>;

    /// Fetch a single field value from the singleton record of `doctype`.
    async fn get_single_value(
        &self,
        doctype: &str,
        field: &str,
    ) -> Result<serde_json::Value, atelier_error::HostError>;

    /// Fetch a record as a plain JSON snapshot.
    async fn get_doc(
        &self,
        doctype: &str,
        name: &str,
    ) -> Result<serde_json::Value, atelier_error::HostError>;

    /// Cache-backed variant of [`get_doc`](RecordStore::get_doc).
    async fn get_cached_doc(
        &self,
        doctype: &str,
        name: &str,
    ) -> Result<serde_json::Value, atelier_error::HostError>;
}

/// Trait for the host's outbound-HTTP layer.
///
/// The sandbox only calls this after the SSRF guard in [`net`] has cleared
/// the target address. Timeouts and cancellation are the implementation's
/// concern; pass them through `options`.
#[async_trait::async_trait]
pub trait HttpGateway: Send + Sync {
    /// Issue a GET request and return the response body as JSON.
    async fn get(
        &self,
        url: &str,
        options: serde_json::Value,
    ) -> Result<serde_json::Value, atelier_error::HostError>;
}

/// Trait for hostname-to-IP resolution, split out so the SSRF guard can be
/// tested without touching real DNS.
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to a single IP address.
    fn resolve(&self, host: &str) -> std::io::Result<IpAddr>;
}

/// Default resolver backed by the system resolver via
/// [`std::net::ToSocketAddrs`]. Resolution blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> std::io::Result<IpAddr> {
        // Port 0 satisfies the ToSocketAddrs contract; only the IP is used.
        let mut addrs = (host, 0).to_socket_addrs()?;
        addrs.next().map(|a| a.ip()).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses found for '{host}'"),
            )
        })
    }
}

/// Trait for the host's message translation helper, exposed to scripts as
/// `host._(message)`.
pub trait Translator: Send + Sync {
    /// Translate `message` into the session's language.
    fn translate(&self, message: &str) -> String;
}

/// Passthrough translator for hosts without a translation catalogue.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, message: &str) -> String {
        message.to_string()
    }
}

/// Read-only view of the current session, exposed to scripts as a frozen
/// `host.session` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    /// The logged-in user, `Guest` when unauthenticated.
    pub user: String,
    /// Opaque session identifier, if any.
    pub sid: Option<String>,
    /// Host-defined user classification (e.g. `System User`, `Website User`).
    pub user_type: Option<String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            user: "Guest".to_string(),
            sid: None,
            user_type: None,
        }
    }
}
