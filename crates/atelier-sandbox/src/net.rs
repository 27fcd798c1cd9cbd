//! SSRF-guarded outbound GET.
//!
//! Sandboxed scripts run inside the host's own network perimeter. Without a
//! guard, a script could pivot through the host to reach internal-only
//! services. Before any network I/O, the target hostname is resolved and
//! the resulting address is checked against the reserved ranges — each
//! range independently, never as a concatenated prefix match.

use std::net::IpAddr;

use serde_json::Value;
use url::Url;

use crate::error::ScriptError;
use crate::{HostResolver, HttpGateway};

/// Outcome of a guarded outbound GET.
#[derive(Debug)]
pub enum GetOutcome {
    /// The request was forwarded and this is the gateway's response.
    Response(Value),
    /// The target resolved to an internal address (or used a non-HTTP
    /// scheme); no network I/O was performed. A policy decision, not a
    /// transient failure — do not retry.
    Denied,
}

/// Whether `ip` lies in a range that outbound requests must never reach.
///
/// IPv4: loopback (127.0.0.0/8), the three RFC1918 private ranges,
/// link-local (169.254.0.0/16 — the cloud metadata endpoint lives here),
/// CGN (100.64.0.0/10), and the null range (0.0.0.0/8, which reaches
/// loopback on Linux) — each checked on its own. IPv6: loopback,
/// link-local, unique-local, unspecified; IPv4-mapped addresses are
/// classified by their embedded IPv4 address.
pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_loopback()                          // 127.0.0.0/8
                || o[0] == 10                         // 10.0.0.0/8
                || (o[0] == 172 && (16..=31).contains(&o[1])) // 172.16.0.0/12
                || (o[0] == 192 && o[1] == 168)       // 192.168.0.0/16
                || (o[0] == 169 && o[1] == 254)       // 169.254.0.0/16 link-local
                || (o[0] == 100 && (64..=127).contains(&o[1])) // 100.64.0.0/10 CGN
                || o[0] == 0                          // 0.0.0.0/8
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal_ip(IpAddr::V4(mapped));
            }
            v6.is_loopback()                          // ::1
                || v6.is_unspecified()                // ::
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10 link-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7 unique-local
        }
    }
}

/// Issue a GET request through `gateway` if the target is safe to reach.
///
/// Steps: parse `url`, extract the host, resolve it through `resolver`
/// (literal IP hosts skip DNS; a resolution failure propagates as
/// [`ScriptError::Resolution`], never silently swallowed), classify the
/// address with [`is_internal_ip`]. An internal target returns
/// [`GetOutcome::Denied`] with zero network I/O; otherwise the request is
/// forwarded to the gateway unmodified and its response or error is
/// returned as-is.
///
/// Only `http` and `https` schemes are forwarded; anything else is denied.
/// No timeout is imposed here — callers needing one pass it via `options`.
pub async fn safe_get_request(
    gateway: &dyn HttpGateway,
    resolver: &dyn HostResolver,
    url: &str,
    options: Value,
) -> Result<GetOutcome, ScriptError> {
    let parsed = Url::parse(url).map_err(|e| ScriptError::InvalidUrl(e.to_string()))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        tracing::warn!(url = %url, scheme = %scheme, "outbound request denied: non-http scheme");
        return Ok(GetOutcome::Denied);
    }

    let host = parsed
        .host()
        .ok_or_else(|| ScriptError::InvalidUrl(format!("no host in url '{url}'")))?;

    let ip = match host {
        url::Host::Ipv4(v4) => IpAddr::V4(v4),
        url::Host::Ipv6(v6) => IpAddr::V6(v6),
        url::Host::Domain(name) => {
            resolver
                .resolve(name)
                .map_err(|source| ScriptError::Resolution {
                    host: name.to_string(),
                    source,
                })?
        }
    };

    if is_internal_ip(ip) {
        tracing::warn!(url = %url, ip = %ip, "outbound request denied: internal address");
        return Ok(GetOutcome::Denied);
    }

    tracing::debug!(url = %url, ip = %ip, "outbound request forwarded");
    let response = gateway
        .get(url, options)
        .await
        .map_err(|e| ScriptError::Execution(e.into()))?;

    Ok(GetOutcome::Response(response))
}
