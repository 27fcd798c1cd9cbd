//! Error types for the Atelier script sandbox.

use thiserror::Error;

/// Errors that can occur while running a sandboxed script.
///
/// The SSRF denial in [`crate::net`] is deliberately *not* here — it is a
/// policy outcome ([`crate::GetOutcome::Denied`]), not a failure. Nothing in
/// this subsystem retries: every variant surfaces to the caller immediately.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script was rejected at compile time (syntax error or disallowed
    /// construct). The engine's diagnostic is passed through verbatim so the
    /// script author can fix their input.
    #[error("script compilation failed: {message}")]
    Compilation {
        /// The compiler's diagnostic message.
        message: String,
    },

    /// The script raised during execution. Includes script-level stack
    /// context when the engine provides it.
    #[error("script execution failed: {message}")]
    Runtime {
        /// The script-level error message and stack.
        message: String,
    },

    /// A banned code pattern was detected before execution. Compile-class
    /// rejection: the script never reaches the engine.
    #[error("banned pattern detected: `{pattern}` — the sandbox has no filesystem, module, or reflection access; use the `host` namespace to reach host data")]
    BannedPattern {
        /// The pattern that was matched.
        pattern: String,
    },

    /// A hostname in an outbound request failed to resolve.
    #[error("could not resolve host '{host}'")]
    Resolution {
        /// The hostname that failed to resolve.
        host: String,
        /// The underlying resolver error.
        #[source]
        source: std::io::Error,
    },

    /// An outbound request URL could not be parsed or has no host.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    /// Binding serialization across the op boundary failed.
    #[error("binding serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Infrastructure failure (isolate thread, runtime construction).
    #[error("sandbox execution failed: {0}")]
    Execution(#[from] anyhow::Error),
}

impl ScriptError {
    /// Whether this error is a static rejection of the script text, as
    /// opposed to a failure while it ran.
    pub fn is_compilation(&self) -> bool {
        matches!(
            self,
            Self::Compilation { .. } | Self::BannedPattern { .. }
        )
    }
}
