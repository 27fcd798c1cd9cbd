//! Pre-execution script validator.
//!
//! This validator is **defense-in-depth** — the isolate lockdown in
//! [`crate::surface`] is the real security boundary. Catching the common
//! escape patterns before any V8 work gives better error messages and
//! keeps obviously hostile scripts out of the engine entirely.

use crate::error::ScriptError;

/// Patterns that are banned from sandboxed scripts.
///
/// The bootstrap already deletes `eval`, neuters the `Function` constructor
/// chain, and removes the engine namespace; these checks reject the same
/// attempts statically.
const BANNED_PATTERNS: &[&str] = &[
    "eval(",
    "Function(",
    "import(",                 // Dynamic imports
    "require(",                // CommonJS
    "Deno.",                   // Engine namespace escape
    "__proto__",               // Prototype pollution
    "constructor[",            // Prototype chain access via bracket notation
    "constructor.constructor", // Function constructor bypass
    "Reflect.",                // Reflect API escape
    "globalThis[",             // Dynamic global access
    "String.fromCharCode",     // String-based code construction
];

/// Validate a script before it is handed to the engine.
///
/// A hit is a compile-class rejection: the script never runs.
pub fn validate_script(script: &str) -> Result<(), ScriptError> {
    for pattern in BANNED_PATTERNS {
        if script.contains(pattern) {
            return Err(ScriptError::BannedPattern {
                pattern: (*pattern).to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_assignment() {
        assert!(validate_script("result = 1 + 1").is_ok());
    }

    #[test]
    fn accepts_host_namespace_calls() {
        let script = r#"pages = await host.getList('Page', { fields: ['name'] });"#;
        assert!(validate_script(script).is_ok());
    }

    #[test]
    fn rejects_eval() {
        let err = validate_script(r#"result = eval("1+1")"#).unwrap_err();
        assert!(matches!(err, ScriptError::BannedPattern { .. }));
        assert!(err.is_compilation());
    }

    #[test]
    fn rejects_dynamic_import() {
        let err = validate_script(r#"m = await import("fs")"#).unwrap_err();
        assert!(matches!(err, ScriptError::BannedPattern { .. }));
    }

    #[test]
    fn rejects_engine_namespace() {
        let err = validate_script(r#"Deno.core.ops.op_atelier_get_doc("User", "x")"#).unwrap_err();
        assert!(matches!(err, ScriptError::BannedPattern { .. }));
    }

    #[test]
    fn rejects_proto_pollution() {
        let err = validate_script(r#"({}).__proto__.polluted = true"#).unwrap_err();
        assert!(matches!(err, ScriptError::BannedPattern { .. }));
    }

    #[test]
    fn rejects_constructor_constructor() {
        let err =
            validate_script(r#"x = "".constructor.constructor("return this")()"#).unwrap_err();
        assert!(matches!(err, ScriptError::BannedPattern { .. }));
    }

    #[test]
    fn rejects_globalthis_bracket_access() {
        let err = validate_script(r#"x = globalThis["ev" + "al"]"#).unwrap_err();
        assert!(matches!(err, ScriptError::BannedPattern { .. }));
    }

    #[test]
    fn accepts_legitimate_constructor_property() {
        // Accessing .constructor.name (not .constructor[ or
        // .constructor.constructor) is fine.
        assert!(validate_script("kind = value.constructor.name").is_ok());
    }

    #[test]
    fn accepts_empty_script() {
        // An empty script is a harmless no-op, not an error.
        assert!(validate_script("").is_ok());
    }
}
