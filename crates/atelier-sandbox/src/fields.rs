//! Query field sanitation.
//!
//! Field expressions in list queries are plain column names in the common
//! case, but the query executor also accepts computed expressions — which
//! makes them an injection vector: `COUNT(password)` or
//! `(select api_key from tokens)` smuggle function calls into a query the
//! script was only trusted to filter. The check here is deliberately
//! syntactic: anything call-shaped is dropped, no attempt is made to
//! distinguish safe from unsafe calls.

/// Remove every field expression containing a parenthesis.
///
/// An empty or fully-filtered input yields an empty vector and no error;
/// the downstream query then falls back to the executor's default column
/// set. Idempotent.
pub fn sanitize_fields(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .filter(|f| !f.contains('('))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn passes_plain_column_names() {
        assert_eq!(sanitize_fields(&s(&["name", "title"])), s(&["name", "title"]));
    }

    #[test]
    fn strips_call_shaped_expressions() {
        assert_eq!(sanitize_fields(&s(&["name", "COUNT(id)"])), s(&["name"]));
        assert_eq!(
            sanitize_fields(&s(&["(select api_key from tokens)", "title"])),
            s(&["title"])
        );
    }

    #[test]
    fn rejects_on_open_paren_alone() {
        // A lone `(` is already enough — partial sanitation is not attempted.
        assert_eq!(sanitize_fields(&s(&["na(me"])), Vec::<String>::new());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(sanitize_fields(&[]), Vec::<String>::new());
    }

    #[test]
    fn idempotent() {
        let input = s(&["name", "COUNT(id)", "title", "f()"]);
        let once = sanitize_fields(&input);
        let twice = sanitize_fields(&once);
        assert_eq!(once, twice);
        assert_eq!(once, s(&["name", "title"]));
    }
}
