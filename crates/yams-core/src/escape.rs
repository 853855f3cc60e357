//! Escaping of untrusted text for embedding in generated queries.
//!
//! Queries are composed as strings, so every caller-supplied value passes
//! through [`escape`] before it reaches a [`QueryBuilder`](crate::query::QueryBuilder)
//! output. Inside a string literal the store resolves the entity references
//! back to the original characters.

/// Replace `&`, `"` and `'` with their XML entity references.
///
/// `&` is replaced first so the entities produced for quotes are not
/// themselves re-escaped.
pub fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// [`escape`] lifted over an optional value; an absent value stays absent.
pub fn escape_opt(input: Option<&str>) -> Option<String> {
    input.map(escape)
}

/// Escape text placed inside a direct element or attribute constructor.
///
/// On top of [`escape`], `<` is an entity and curly braces are doubled so
/// they are not read as enclosed expressions.
pub fn escape_constructor(input: &str) -> String {
    escape(input)
        .replace('<', "&lt;")
        .replace('{', "{{")
        .replace('}', "}}")
}
