//! Message template handling.

/// Turn literal `\n` escape sequences from configuration into real newlines.
///
/// Environment files cannot hold multi-line values, so templates are written
/// on one line with `\n` where breaks belong.
pub fn unescape_template(raw: &str) -> String {
    raw.replace("\\n", "\n")
}
