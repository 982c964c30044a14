//! Minimal SQL templater with identifier escaping.
//!
//! Placeholders are written `{{name}}`. Identifiers bound through
//! [`SqlTemplate::ident`] / [`SqlTemplate::idents`] are double-quoted with
//! embedded quotes doubled; fragments bound through [`SqlTemplate::trusted`]
//! are inserted as written.

use std::collections::BTreeMap;

use datafusion_common::{DataFusionError, Result};

pub fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quote each part of a dotted reference, e.g. `a.b.c` -> `"a"."b"."c"`.
pub fn quote_path<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Strip whitespace and trailing statement terminators from user SQL so it
/// can be nested as a subquery.
pub fn trim_query(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

#[derive(Debug, Clone)]
pub struct SqlTemplate<'a> {
    template: &'a str,
    bindings: BTreeMap<&'a str, String>,
}

impl<'a> SqlTemplate<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            bindings: BTreeMap::new(),
        }
    }

    pub fn ident(mut self, name: &'a str, value: &str) -> Self {
        self.bindings.insert(name, quote_ident(value));
        self
    }

    /// Comma-separated list of quoted identifiers.
    pub fn idents<S: AsRef<str>>(mut self, name: &'a str, values: &[S]) -> Self {
        let rendered = values
            .iter()
            .map(|value| quote_ident(value.as_ref()))
            .collect::<Vec<_>>()
            .join(", ");
        self.bindings.insert(name, rendered);
        self
    }

    pub fn trusted(mut self, name: &'a str, sql: impl Into<String>) -> Self {
        self.bindings.insert(name, sql.into());
        self
    }

    pub fn render(&self) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(DataFusionError::Internal(format!(
                    "Unterminated placeholder in SQL template: {}",
                    self.template
                )));
            };
            let name = after[..end].trim();
            let value = self.bindings.get(name).ok_or_else(|| {
                DataFusionError::Internal(format!("No binding for SQL template placeholder {name}"))
            })?;
            out.push_str(value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("score"), "\"score\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_render() {
        let sql = SqlTemplate::new("SELECT {{cols}} FROM {{table}} WHERE {{ filter }}")
            .idents("cols", &["a", "B"])
            .trusted("table", quote_path(["p", "d", "t"]))
            .trusted("filter", "a > 1")
            .render()
            .unwrap();
        assert_eq!(sql, "SELECT \"a\", \"B\" FROM \"p\".\"d\".\"t\" WHERE a > 1");
    }

    #[test]
    fn test_missing_binding() {
        let err = SqlTemplate::new("SELECT {{x}}").render().unwrap_err();
        assert!(err.to_string().contains("No binding"));
    }

    #[test]
    fn test_trim_query() {
        assert_eq!(trim_query("  SELECT 1;\n"), "SELECT 1");
    }
}
