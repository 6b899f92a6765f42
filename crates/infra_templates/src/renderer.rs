//! Placeholder parsing and substitution.
//!
//! Grammar, inside otherwise opaque text:
//!
//! - `{{ key }}` mandatory placeholder
//! - `{{ key? }}` optional placeholder, empty when the key is absent
//! - `{{ key ?fallback text }}` optional placeholder with a default
//! - `\{{` a literal `{{`
//!
//! Keys start with a letter or `_` and may contain letters, digits, `_`, `.`,
//! `:` and `-`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::context::TemplateContext;
use crate::error::{TemplateError, TemplateResult};

// Alternatives are tried left to right at each offset: an escaped `\{{`,
// a closed placeholder, then a stray `{{` with no closing `}}`.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?P<escaped>\\\{\{)|\{\{(?P<inner>.*?)\}\}|(?P<open>\{\{)").unwrap()
});
static INNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?P<key>[^?]*?)\s*(?P<optional>\?\s*(?P<default>.*?))?\s*$").unwrap()
});
static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:\-]*$").unwrap());

/// Check whether `key` is a legal placeholder key.
pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

/// How substituted values are written into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueEscape {
    /// Insert values verbatim.
    #[default]
    Verbatim,
    /// Escape values for use inside a JSON string literal.
    JsonString,
}

impl ValueEscape {
    fn apply(self, value: &str) -> String {
        match self {
            ValueEscape::Verbatim => value.to_string(),
            ValueEscape::JsonString => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted[1..quoted.len() - 1].to_string()
            }
        }
    }
}

/// A single placeholder occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub key: String,
    pub optional: bool,
    pub default: Option<String>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(Placeholder),
}

/// A template split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    name: String,
    segments: Vec<Segment>,
}

impl ParsedTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All placeholders, in document order.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Text(_) => None,
        })
    }

    /// Keys the context must provide for this template to resolve.
    pub fn required_keys(&self) -> BTreeSet<String> {
        self.placeholders()
            .filter(|p| !p.optional)
            .map(|p| p.key.clone())
            .collect()
    }
}

/// Template renderer for substituting context values into template text.
#[derive(Debug, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self
    }

    /// Split `content` into text and placeholders.
    pub fn parse(&self, name: &str, content: &str) -> TemplateResult<ParsedTemplate> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut last = 0;

        for caps in TOKEN_RE.captures_iter(content) {
            let Some(token) = caps.get(0) else { continue };
            text.push_str(&content[last..token.start()]);
            last = token.end();

            if caps.name("escaped").is_some() {
                text.push_str("{{");
                continue;
            }

            let (line, column) = position(content, token.start());
            let malformed = |reason: String| TemplateError::MalformedTemplate {
                template: name.to_string(),
                line,
                column,
                reason,
            };

            let Some(inner) = caps.name("inner") else {
                return Err(malformed("unterminated placeholder, missing '}}'".to_string()));
            };
            if inner.as_str().contains("{{") {
                return Err(malformed("'{{' inside a placeholder".to_string()));
            }

            let placeholder = parse_inner(inner.as_str(), line, column).map_err(malformed)?;
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Placeholder(placeholder));
        }

        text.push_str(&content[last..]);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(ParsedTemplate {
            name: name.to_string(),
            segments,
        })
    }

    /// Substitute context values into a parsed template.
    ///
    /// Every missing mandatory key is collected before failing, so one run
    /// reports all of them.
    pub fn render(
        &self,
        template: &ParsedTemplate,
        context: &TemplateContext,
        escape: ValueEscape,
    ) -> TemplateResult<String> {
        let mut output = String::new();
        let mut missing: Vec<String> = Vec::new();
        let mut substituted = 0usize;

        for segment in &template.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Placeholder(p) => match (context.get(&p.key), &p.default) {
                    (Some(value), _) => {
                        output.push_str(&escape.apply(value));
                        substituted += 1;
                    }
                    (None, Some(default)) => output.push_str(&escape.apply(default)),
                    (None, None) if p.optional => {}
                    (None, None) => {
                        if !missing.contains(&p.key) {
                            missing.push(p.key.clone());
                        }
                    }
                },
            }
        }

        if !missing.is_empty() {
            return Err(TemplateError::UnresolvedPlaceholder {
                template: template.name.clone(),
                keys: missing,
            });
        }

        debug!(
            "Rendered template {} ({} substitutions)",
            template.name, substituted
        );
        Ok(output)
    }

    /// Parse and render in one step.
    pub fn render_content(
        &self,
        name: &str,
        content: &str,
        context: &TemplateContext,
        escape: ValueEscape,
    ) -> TemplateResult<String> {
        let parsed = self.parse(name, content)?;
        self.render(&parsed, context, escape)
    }
}

fn parse_inner(inner: &str, line: usize, column: usize) -> Result<Placeholder, String> {
    let caps: Captures<'_> = INNER_RE
        .captures(inner)
        .ok_or_else(|| format!("invalid placeholder '{}'", inner.trim()))?;
    let key = caps.name("key").map_or("", |m| m.as_str());
    let optional = caps.name("optional").is_some();
    let default = caps
        .name("default")
        .map(|m| m.as_str())
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    if key.is_empty() && !optional {
        return Err("empty placeholder".to_string());
    }
    if !is_valid_key(key) {
        return Err(format!("invalid placeholder key '{}'", key));
    }

    Ok(Placeholder {
        key: key.to_string(),
        optional,
        default,
        line,
        column,
    })
}

/// 1-based line and column of byte offset `offset`.
fn position(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |n| n + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> TemplateContext {
        let mut c = TemplateContext::new();
        c.layer(pairs.iter().copied()).unwrap();
        c
    }

    #[test]
    fn test_render_content() {
        let renderer = TemplateRenderer::new();
        let vars = ctx(&[("name", "orders"), ("env", "prod")]);

        let rendered = renderer
            .render_content("t", "Table: {{name}}-{{ env }}", &vars, ValueEscape::Verbatim)
            .unwrap();
        assert_eq!(rendered, "Table: orders-prod");
    }

    #[test]
    fn test_optional_and_default() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render_content(
                "t",
                "a={{missing?}};b={{ tier ?standard }};c={{ present ?x }}",
                &ctx(&[("present", "y")]),
                ValueEscape::Verbatim,
            )
            .unwrap();
        assert_eq!(rendered, "a=;b=standard;c=y");
    }

    #[test]
    fn test_escaped_open_is_literal() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render_content("t", r"\{{not_a_key}} {{k}}", &ctx(&[("k", "v")]), ValueEscape::Verbatim)
            .unwrap();
        assert_eq!(rendered, "{{not_a_key}} v");
    }

    #[test]
    fn test_reports_all_missing_keys() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render_content("t.yaml", "{{a}} {{b}} {{a}} {{c?}}", &TemplateContext::new(), ValueEscape::Verbatim)
            .unwrap_err();
        match err {
            TemplateError::UnresolvedPlaceholder { template, keys } => {
                assert_eq!(template, "t.yaml");
                assert_eq!(keys, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_placeholder_position() {
        let renderer = TemplateRenderer::new();
        let err = renderer.parse("t.yaml", "name: x\nenv: {{env\n").unwrap_err();
        match err {
            TemplateError::MalformedTemplate { line, column, reason, .. } => {
                assert_eq!((line, column), (2, 6));
                assert!(reason.contains("unterminated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_keys() {
        let renderer = TemplateRenderer::new();
        for bad in ["{{}}", "{{ 1abc }}", "{{a b}}", "{{ {{a}} }}"] {
            assert!(
                matches!(renderer.parse("t", bad), Err(TemplateError::MalformedTemplate { .. })),
                "expected {bad} to be malformed"
            );
        }
    }

    #[test]
    fn test_json_escaping() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render_content(
                "t.json",
                r#"{"description": "{{d}}"}"#,
                &ctx(&[("d", "say \"hi\"\n")]),
                ValueEscape::JsonString,
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["description"], "say \"hi\"\n");
    }

    #[test]
    fn test_second_placeholder_unterminated() {
        let renderer = TemplateRenderer::new();
        let err = renderer.parse("t.json", "{{a}} and {{ b ?x").unwrap_err();
        match err {
            TemplateError::MalformedTemplate { line, column, reason, .. } => {
                assert_eq!((line, column), (1, 11));
                assert!(reason.contains("unterminated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_multiline_text_around_placeholders() {
        let renderer = TemplateRenderer::new();
        let parsed = renderer
            .parse("t.yaml", "a: {{a}}\nb: {{ b ?two words }}\nc: }} {\n")
            .unwrap();
        let placeholders: Vec<_> = parsed.placeholders().collect();
        assert_eq!(placeholders.len(), 2);
        assert_eq!((placeholders[1].line, placeholders[1].column), (2, 4));
        assert_eq!(placeholders[1].default.as_deref(), Some("two words"));

        let rendered = renderer.render(&parsed, &ctx(&[("a", "1")]), ValueEscape::Verbatim).unwrap();
        assert_eq!(rendered, "a: 1\nb: two words\nc: }} {\n");
    }

    #[test]
    fn test_key_syntax() {
        assert!(is_valid_key("_private"));
        assert!(is_valid_key("hosted:eks:grafana:key"));
        assert!(is_valid_key("a.b-c"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("-a"));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key("a\n"));
    }

    #[test]
    fn test_required_keys() {
        let renderer = TemplateRenderer::new();
        let parsed = renderer
            .parse("t", "{{hosted:eks:grafana:key}} {{env}} {{opt?}}")
            .unwrap();
        let keys: Vec<_> = parsed.required_keys().into_iter().collect();
        assert_eq!(keys, vec!["env", "hosted:eks:grafana:key"]);
    }
}
