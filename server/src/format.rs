//! Output Templates
//!
//! Renders received JSON webhook bodies through the operator's
//! `OUTPUT_FORMAT` template before they are logged.
//!
//! Supported actions:
//! - `{{ .a.b.0 }}` looks up a path (object keys, array indices)
//! - `{{ join .path "sep" }}` joins an array
//! - `{{ formatDatetime .path }}` swaps spaces for `T` in a string
//!
//! Everything outside `{{ }}` is copied verbatim.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Rendered in place of a path that does not resolve.
pub const NO_VALUE: &str = "<no value>";

static PATH_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\.[^\s]*)$").expect("valid regex"));
static JOIN_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^join\s+(\.[^\s]*)\s+"((?:[^"\\]|\\.)*)"$"#).expect("valid regex")
});
static DATETIME_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^formatDatetime\s+(\.[^\s]*)$").expect("valid regex"));

/// Template parse and render failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// A `{{` without its closing `}}`.
    #[error("unterminated action at byte {0}")]
    Unterminated(usize),

    /// An action that is not one of the supported forms.
    #[error("unsupported action: {0}")]
    UnknownAction(String),

    /// `join` applied to something other than an array.
    #[error("join: {0} is not an array")]
    NotAnArray(String),

    /// `formatDatetime` applied to something other than a string.
    #[error("formatDatetime: {0} is not a string")]
    NotAString(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Path),
    Join(Path, String),
    FormatDatetime(Path),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    raw: String,
    keys: Vec<String>,
}

impl Path {
    fn parse(raw: &str) -> Self {
        let keys = raw
            .trim_start_matches('.')
            .split('.')
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw: raw.to_string(),
            keys,
        }
    }

    fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.keys.iter().try_fold(root, |node, key| match node {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

/// A parsed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    segments: Vec<Segment>,
}

impl Formatter {
    /// Parse a template. Errors here are startup errors.
    pub fn parse(template: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or(FormatError::Unterminated(offset + open))?;
            segments.push(parse_action(after_open[..close].trim())?);

            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Render `value` through the template.
    pub fn render(&self, value: &Value) -> Result<String, FormatError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Value(path) => match path.resolve(value) {
                    Some(v) => out.push_str(&display(v)),
                    None => out.push_str(NO_VALUE),
                },
                Segment::Join(path, sep) => match path.resolve(value) {
                    Some(Value::Array(items)) => {
                        let parts: Vec<String> = items.iter().map(display).collect();
                        out.push_str(&parts.join(sep));
                    }
                    _ => return Err(FormatError::NotAnArray(path.raw.clone())),
                },
                Segment::FormatDatetime(path) => match path.resolve(value) {
                    Some(Value::String(s)) => out.push_str(&s.replace(' ', "T")),
                    _ => return Err(FormatError::NotAString(path.raw.clone())),
                },
            }
        }
        Ok(out)
    }
}

fn parse_action(action: &str) -> Result<Segment, FormatError> {
    if let Some(caps) = PATH_ACTION.captures(action) {
        return Ok(Segment::Value(Path::parse(&caps[1])));
    }
    if let Some(caps) = JOIN_ACTION.captures(action) {
        let sep = caps[2].replace("\\\"", "\"").replace("\\\\", "\\");
        return Ok(Segment::Join(Path::parse(&caps[1]), sep));
    }
    if let Some(caps) = DATETIME_ACTION.captures(action) {
        return Ok(Segment::FormatDatetime(Path::parse(&caps[1])));
    }
    Err(FormatError::UnknownAction(action.to_string()))
}

/// Strings render raw, scalars via display, containers as compact JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => NO_VALUE.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn render(template: &str, value: &Value) -> String {
        Formatter::parse(template).unwrap().render(value).unwrap()
    }

    #[test]
    fn literal_text_is_copied() {
        assert_eq!(render("plain text\n", &json!({})), "plain text\n");
    }

    #[test]
    fn path_lookup() {
        let v = json!({"a": {"b": "deep", "n": 3, "ok": true}, "list": [10, 20]});
        assert_eq!(render("{{ .a.b }}", &v), "deep");
        assert_eq!(render("{{.a.n}}/{{ .a.ok }}", &v), "3/true");
        assert_eq!(render("{{ .list.1 }}", &v), "20");
        assert_eq!(render("{{ .list }}", &v), "[10,20]");
    }

    #[test]
    fn missing_value() {
        let v = json!({"a": 1});
        assert_eq!(render("x={{ .b.c }}", &v), "x=<no value>");
        assert_eq!(render("{{ .a.b }}", &v), "<no value>");
    }

    #[test]
    fn join_and_datetime() {
        let v = json!({"tags": ["a", "b", 3], "at": "2021-08-03 10:00:00"});
        assert_eq!(render(r#"{{ join .tags ", " }}"#, &v), "a, b, 3");
        assert_eq!(render("{{ formatDatetime .at }}", &v), "2021-08-03T10:00:00");
    }

    #[test]
    fn render_type_errors() {
        let v = json!({"s": "x", "n": 1});
        let join = Formatter::parse(r#"{{ join .s "," }}"#).unwrap();
        assert_eq!(join.render(&v), Err(FormatError::NotAnArray(".s".into())));
        let dt = Formatter::parse("{{ formatDatetime .n }}").unwrap();
        assert_eq!(dt.render(&v), Err(FormatError::NotAString(".n".into())));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            Formatter::parse("ok {{ .unterminated"),
            Err(FormatError::Unterminated(3))
        );
        assert!(matches!(
            Formatter::parse("{{ printf .a }}"),
            Err(FormatError::UnknownAction(_))
        ));
    }
}
