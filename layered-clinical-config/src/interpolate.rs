//! `${name}` placeholder substitution.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ConfigResult;

static VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Placeholder names in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    VAR_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .collect()
}

/// Replace every `${name}` in `text` with the JSON encoding of `resolve(name)`.
///
/// JSON is also YAML flow syntax, so the result parses as either format.
pub fn interpolate(text: &str, mut resolve: impl FnMut(&str) -> ConfigResult<Value>) -> ConfigResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in VAR_RE.captures_iter(text) {
        let (whole, name) = match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(name)) => (whole, name),
            _ => continue,
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&resolve(name.as_str().trim())?.to_string());
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::ConfigError;

    #[test]
    fn substitutes_json_values() {
        let text = r#"{"LOWER": {"IN": ${units}}, "TEXT": {"REGEX": ${year}}}"#;
        let out = interpolate(text, |name| match name {
            "units" => Ok(json!(["mg", "kg"])),
            "year" => Ok(json!(r"^\d{4}$")),
            _ => unreachable!(),
        })
        .unwrap();
        assert_eq!(out, r#"{"LOWER": {"IN": ["mg","kg"]}, "TEXT": {"REGEX": "^\\d{4}$"}}"#);
    }

    #[test]
    fn errors_stop_substitution() {
        let err = interpolate("a: ${missing}", |name| {
            Err(ConfigError::UnresolvedPlaceholder {
                name: name.to_string(),
                path: PathBuf::from("engine.yaml"),
            })
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "unresolved placeholder '${missing}' in engine.yaml");
    }

    #[test]
    fn lists_placeholders() {
        assert_eq!(
            placeholders("${a} and ${patterns.ecog.token}"),
            vec!["a", "patterns.ecog.token"]
        );
        assert!(placeholders("no braces $here").is_empty());
    }
}
