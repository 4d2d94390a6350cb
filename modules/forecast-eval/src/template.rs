use std::collections::HashMap;

use crate::error::{EvalError, EvalResult};

/// A template split into literal text and `{{var}}` placeholders.
#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Var(&'a str),
    /// `{{` with no closing `}}`; holds everything from the `{{` on
    Unclosed(&'a str),
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            out.push(Segment::Text(&rest[..open]));
        }
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                out.push(Segment::Var(after[..close].trim()));
                rest = &after[close + 2..];
            }
            None => {
                out.push(Segment::Unclosed(&rest[open..]));
                return out;
            }
        }
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Replace `{{var}}` placeholders from a runtime context map.
/// Unknown placeholders are left as-is so they show up in the prompt.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Text(text) | Segment::Unclosed(text) => result.push_str(text),
            Segment::Var(name) => match vars.get(name) {
                Some(value) => result.push_str(value),
                None => {
                    result.push_str("{{");
                    result.push_str(name);
                    result.push_str("}}");
                }
            },
        }
    }
    result
}

/// Check that every placeholder is closed and named in `allowed`, and that
/// every name in `required` appears at least once.
pub fn validate(template: &str, allowed: &[&str], required: &[&str]) -> EvalResult<()> {
    let mut seen = Vec::new();
    for segment in segments(template) {
        match segment {
            Segment::Text(_) => {}
            Segment::Unclosed(tail) => {
                return Err(EvalError::Template(format!(
                    "unclosed template variable: {}",
                    ai_client::truncate_to_char_boundary(tail, 40)
                )))
            }
            Segment::Var(name) if allowed.contains(&name) => seen.push(name),
            Segment::Var(name) => {
                return Err(EvalError::Template(format!(
                    "unknown template variable {{{{{name}}}}}, allowed: {allowed:?}"
                )))
            }
        }
    }

    match required.iter().find(|r| !seen.contains(r)) {
        Some(missing) => Err(EvalError::Template(format!(
            "template never uses required variable {{{{{missing}}}}}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_runtime_vars() {
        let result = render(
            "Text: {{original_text}} / {{ schema }}",
            &HashMap::from([("original_text", "明天高温"), ("schema", "{}")]),
        );
        assert_eq!(result, "Text: 明天高温 / {}");
    }

    #[test]
    fn leaves_unknown_and_unclosed_vars_intact() {
        let result = render("{{nope}} {\"a\": 1} {{tail", &HashMap::new());
        assert_eq!(result, "{{nope}} {\"a\": 1} {{tail");
    }

    #[test]
    fn splits_text_and_vars() {
        assert_eq!(
            segments("a{{x}}b"),
            vec![Segment::Text("a"), Segment::Var("x"), Segment::Text("b")]
        );
    }

    #[test]
    fn validates_allowed_and_required() {
        let allowed = ["geo_list", "std_geo_list"];
        assert!(validate("{{geo_list}} {{std_geo_list}}", &allowed, &["geo_list"]).is_ok());
        assert!(validate("{{other}}", &allowed, &[]).is_err());
        assert!(validate("no vars here", &allowed, &["geo_list"]).is_err());
        assert!(validate("{{geo_list", &allowed, &[]).is_err());
    }
}
