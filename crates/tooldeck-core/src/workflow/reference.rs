//! Parameter expressions and reference resolution.
//!
//! A raw parameter value is parsed once into a [`ParamExpr`]:
//!
//! - `{"_generate": prompt, "_context": ...}` → [`ParamExpr::Generate`]
//! - `{"_literal": value}` → [`ParamExpr::Literal`] (escape hatch)
//! - `"userInput.field"` → [`Reference::UserInput`]
//! - `"actionId.path.to.field"` → [`Reference::Action`]
//! - `"actionId[*].path"` → [`Reference::MappedAction`]
//! - anything else → [`ParamExpr::Literal`]
//!
//! Reference heads and path segments are identifiers
//! (`[A-Za-z_][A-Za-z0-9_-]*`); path segments may also be array indices.
//! Strings such as `"a@x.com"` or `"hello world."` are therefore literals.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ExecutionError;
use crate::workflow::context::ExecutionContext;
use crate::workflow::schema::GenerationContext;

pub const USER_INPUT: &str = "userInput";
pub const GENERATE_KEY: &str = "_generate";
pub const CONTEXT_KEY: &str = "_context";
pub const LITERAL_KEY: &str = "_literal";

/// Typed reference to data in the execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    UserInput { path: Vec<String> },
    Action { action_id: String, path: Vec<String> },
    MappedAction { action_id: String, path: Vec<String> },
}

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamExpr {
    Literal(Value),
    Reference(Reference),
    Generate {
        prompt: String,
        context: GenerationContext,
    },
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([A-Za-z_][A-Za-z0-9_-]*)(\[\*\])?((?:\.(?:[A-Za-z_][A-Za-z0-9_-]*|[0-9]+))*)$",
        )
        .expect("reference pattern is valid")
    })
}

impl Reference {
    /// Parse a reference expression; `None` means the string is a literal.
    pub fn parse(expr: &str) -> Option<Reference> {
        let caps = reference_regex().captures(expr)?;
        let head = caps.get(1)?.as_str().to_string();
        let mapped = caps.get(2).is_some();
        let path: Vec<String> = caps
            .get(3)
            .map(|m| m.as_str())
            .unwrap_or("")
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if head == USER_INPUT {
            if mapped || path.is_empty() {
                return None;
            }
            return Some(Reference::UserInput { path });
        }
        if mapped {
            return Some(Reference::MappedAction {
                action_id: head,
                path,
            });
        }
        if path.is_empty() {
            return None;
        }
        Some(Reference::Action {
            action_id: head,
            path,
        })
    }

    /// The action this reference depends on, if any.
    pub fn action_id(&self) -> Option<&str> {
        match self {
            Reference::UserInput { .. } => None,
            Reference::Action { action_id, .. } | Reference::MappedAction { action_id, .. } => {
                Some(action_id)
            }
        }
    }

    /// Resolve against the context. `Ok(None)` is an absent (undefined) value.
    pub fn resolve(&self, ctx: &ExecutionContext) -> Result<Option<Value>, ExecutionError> {
        match self {
            Reference::UserInput { path } => Ok(lookup_in_map(&ctx.user_input, path)),
            Reference::Action { action_id, path } => {
                let stored = ctx.result(action_id).ok_or_else(|| {
                    ExecutionError::unresolved(self.to_string(), missing_reason(action_id))
                })?;
                Ok(get_path(stored, path).cloned())
            }
            Reference::MappedAction { action_id, path } => {
                let stored = ctx.result(action_id).ok_or_else(|| {
                    ExecutionError::unresolved(self.to_string(), missing_reason(action_id))
                })?;
                let items = stored.as_array().ok_or_else(|| {
                    ExecutionError::unresolved(
                        self.to_string(),
                        format!("result of '{}' is not an array", action_id),
                    )
                })?;
                Ok(Some(Value::Array(
                    items
                        .iter()
                        .map(|item| get_path(item, path).cloned().unwrap_or(Value::Null))
                        .collect(),
                )))
            }
        }
    }
}

fn missing_reason(action_id: &str) -> String {
    format!("no stored result for action '{}'", action_id)
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::UserInput { path } => write!(f, "{}.{}", USER_INPUT, path.join(".")),
            Reference::Action { action_id, path } => write!(f, "{}.{}", action_id, path.join(".")),
            Reference::MappedAction { action_id, path } => {
                write!(f, "{}[*]", action_id)?;
                for segment in path {
                    write!(f, ".{}", segment)?;
                }
                Ok(())
            }
        }
    }
}

impl ParamExpr {
    pub fn parse(raw: &Value) -> ParamExpr {
        match raw {
            Value::String(s) => match Reference::parse(s) {
                Some(reference) => ParamExpr::Reference(reference),
                None => ParamExpr::Literal(raw.clone()),
            },
            Value::Object(map) => {
                if let Some(prompt) = map.get(GENERATE_KEY).and_then(Value::as_str) {
                    let context = map
                        .get(CONTEXT_KEY)
                        .and_then(|c| serde_json::from_value(c.clone()).ok())
                        .unwrap_or_default();
                    return ParamExpr::Generate {
                        prompt: prompt.to_string(),
                        context,
                    };
                }
                if map.len() == 1 {
                    if let Some(inner) = map.get(LITERAL_KEY) {
                        return ParamExpr::Literal(inner.clone());
                    }
                }
                ParamExpr::Literal(raw.clone())
            }
            _ => ParamExpr::Literal(raw.clone()),
        }
    }
}

/// Walk a dotted path through objects and arrays.
pub fn get_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for part in path {
        match current {
            Value::Object(map) => current = map.get(part)?,
            Value::Array(arr) => {
                let idx: usize = part.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

fn lookup_in_map(map: &Map<String, Value>, path: &[String]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    let value = map.get(first)?;
    get_path(value, rest).filter(|v| !v.is_null()).cloned()
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("placeholder pattern is valid"))
}

/// References named by the `{{reference}}` placeholders of a prompt.
pub fn placeholder_references(template: &str) -> Vec<Reference> {
    placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .filter_map(|expr| Reference::parse(expr.as_str()))
        .collect()
}

/// Substitute `{{reference}}` placeholders in a prompt.
///
/// Strings are inserted verbatim, other values as compact JSON. Placeholders
/// that do not parse as references are left untouched.
pub fn interpolate(template: &str, ctx: &ExecutionContext) -> Result<String, ExecutionError> {
    let re = placeholder_regex();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in re.captures_iter(template) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(reference) = Reference::parse(expr.as_str()) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match reference.resolve(ctx)? {
            Some(Value::String(s)) => out.push_str(&s),
            Some(other) => out.push_str(&other.to_string()),
            None => {}
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(
            json!({ "team": "ops", "limits": { "max": 5 } })
                .as_object()
                .cloned()
                .unwrap(),
        );
        ctx.store("stepA", json!({ "email": "a@x.com", "tags": ["x", "y"] }));
        ctx.store(
            "rows",
            json!([{ "email": "one@x.com" }, { "email": "two@x.com" }, { "name": "no email" }]),
        );
        ctx
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            Reference::parse("userInput.team"),
            Some(Reference::UserInput {
                path: vec!["team".into()]
            })
        );
        assert_eq!(
            Reference::parse("stepA.profile.email"),
            Some(Reference::Action {
                action_id: "stepA".into(),
                path: vec!["profile".into(), "email".into()]
            })
        );
        assert_eq!(
            Reference::parse("rows[*].email"),
            Some(Reference::MappedAction {
                action_id: "rows".into(),
                path: vec!["email".into()]
            })
        );
        assert_eq!(
            Reference::parse("rows[*]"),
            Some(Reference::MappedAction {
                action_id: "rows".into(),
                path: vec![]
            })
        );
        assert_eq!(
            Reference::parse("stepA.tags.1"),
            Some(Reference::Action {
                action_id: "stepA".into(),
                path: vec!["tags".into(), "1".into()]
            })
        );
    }

    #[test]
    fn test_literals_are_not_references() {
        for literal in ["a@x.com", "hello", "hello world.", "stepA.", "userInput", "1.5", ""] {
            assert_eq!(Reference::parse(literal), None, "{literal}");
        }
        assert_eq!(ParamExpr::parse(&json!(42)), ParamExpr::Literal(json!(42)));
        assert_eq!(
            ParamExpr::parse(&json!({ "_literal": "stepA.email" })),
            ParamExpr::Literal(json!("stepA.email"))
        );
    }

    #[test]
    fn test_parse_generate_directive() {
        assert_eq!(
            ParamExpr::parse(&json!({ "_generate": "SELECT users", "_context": "sql" })),
            ParamExpr::Generate {
                prompt: "SELECT users".into(),
                context: GenerationContext::Sql
            }
        );
        assert_eq!(
            ParamExpr::parse(&json!({ "_generate": "Say hi" })),
            ParamExpr::Generate {
                prompt: "Say hi".into(),
                context: GenerationContext::General
            }
        );
    }

    #[test]
    fn test_resolve_action_reference() {
        let ctx = ctx();
        let reference = Reference::parse("stepA.email").unwrap();
        assert_eq!(reference.resolve(&ctx).unwrap(), Some(json!("a@x.com")));

        let reference = Reference::parse("stepA.tags.1").unwrap();
        assert_eq!(reference.resolve(&ctx).unwrap(), Some(json!("y")));

        let reference = Reference::parse("stepA.phone").unwrap();
        assert_eq!(reference.resolve(&ctx).unwrap(), None);
    }

    #[test]
    fn test_resolve_missing_action_is_unresolved() {
        let ctx = ctx();
        let err = Reference::parse("stepB.email")
            .unwrap()
            .resolve(&ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn test_resolve_mapped_reference() {
        let ctx = ctx();
        let reference = Reference::parse("rows[*].email").unwrap();
        assert_eq!(
            reference.resolve(&ctx).unwrap(),
            Some(json!(["one@x.com", "two@x.com", null]))
        );

        let err = Reference::parse("stepA[*].email")
            .unwrap()
            .resolve(&ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn test_resolve_user_input() {
        let ctx = ctx();
        assert_eq!(
            Reference::parse("userInput.team").unwrap().resolve(&ctx).unwrap(),
            Some(json!("ops"))
        );
        assert_eq!(
            Reference::parse("userInput.limits.max").unwrap().resolve(&ctx).unwrap(),
            Some(json!(5))
        );
        assert_eq!(
            Reference::parse("userInput.missing").unwrap().resolve(&ctx).unwrap(),
            None
        );
    }

    #[test]
    fn test_interpolate_prompt() {
        let ctx = ctx();
        let prompt = interpolate(
            "Write to {{ stepA.email }} about {{stepA.tags}} for {{userInput.team}} {{not a ref}}",
            &ctx,
        )
        .unwrap();
        assert_eq!(
            prompt,
            "Write to a@x.com about [\"x\",\"y\"] for ops {{not a ref}}"
        );

        let err = interpolate("{{ghost.field}}", &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn test_display_round_trips_expression() {
        for expr in ["userInput.a.b", "stepA.email", "rows[*].email", "rows[*]"] {
            assert_eq!(Reference::parse(expr).unwrap().to_string(), expr);
        }
    }
}
