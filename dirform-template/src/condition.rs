//! Enablement conditions for commands.
//!
//! Grammar:
//!
//! ```text
//! condition := "!"? ( name | name "(" [ arg ("," arg)* ] ")" )
//! arg       := name | "'" text "'" | '"' text '"'
//! ```
//!
//! A bare name tests an object attribute for truthiness. The call form is
//! evaluated remotely; its arguments resolve against the object (`dn`,
//! `uuid`, attribute names) unless quoted.

use crate::{TemplateError, TemplateResult};
use dirform_model::RemoteObjectProxy;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub negate: bool,
    pub expr: ConditionExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpr {
    AttributeRef(String),
    MethodCall { name: String, args: Vec<ConditionArg> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionArg {
    /// Resolved against the object at evaluation time.
    Reference(String),
    Literal(String),
}

impl Condition {
    pub fn parse(input: &str) -> TemplateResult<Self> {
        let fail = |reason: &str| TemplateError::Condition {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = input.trim();
        let negate = rest.starts_with('!');
        if negate {
            rest = rest[1..].trim_start();
        }

        let (name, tail) = match rest.find('(') {
            Some(open) => (rest[..open].trim(), Some(&rest[open + 1..])),
            None => (rest, None),
        };
        if !is_identifier(name) {
            return Err(fail("expected an identifier"));
        }

        let expr = match tail {
            None => ConditionExpr::AttributeRef(name.to_string()),
            Some(tail) => {
                let body = tail
                    .trim_end()
                    .strip_suffix(')')
                    .ok_or_else(|| fail("missing closing parenthesis"))?;
                ConditionExpr::MethodCall {
                    name: name.to_string(),
                    args: parse_args(body).map_err(|r| fail(&r))?,
                }
            }
        };
        Ok(Self { negate, expr })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.expr, ConditionExpr::MethodCall { .. })
    }

    /// Evaluates an attribute reference locally. `None` for the call form,
    /// which needs a remote round trip.
    pub fn evaluate_local(&self, object: &RemoteObjectProxy) -> Option<bool> {
        match &self.expr {
            ConditionExpr::AttributeRef(name) => Some(self.apply(is_truthy(&object.resolve_argument(name)))),
            ConditionExpr::MethodCall { .. } => None,
        }
    }

    /// Arguments of the call form, resolved against `object`.
    pub fn resolve_args(&self, object: &RemoteObjectProxy) -> Vec<Value> {
        match &self.expr {
            ConditionExpr::MethodCall { args, .. } => args
                .iter()
                .map(|arg| match arg {
                    ConditionArg::Reference(name) => object.resolve_argument(name),
                    ConditionArg::Literal(text) => Value::String(text.clone()),
                })
                .collect(),
            ConditionExpr::AttributeRef(_) => Vec::new(),
        }
    }

    /// Applies the optional negation to a raw result.
    pub fn apply(&self, result: bool) -> bool {
        result != self.negate
    }

    /// Applies the negation to the truthiness of a remote call result.
    pub fn apply_value(&self, result: &Value) -> bool {
        self.apply(is_truthy(result))
    }
}

fn parse_args(body: &str) -> Result<Vec<ConditionArg>, String> {
    let mut args = Vec::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        let arg = if first == '\'' || first == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == first => break,
                    Some(c) => text.push(c),
                    None => return Err("unterminated string literal".to_string()),
                }
            }
            ConditionArg::Literal(text)
        } else {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' || c.is_whitespace() {
                    break;
                }
                name.push(c);
                chars.next();
            }
            if !is_identifier(&name) {
                return Err(format!("invalid argument '{}'", name));
            }
            ConditionArg::Reference(name)
        };
        args.push(arg);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(c) => return Err(format!("unexpected '{}'", c)),
        }
    }
    Ok(args)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Truthiness of a resolved attribute value.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
