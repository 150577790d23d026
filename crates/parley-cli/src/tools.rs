//! Tools offered to the model in the terminal chat

use chrono::{Local, Utc};
use parley_tool::{ArgDef, ArgType, Tool, ToolError, ToolRegistry};
use serde_json::{json, Map, Value};

/// Registry with every built-in tool
pub fn builtin_registry() -> parley_tool::Result<ToolRegistry> {
    ToolRegistry::with_tools([calculator(), current_time()])
}

pub fn calculator() -> Tool {
    Tool::from_fn(
        "calculator",
        "Evaluate an arithmetic expression with + - * / and parentheses",
        |args: Map<String, Value>| {
            let expression = args
                .get("expression")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let value = evaluate(expression).map_err(ToolError::ExecutionFailed)?;
            Ok(number(value))
        },
    )
    .with_arg(ArgDef::required(
        "expression",
        ArgType::String,
        "Expression to evaluate, e.g. \"(2 + 3) * 4\"",
    ))
}

pub fn current_time() -> Tool {
    Tool::from_fn(
        "current_time",
        "Current date and time",
        |args: Map<String, Value>| {
            let utc = args.get("utc").and_then(Value::as_bool).unwrap_or(false);
            let now = if utc {
                Utc::now().to_rfc3339()
            } else {
                Local::now().to_rfc3339()
            };
            Ok(json!(now))
        },
    )
    .with_arg(
        ArgDef::optional("utc", ArgType::Boolean, "Report UTC instead of local time")
            .with_default(json!(false)),
    )
}

/// Whole results are reported without a trailing `.0`
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Evaluate `expression` by recursive descent
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.chars.len() {
        return Err(format!("unexpected '{}'", parser.chars[parser.pos]));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

/// Nesting allowed for parentheses and unary minus
const MAX_DEPTH: usize = 256;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '/' && rhs == 0.0 {
                return Err("division by zero".to_string());
            }
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                self.nested(|p| Ok(-p.factor()?))
            }
            Some('(') => {
                self.pos += 1;
                let value = self.nested(Self::expr)?;
                if self.peek() != Some(')') {
                    return Err("missing ')'".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                literal
                    .parse()
                    .map_err(|_| format!("invalid number '{}'", literal))
            }
            Some(c) => Err(format!("unexpected '{}'", c)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}
