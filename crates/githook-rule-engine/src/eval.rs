use std::collections::HashMap;

use serde_json::Value;

use crate::ast::{BinOp, Expr, Literal};
use crate::error::EvalError;

/// Whether a rule tolerates unresolved variables. In strict mode a missing
/// variable aborts evaluation; in lenient mode it evaluates to `null` and
/// lets the surrounding comparison decide (spec §6 "strict vs lenient
/// missing-value handling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    Strict,
    Lenient,
}

/// Evaluate a compiled expression against a resolved variable map. Callers
/// populate `resolved` with one entry per `VariableRef::synthetic` that
/// could be resolved; everything else is treated as missing.
pub fn eval(expr: &Expr, resolved: &HashMap<String, Value>, policy: MissingPolicy) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_to_value(lit)),
        Expr::Var { synthetic, source } => match resolved.get(synthetic) {
            Some(v) => Ok(v.clone()),
            None => match policy {
                MissingPolicy::Lenient => Ok(Value::Null),
                MissingPolicy::Strict => Err(EvalError::MissingVariable(source.clone())),
            },
        },
        Expr::Not(inner) => {
            let v = eval(inner, resolved, policy)?;
            Ok(Value::Bool(!truthy(&v)))
        }
        Expr::Bin(BinOp::And, lhs, rhs) => {
            let l = eval(lhs, resolved, policy)?;
            if !truthy(&l) {
                return Ok(Value::Bool(false));
            }
            let r = eval(rhs, resolved, policy)?;
            Ok(Value::Bool(truthy(&r)))
        }
        Expr::Bin(BinOp::Or, lhs, rhs) => {
            let l = eval(lhs, resolved, policy)?;
            if truthy(&l) {
                return Ok(Value::Bool(true));
            }
            let r = eval(rhs, resolved, policy)?;
            Ok(Value::Bool(truthy(&r)))
        }
        Expr::Bin(op @ (BinOp::Eq | BinOp::Ne), lhs, rhs) => {
            let l = eval(lhs, resolved, policy)?;
            let r = eval(rhs, resolved, policy)?;
            let equal = values_equal(&l, &r);
            Ok(Value::Bool(if *op == BinOp::Eq { equal } else { !equal }))
        }
        Expr::Bin(op @ (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge), lhs, rhs) => {
            let l = eval(lhs, resolved, policy)?;
            let r = eval(rhs, resolved, policy)?;
            compare(*op, &l, &r)
        }
        Expr::Bin(op @ (BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem), lhs, rhs) => {
            let l = eval(lhs, resolved, policy)?;
            let r = eval(rhs, resolved, policy)?;
            arithmetic(*op, &l, &r)
        }
        Expr::Call(name, args) => {
            let values: Result<Vec<Value>, EvalError> =
                args.iter().map(|a| eval(a, resolved, policy)).collect();
            call_builtin(name, &values?)
        }
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn as_str(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let ordering = if let (Some(x), Some(y)) = (as_number(l), as_number(r)) {
        x.partial_cmp(&y)
    } else if let (Some(x), Some(y)) = (as_str(l), as_str(r)) {
        Some(x.cmp(y))
    } else {
        return Err(EvalError::TypeMismatch(format!(
            "cannot compare {l:?} and {r:?}"
        )));
    };
    let ordering = ordering.ok_or_else(|| EvalError::TypeMismatch("NaN comparison".into()))?;
    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn arithmetic(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let (x, y) = match (as_number(l), as_number(r)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(EvalError::TypeMismatch(format!("cannot apply arithmetic to {l:?} and {r:?}"))),
    };
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::Rem => x % y,
        _ => unreachable!(),
    };
    Ok(serde_json::Number::from_f64(result)
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "contains" => Ok(Value::Bool(builtin_contains(&args[0], &args[1]))),
        "like" => {
            let text = as_str(&args[0])
                .ok_or_else(|| EvalError::TypeMismatch("like() requires string operands".into()))?;
            let pattern = as_str(&args[1])
                .ok_or_else(|| EvalError::TypeMismatch("like() requires string operands".into()))?;
            Ok(Value::Bool(builtin_like(text, pattern)?))
        }
        other => Err(EvalError::TypeMismatch(format!("unknown function '{other}'"))),
    }
}

fn builtin_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(s) => as_str(needle).map(|n| s.contains(n)).unwrap_or(false),
        Value::Object(map) => as_str(needle).map(|n| map.contains_key(n)).unwrap_or(false),
        _ => false,
    }
}

/// Translate a SQL-style `LIKE` pattern (`%` = any run, `_` = any single
/// char) into an anchored regex and evaluate it (spec §6 built-in
/// `like(text, pattern)`).
fn builtin_like(text: &str, pattern: &str) -> Result<bool, EvalError> {
    let mut regex_src = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => regex_src.push_str(".*"),
            '_' => regex_src.push('.'),
            c => regex_src.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex_src.push('$');
    let re = regex::Regex::new(&regex_src).map_err(|e| EvalError::TypeMismatch(e.to_string()))?;
    Ok(re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    fn run(src: &str, resolved: HashMap<String, Value>) -> Value {
        let compiled = compile(src).unwrap();
        eval(&compiled.ast, &resolved, MissingPolicy::Lenient).unwrap()
    }

    #[test]
    fn and_short_circuits_on_false_lhs() {
        let mut resolved = HashMap::new();
        resolved.insert("v_a".to_string(), Value::Bool(false));
        let v = run("a && missing_var", resolved);
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn strict_mode_errors_on_missing_variable() {
        let compiled = compile("a == 1").unwrap();
        let err = eval(&compiled.ast, &HashMap::new(), MissingPolicy::Strict).unwrap_err();
        assert!(matches!(err, EvalError::MissingVariable(_)));
    }

    #[test]
    fn lenient_mode_treats_missing_as_null() {
        let compiled = compile("a == null").unwrap();
        let v = eval(&compiled.ast, &HashMap::new(), MissingPolicy::Lenient).unwrap();
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn like_translates_percent_and_underscore_wildcards() {
        let mut resolved = HashMap::new();
        resolved.insert("v_title".to_string(), Value::String("fix: crash on boot".into()));
        let v = run("like(title, \"fix:%\")", resolved);
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn contains_checks_array_membership() {
        let mut resolved = HashMap::new();
        resolved.insert(
            "v_labels".to_string(),
            Value::Array(vec![Value::String("bug".into()), Value::String("p1".into())]),
        );
        let v = run("contains(labels, \"bug\")", resolved);
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn numeric_comparison_works_across_int_and_float_literals() {
        let v = run("1 + 2 * 3 == 7", HashMap::new());
        assert_eq!(v, Value::Bool(true));
    }
}
