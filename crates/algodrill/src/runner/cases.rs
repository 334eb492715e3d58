//! Test-case loop, run inside the worker
//!
//! Each case gets freshly imported arguments, so nothing one invocation does
//! to its inputs can be seen by another or by the stored case. A case that
//! throws is recorded and the loop moves on; only an interruption (kill
//! switch, step budget) ends it early.

use serde_json::{Number, Value as Json};
use tracing::debug;

use crate::sandbox::{Callable, Interruption, InvokeError};
use crate::types::{TestCase, TestOutcome};

/// Rendered `actual` of a case whose invocation threw
pub const ERROR_ACTUAL: &str = "Error";

/// Rendered form of a value that has no JSON representation
pub const UNDEFINED: &str = "undefined";

/// Run every case in order
pub fn run_cases(callable: &mut dyn Callable, cases: &[TestCase]) -> Result<Vec<TestOutcome>, Interruption> {
    let mut outcomes = Vec::with_capacity(cases.len());
    for (index, case) in cases.iter().enumerate() {
        let input = render_json(&Json::Array(case.input.clone()));
        let expected = render_json(&case.expected);
        let outcome = match callable.invoke(&case.input) {
            Ok(invocation) => {
                // A call that returns nothing is scored on what it did to its first argument
                let actual = invocation.returned.or(invocation.first_argument);
                let passed = actual
                    .as_ref()
                    .is_some_and(|actual| json_eq(actual, &case.expected));
                TestOutcome {
                    input,
                    expected,
                    actual: render(actual.as_ref()),
                    passed,
                    error: None,
                }
            }
            Err(InvokeError::Thrown(message)) => TestOutcome {
                input,
                expected,
                actual: ERROR_ACTUAL.to_string(),
                passed: false,
                error: Some(message),
            },
            Err(InvokeError::Interrupted(reason)) => {
                debug!(index, ?reason, "case interrupted");
                return Err(reason);
            }
        };
        debug!(index, passed = outcome.passed, "case finished");
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// `JSON.stringify` rendering; `undefined` when there is no value
pub fn render(value: Option<&Json>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), render_json)
}

fn render_json(value: &Json) -> String {
    let mut out = String::new();
    write_json(&mut out, value);
    out
}

fn write_json(out: &mut String, value: &Json) {
    match value {
        Json::Number(n) => out.push_str(&render_number(n)),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(out, item);
            }
            out.push(']');
        }
        Json::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Json::from(key.as_str()).to_string());
                out.push(':');
                write_json(out, item);
            }
            out.push('}');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Largest integer a double holds exactly
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

fn render_number(n: &Number) -> String {
    let exact = n.as_u64().is_some_and(|u| u <= MAX_SAFE_INTEGER)
        || n.as_i64().is_some_and(|i| i.unsigned_abs() <= MAX_SAFE_INTEGER);
    match n.as_f64() {
        Some(x) if !exact => js_number(x),
        _ => n.to_string(),
    }
}

/// Decimal form of a double as JavaScript's `Number#toString` prints it
///
/// Shortest round-tripping digits, written out in full for
/// `1e-7 <= |x| < 1e21` and in exponent form otherwise. Non-finite values
/// have no JSON form and print `null`.
fn js_number(x: f64) -> String {
    if !x.is_finite() {
        return "null".to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }

    let sign = if x < 0.0 { "-" } else { "" };
    let scientific = format!("{:e}", x.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // decimal point sits after `n` digits
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if 0 < n && n <= 21 {
        if k <= n {
            format!("{digits}{}", "0".repeat((n - k) as usize))
        } else {
            let (int, frac) = digits.split_at(n as usize);
            format!("{int}.{frac}")
        }
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat(n.unsigned_abs() as usize))
    } else {
        let (first, rest) = digits.split_at(1);
        let e = n - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        if rest.is_empty() {
            format!("{first}e{e_sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{e_sign}{}", e.abs())
        }
    };
    format!("{sign}{body}")
}

/// Structural equality: numbers by value, object keys in any order
pub fn json_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        (Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Json::Object(xs), Json::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}
