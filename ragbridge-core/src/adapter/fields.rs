//! Helpers for reading untyped upstream JSON.
//!
//! Upstream payloads are partially typed at best. Lookups here follow the
//! loose rules the orchestration responses were designed against: `null`,
//! `false`, `0` and `""` count as missing, numbers may arrive as strings, and a
//! logical field can live under several alias names.

use serde_json::{Map, Value};

/// Where an alias is looked up on a grounding chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The chunk object itself.
    Root,
    /// The chunk's embedded `metadata` object.
    Metadata,
}

/// An ordered alias list for one logical field. Earlier entries win.
pub type Aliases = &'static [(Scope, &'static str)];

/// Whether a JSON value counts as present.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a scalar as identifier text. Strings pass through; integral numbers
/// drop any trailing `.0`. Other value kinds have no text form.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some((f as i64).to_string())
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

/// Integer coercion with `parseInt` semantics: numbers are truncated, strings
/// contribute their leading integer (`"14 of 20"` is 14). Anything else is `None`.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.is_finite() && f.abs() < i64::MAX as f64 {
                Some(f.trunc() as i64)
            } else {
                None
            }
        }
        Value::String(s) => {
            let s = s.trim_start();
            let (sign, digits) = split_sign(s);
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            if end == 0 {
                return None;
            }
            let n: i64 = digits[..end].parse().ok()?;
            Some(if sign { -n } else { n })
        }
        _ => None,
    }
}

/// Float coercion with `parseFloat` semantics: the longest numeric prefix of a
/// string is used. Non-finite results are `None`.
pub fn coerce_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim_start();
            let end = float_prefix_len(s);
            if end == 0 {
                None
            } else {
                s[..end].parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` run, or 0 when
/// the string has no leading number.
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        mantissa_digits += j - frac_start;
        if mantissa_digits > 0 {
            i = j;
        }
    }
    if mantissa_digits == 0 {
        return 0;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// A grounding chunk viewed as root fields plus an optional `metadata` object.
#[derive(Debug, Clone, Copy)]
pub struct FieldSource<'a> {
    root: &'a Map<String, Value>,
    metadata: Option<&'a Map<String, Value>>,
}

impl<'a> FieldSource<'a> {
    pub fn new(root: &'a Map<String, Value>) -> Self {
        let metadata = root.get("metadata").and_then(Value::as_object);
        Self { root, metadata }
    }

    fn lookup(&self, scope: Scope, key: &str) -> Option<&'a Value> {
        match scope {
            Scope::Root => self.root.get(key),
            Scope::Metadata => self.metadata?.get(key),
        }
    }

    /// First alias holding a truthy string or number, rendered as text.
    pub fn text(&self, aliases: Aliases) -> Option<String> {
        aliases
            .iter()
            .filter_map(|(scope, key)| self.lookup(*scope, key))
            .filter(|v| is_truthy(v))
            .find_map(scalar_text)
    }

    /// First alias whose value is not null, whatever its type.
    pub fn present(&self, aliases: Aliases) -> Option<&'a Value> {
        aliases
            .iter()
            .filter_map(|(scope, key)| self.lookup(*scope, key))
            .find(|v| !v.is_null())
    }
}
