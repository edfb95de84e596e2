//! Variable interpolation for strings
//!
//! `${name}` is replaced by the value of `name`. `$$` is an escape for a single
//! `$`, so `$${name}` produces the literal text `${name}`. Substitution is a
//! single left-to-right pass: replaced values are never scanned again, and
//! names with no value are left as written.

use indexmap::IndexMap;
use std::collections::HashMap;

/// Resolved variable values, by name
pub type Vars = HashMap<String, String>;

const ESCAPE: &str = "$$";

/// Interpolate variables in a string
pub fn interpolate(s: &str, vars: &Vars) -> String {
    if !s.contains('$') {
        return s.to_string();
    }

    s.split(ESCAPE)
        .map(|segment| substitute(segment, vars))
        .collect::<Vec<_>>()
        .join("$")
}

/// Replace `${name}` tokens in a segment that contains no escapes
fn substitute(segment: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(start) = rest.find("${") {
        let (before, token) = rest.split_at(start);
        out.push_str(before);

        let Some(end) = token.find('}') else {
            out.push_str(token);
            return out;
        };

        let name = &token[2..end];
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&token[..=end]),
        }
        rest = &token[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Values whose text can be interpolated in place
pub trait Interpolate {
    fn interpolate(&mut self, vars: &Vars);
}

impl Interpolate for String {
    fn interpolate(&mut self, vars: &Vars) {
        *self = interpolate(self, vars);
    }
}

impl<T: Interpolate> Interpolate for Option<T> {
    fn interpolate(&mut self, vars: &Vars) {
        if let Some(inner) = self {
            inner.interpolate(vars);
        }
    }
}

impl<T: Interpolate> Interpolate for Vec<T> {
    fn interpolate(&mut self, vars: &Vars) {
        for item in self.iter_mut() {
            item.interpolate(vars);
        }
    }
}

/// Keys are interpolated too; a key that collides after substitution keeps the later value
impl<T: Interpolate> Interpolate for IndexMap<String, T> {
    fn interpolate(&mut self, vars: &Vars) {
        let entries = std::mem::take(self);
        for (mut key, mut value) in entries {
            key.interpolate(vars);
            value.interpolate(vars);
            self.insert(key, value);
        }
    }
}
