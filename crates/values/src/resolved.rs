// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Resolved computation values.
//!
//! A lookup table for every value known during one participant's
//! evaluation: the required inputs seed it, every computed atomic lands in
//! it, and at the end it holds exactly the participant's KPIs. Insertion
//! is write-once and iteration follows insertion order.

use crate::error::EvalError;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Default)]
pub struct ResolvedValues {
    order: Vec<String>,
    map: HashMap<String, Value>,
}

impl ResolvedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value, EvalError> {
        self.map
            .get(name)
            .ok_or_else(|| EvalError::NotResolved(name.to_owned()))
    }

    /// Insert a computed value; resolving the same name twice is a bug in
    /// the caller and fails.
    pub fn insert(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        if self.has(name) {
            return Err(EvalError::AlreadyResolved(name.to_owned()));
        }
        self.order.push(name.to_owned());
        self.map.insert(name.to_owned(), value);
        Ok(())
    }

    /// Drop every listed name that is present; unknown names are ignored.
    pub fn remove_named<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            if self.map.remove(name.as_ref()).is_some() {
                self.order.retain(|n| n != name.as_ref());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Surviving entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .filter_map(|name| self.map.get(name).map(|v| (name.as_str(), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plain::VecValue;

    fn value(v: f64) -> Value {
        Value::Plain(VecValue::scalar(v))
    }

    #[test]
    fn test_write_once() {
        let mut table = ResolvedValues::new();
        table.insert("a", value(1.0)).unwrap();
        assert!(matches!(
            table.insert("a", value(2.0)),
            Err(EvalError::AlreadyResolved(_))
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let table = ResolvedValues::new();
        assert!(matches!(table.get("nope"), Err(EvalError::NotResolved(_))));
    }

    #[test]
    fn test_selective_eviction_keeps_order() {
        let mut table = ResolvedValues::new();
        for (name, v) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            table.insert(name, value(v)).unwrap();
        }
        table.remove_named(["b", "d", "unknown"]);
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(table.get("b").is_err());
    }
}
