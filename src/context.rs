//! Named data contexts and resolution of `@variable` references against them.

use crate::modifier::RollMod;
use crate::roll::Number;
use crate::RResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A value stored in a context.
///
/// Strings are sub-formulas, objects with exactly the fields of a [RollMod]
/// are modifiers, and any other object is a nested context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Flag(bool),
    Number(Number),
    Formula(String),
    List(Vec<Value>),
    Modifier(RollMod),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn map() -> Self {
        Self::Map(IndexMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(list) => key.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        }
    }

    /// Inserts `value` under `key`, turning `self` into a map if it is not one.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !matches!(self, Self::Map(_)) {
            self = Self::map();
        }
        if let Self::Map(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Map(_) | Self::List(_))
    }
}

impl From<Number> for Value {
    fn from(x: Number) -> Self {
        Self::Number(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Self::Number(x.into())
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Self {
        Self::Number(i64::from(x).into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Number(x.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Formula(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Formula(s)
    }
}

impl From<RollMod> for Value {
    fn from(m: RollMod) -> Self {
        Self::Modifier(m)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Aliases `target` to whichever context is named by the first of `options`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selector {
    pub target: String,
    pub options: Vec<String>,
}

impl Selector {
    pub fn new(target: impl Into<String>, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            target: target.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Every data context available to one roll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollContext {
    pub all_contexts: IndexMap<String, Value>,
    /// Context used for variables whose first segment names no context.
    pub main_context: Option<String>,
    pub selectors: Vec<Selector>,
}

/// Outcome of walking a variable path: the deepest value reached, the part
/// of the path that could not be followed, and the container of that value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Resolution<'a, 'v> {
    pub value: &'a Value,
    pub remainder: &'v str,
    pub parent: Option<&'a Value>,
}

impl Resolution<'_, '_> {
    pub fn is_complete(&self) -> bool {
        self.remainder.is_empty()
    }
}

impl RollContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(s: &str) -> RResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_value(v: serde_json::Value) -> RResult<Self> {
        Ok(serde_json::from_value(v)?)
    }

    pub fn with_context(mut self, name: impl Into<String>, context: impl Into<Value>) -> Self {
        self.all_contexts.insert(name.into(), context.into());
        self
    }

    pub fn with_main_context(mut self, name: impl Into<String>) -> Self {
        self.main_context = Some(name.into());
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    fn main(&self) -> Option<&Value> {
        self.main_context.as_deref().and_then(|name| self.all_contexts.get(name))
    }

    /// Points each selector's target at the context named by its first option.
    /// Selectors with an empty target or a missing source are skipped.
    pub fn apply_selectors(&mut self) {
        for selector in &self.selectors {
            let source = match selector.options.first() {
                Some(source) if !source.is_empty() && !selector.target.is_empty() => source,
                _ => continue,
            };
            match self.all_contexts.get(source).cloned() {
                Some(context) => {
                    self.all_contexts.insert(selector.target.clone(), context);
                }
                None => debug!(target = %selector.target, %source, "selector source not found"),
            }
        }
    }

    /// Finds the context `variable` refers to and walks as far down its path
    /// as the nested maps allow.
    pub fn resolve<'a, 'v>(&'a self, variable: &'v str) -> Option<Resolution<'a, 'v>> {
        let path = variable.strip_prefix('@').unwrap_or(variable);
        let (head, tail) = split_first(path);
        let (root, rest) = match self.all_contexts.get(head) {
            Some(context) => (context, tail),
            None => (self.main()?, path),
        };
        Some(walk(root, rest))
    }

    /// Returns the deepest context reached for `variable` and the unresolved
    /// trailing path, or no context when no top-level context matches.
    pub fn get_context_for_variable<'a, 'v>(&'a self, variable: &'v str) -> (Option<&'a Value>, &'v str) {
        match self.resolve(variable) {
            Some(res) => (Some(res.value), res.remainder),
            None => (None, variable.strip_prefix('@').unwrap_or(variable)),
        }
    }
}

fn split_first(path: &str) -> (&str, &str) {
    path.split_once('.').unwrap_or((path, ""))
}

fn walk<'a, 'v>(root: &'a Value, mut path: &'v str) -> Resolution<'a, 'v> {
    let mut value = root;
    let mut parent = None;
    while !path.is_empty() {
        let (head, tail) = split_first(path);
        match value.get(head) {
            Some(next) => {
                parent = Some(value);
                value = next;
                path = tail;
            }
            None => break,
        }
    }
    Resolution {
        value,
        remainder: path,
        parent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor() -> RollContext {
        RollContext::from_value(json!({
            "allContexts": {
                "actor": {
                    "abilities": { "str": { "mod": 3 }, "dex": { "mod": 1 } },
                    "bab": 4
                },
                "ally": { "abilities": { "str": { "mod": -1 } } }
            },
            "mainContext": "actor"
        }))
        .unwrap()
    }

    #[test]
    fn test_named_context() {
        let ctx = actor();
        let res = ctx.resolve("@ally.abilities.str.mod").unwrap();
        assert_eq!(res.value, &Value::from(-1));
        assert!(res.is_complete());
    }

    #[test]
    fn test_main_context_fallback() {
        let ctx = actor();
        let res = ctx.resolve("@abilities.dex.mod").unwrap();
        assert_eq!(res.value, &Value::from(1));
        assert_eq!(res.parent.and_then(|p| p.get("mod")), Some(&Value::from(1)));
    }

    #[test]
    fn test_single_segment() {
        let ctx = actor();
        let (value, rest) = ctx.get_context_for_variable("@bab");
        assert_eq!(value, Some(&Value::from(4)));
        assert_eq!(rest, "");

        let (value, rest) = ctx.get_context_for_variable("@actor");
        assert!(matches!(value, Some(Value::Map(_))));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_partial_path() {
        let ctx = actor();
        let res = ctx.resolve("@actor.abilities.cha.mod").unwrap();
        assert!(matches!(res.value, Value::Map(_)));
        assert_eq!(res.remainder, "cha.mod");
        assert!(!res.is_complete());
    }

    #[test]
    fn test_missing_context() {
        let ctx = RollContext::new().with_context("actor", Value::map().with("bab", 4));
        let (value, rest) = ctx.get_context_for_variable("@missing.value");
        assert_eq!(value, None);
        assert_eq!(rest, "missing.value");
    }

    #[test]
    fn test_list_index() {
        let ctx = RollContext::new().with_context("d", Value::map().with("dice", vec!["1d6", "1d8"]));
        let res = ctx.resolve("@d.dice.1").unwrap();
        assert_eq!(res.value, &Value::from("1d8"));
    }

    #[test]
    fn test_selectors() {
        let mut ctx = actor()
            .with_selector(Selector::new("stat", ["ally", "actor"]))
            .with_selector(Selector::new("other", Vec::<String>::new()))
            .with_selector(Selector::new("", ["actor"]))
            .with_selector(Selector::new("ghost", ["nobody"]));
        ctx.apply_selectors();

        assert_eq!(ctx.all_contexts.get("stat"), ctx.all_contexts.get("ally"));
        assert!(!ctx.all_contexts.contains_key("other"));
        assert!(!ctx.all_contexts.contains_key(""));
        assert!(!ctx.all_contexts.contains_key("ghost"));
    }

    #[test]
    fn test_value_shapes() {
        let v: Value = serde_json::from_value(json!({
            "bless": { "name": "Bless", "modifier": "1d4" },
            "note": { "name": "Not a modifier", "text": "x" },
            "flag": true,
            "none": null,
            "dmg": "1d8 + 2"
        }))
        .unwrap();
        assert_eq!(v.get("bless"), Some(&Value::Modifier(RollMod::new("Bless", "1d4"))));
        assert!(matches!(v.get("note"), Some(Value::Map(_))));
        assert_eq!(v.get("flag"), Some(&Value::Flag(true)));
        assert_eq!(v.get("none"), Some(&Value::Null));
        assert_eq!(v.get("dmg"), Some(&Value::from("1d8 + 2")));
    }
}
