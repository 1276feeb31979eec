//! Localized text used in resolved display formulas.

use indexmap::IndexMap;

pub const ADDITIONAL_BONUS: &str = "Rolls.Dice.Formula.AdditionalBonus";
pub const PART_INDEX: &str = "Damage.PartIndex";
pub const DISABLED_MODIFIER: &str = "Rolls.Dice.Formula.DisabledModifier";

pub trait Localize {
    /// Looks up `key` and substitutes each `{name}` with its argument.
    fn format(&self, key: &str, args: &[(&str, &str)]) -> String;
}

/// A key/template table. Unknown keys format to the key itself.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    entries: IndexMap<String, String>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn english() -> Self {
        Self::new()
            .with(ADDITIONAL_BONUS, "{bonus}[Additional Bonus]")
            .with(PART_INDEX, "Part {partIndex} of {partCount}")
            .with(DISABLED_MODIFIER, "{name} (disabled)")
    }

    pub fn with(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.entries.insert(key.into(), template.into());
        self
    }
}

impl Localize for Catalogue {
    fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        let Some(template) = self.entries.get(key) else {
            return key.to_owned();
        };
        args.iter().fold(template.clone(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}
