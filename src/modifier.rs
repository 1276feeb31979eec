use serde::{Deserialize, Serialize};
use std::fmt;

fn enabled_by_default() -> bool {
    true
}

/// A named, independently toggleable contribution to a roll.
///
/// Two modifiers with the same `name` are the same logical contribution.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollMod {
    pub name: String,
    /// Formula contributed when enabled. May itself reference variables.
    pub modifier: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RollMod {
    pub fn new(name: impl Into<String>, modifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifier: modifier.into(),
            enabled: true,
            notes: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Visibility of the finished roll, as chosen in the dialog or taken from
/// [RollSettings](crate::RollSettings).
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    #[default]
    PublicRoll,
    GmRoll,
    BlindRoll,
    SelfRoll,
    /// Only reported for cancelled rolls.
    None,
}

impl RollMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicRoll => "publicroll",
            Self::GmRoll => "gmroll",
            Self::BlindRoll => "blindroll",
            Self::SelfRoll => "selfroll",
            Self::None => "none",
        }
    }
}

impl fmt::Display for RollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One damage instance of a roll. The formula of each enabled part replaces
/// the `<damageSection>` placeholder of its own copy of the resolved roll.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DamagePart {
    pub name: Option<String>,
    pub formula: String,
    pub is_damage_section: bool,
    pub is_primary_section: bool,
    pub enabled: bool,
    /// "Part i of N" label, filled in when a roll emits several sections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_index: Option<String>,
}

impl DamagePart {
    pub fn section(formula: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            is_damage_section: true,
            enabled: true,
            ..Self::default()
        }
    }

    pub fn primary(formula: impl Into<String>) -> Self {
        Self {
            is_primary_section: true,
            ..Self::section(formula)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_mod_from_json() {
        let m: RollMod = serde_json::from_str(r#"{"name": "Bless", "modifier": "1d4"}"#).unwrap();
        assert_eq!(m, RollMod::new("Bless", "1d4"));

        let m: RollMod =
            serde_json::from_str(r#"{"name": "Flank", "modifier": "2", "enabled": false}"#).unwrap();
        assert!(!m.enabled);

        assert!(serde_json::from_str::<RollMod>(r#"{"name": "x", "modifier": "1", "mod": 3}"#).is_err());
    }

    #[test]
    fn test_roll_mode_strings() {
        let m: RollMode = serde_json::from_str(r#""gmroll""#).unwrap();
        assert_eq!(m, RollMode::GmRoll);
        assert_eq!(RollMode::None.to_string(), "none");
        assert_eq!(RollMode::default(), RollMode::PublicRoll);
    }

    #[test]
    fn test_damage_part_from_json() {
        let p: DamagePart = serde_json::from_str(
            r#"{"formula": "1d8", "isDamageSection": true, "isPrimarySection": true}"#,
        )
        .unwrap();
        assert!(p.is_primary_section);
        assert!(!p.enabled);
        assert_eq!(p.part_index, None);
    }
}
