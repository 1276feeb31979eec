use crate::modifier::{DamagePart, RollMode};
use crate::RResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogButton {
    pub id: Option<String>,
    pub label: String,
}

impl DialogButton {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            label: label.into(),
        }
    }

    /// The identifier reported back when this button is pressed.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.label)
    }
}

/// Per-tree configuration, fixed for the lifetime of a [RollTree](super::RollTree).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollTreeOptions {
    #[serde(rename = "skipUI")]
    pub skip_ui: bool,
    pub debug: bool,
    pub parts: Vec<DamagePart>,
    pub buttons: Vec<DialogButton>,
    pub default_button: Option<String>,
    pub title: Option<String>,
    /// Forwarded to the dialog untouched.
    pub dialog_options: serde_json::Value,
    /// Hint for the dialog about which die drives the roll, e.g. `"d20"`.
    pub main_die: Option<String>,
}

impl RollTreeOptions {
    pub fn from_json(s: &str) -> RResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn headless() -> Self {
        Self {
            skip_ui: true,
            ..Self::default()
        }
    }

    pub fn damage_sections(&self) -> Vec<DamagePart> {
        self.parts
            .iter()
            .filter(|part| part.is_damage_section)
            .cloned()
            .collect()
    }

    /// The button pressed when no dialog is shown.
    pub fn default_button(&self) -> &str {
        match (&self.default_button, self.buttons.first()) {
            (Some(button), _) => button.as_str(),
            (None, Some(first)) => first.key(),
            (None, None) => "roll",
        }
    }
}

/// Host settings the tree would otherwise read from global state.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollSettings {
    pub roll_mode: RollMode,
}
