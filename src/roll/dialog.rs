//! The contract with the interactive modifier-selection dialog.

use super::options::DialogButton;
use super::RollTree;
use crate::context::RollContext;
use crate::modifier::{DamagePart, RollMod, RollMode};
use crate::RResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What the user chose. A `button` of `None` cancels the roll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selection {
    pub button: Option<String>,
    pub roll_mode: RollMode,
    pub bonus: Option<String>,
    /// The damage parts offered, with `enabled` set on those to roll.
    pub parts: Vec<DamagePart>,
    /// Enabled state chosen per modifier name. Modifiers not listed keep
    /// their own `enabled` flag.
    pub modifiers: IndexMap<String, bool>,
}

impl Selection {
    pub fn cancelled() -> Self {
        Self::default()
    }

    pub fn from_json(s: &str) -> RResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn button(button: impl Into<String>) -> Self {
        Self {
            button: Some(button.into()),
            ..Self::default()
        }
    }

    pub fn with_bonus(mut self, bonus: impl Into<String>) -> Self {
        self.bonus = Some(bonus.into());
        self
    }

    pub fn with_parts(mut self, parts: Vec<DamagePart>) -> Self {
        self.parts = parts;
        self
    }

    pub fn with_modifier(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.modifiers.insert(name.into(), enabled);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.button.is_none()
    }
}

/// Dialog presentation settings taken from the tree's options.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogConfig<'a> {
    pub buttons: &'a [DialogButton],
    pub default_button: Option<&'a str>,
    pub title: Option<&'a str>,
    pub dialog_options: &'a serde_json::Value,
    /// Only the parts flagged as damage sections.
    pub parts: Vec<DamagePart>,
}

/// Everything handed to the dialog for one roll.
#[derive(Debug, Clone)]
pub struct DialogRequest<'a> {
    pub tree: &'a RollTree,
    pub formula: &'a str,
    pub contexts: &'a RollContext,
    pub candidates: &'a [RollMod],
    pub main_die: Option<&'a str>,
    pub config: DialogConfig<'a>,
    /// The selection used when the dialog is skipped.
    pub defaults: Selection,
}

pub trait SelectionDialog {
    fn show(&mut self, request: DialogRequest<'_>) -> Selection;
}

impl<F> SelectionDialog for F
where
    F: FnMut(DialogRequest<'_>) -> Selection,
{
    fn show(&mut self, request: DialogRequest<'_>) -> Selection {
        self(request)
    }
}

/// Accepts the defaults without asking anyone.
#[derive(Debug, Default, Copy, Clone)]
pub struct Headless;

impl SelectionDialog for Headless {
    fn show(&mut self, request: DialogRequest<'_>) -> Selection {
        request.defaults
    }
}
