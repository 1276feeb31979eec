use super::node::{ResolvedFormula, RollNode};
use crate::modifier::{DamagePart, RollMod, RollMode};

/// Passed to the roll callback, once per emitted section or once on cancel.
#[derive(Debug, Clone, PartialEq)]
pub enum RollEvent<'a> {
    Cancelled,
    Built(BuiltRoll<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRoll<'a> {
    pub button: &'a str,
    pub roll_mode: RollMode,
    /// Owned by this event; sections never share a result.
    pub result: ResolvedFormula,
    /// The damage part this section was built from, if any.
    pub part: Option<DamagePart>,
    pub root: &'a RollNode,
    pub roll_mods: &'a [RollMod],
    pub bonus: Option<&'a str>,
}

impl RollEvent<'_> {
    pub const CANCEL_BUTTON: &'static str = "cancel";

    pub fn button(&self) -> &str {
        match self {
            Self::Cancelled => Self::CANCEL_BUTTON,
            Self::Built(b) => b.button,
        }
    }

    pub fn roll_mode(&self) -> RollMode {
        match self {
            Self::Cancelled => RollMode::None,
            Self::Built(b) => b.roll_mode,
        }
    }

    pub fn result(&self) -> Option<&ResolvedFormula> {
        match self {
            Self::Cancelled => None,
            Self::Built(b) => Some(&b.result),
        }
    }

    pub fn part(&self) -> Option<&DamagePart> {
        match self {
            Self::Cancelled => None,
            Self::Built(b) => b.part.as_ref(),
        }
    }
}
