//! Resolution of symbolic roll formulas such as `1d20 + @abilities.str.mod`
//! into plain arithmetic plus an annotated display formula.

pub mod common;
pub mod context;
mod error;
pub mod i18n;
pub mod modifier;
pub mod parse;
pub mod roll;

pub use context::{RollContext, Selector, Value};
pub use error::RollError;
pub use i18n::{Catalogue, Localize};
pub use modifier::{DamagePart, RollMod, RollMode};
pub use roll::{
    BuiltRoll, DialogButton, DialogRequest, Headless, PendingRoll, ResolvedFormula, RollEvent, RollNode, RollSettings,
    RollTree, RollTreeOptions, Selection, SelectionDialog,
};

pub type RResult<T> = Result<T, RollError>;

/// Resolves `formula` without showing a dialog: every damage section of
/// `options` is rolled and no bonus is added.
pub fn build_roll<F>(formula: &str, contexts: &mut RollContext, options: RollTreeOptions, callback: F) -> RResult<bool>
where
    F: FnMut(RollEvent<'_>),
{
    let mut tree = RollTree::new(RollTreeOptions {
        skip_ui: true,
        ..options
    });
    tree.build_roll(formula, contexts, &mut Headless, callback)
}
