mod dialog;
mod event;
mod node;
mod num;
mod options;
mod tree;

pub use dialog::{DialogConfig, DialogRequest, Headless, Selection, SelectionDialog};
pub use event::{BuiltRoll, RollEvent};
pub use node::{NodeId, Nodes, ResolvedFormula, RollNode, ROLLED_MODS};
pub use num::Number;
pub use options::{DialogButton, RollSettings, RollTreeOptions};
pub use tree::{PendingRoll, RollTree};
