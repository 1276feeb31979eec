use super::dialog::{DialogConfig, DialogRequest, Selection, SelectionDialog};
use super::event::{BuiltRoll, RollEvent};
use super::node::{NodeId, Nodes, ResolvedFormula, RollNode, View};
use super::options::{RollSettings, RollTreeOptions};
use crate::common::*;
use crate::context::RollContext;
use crate::error::RollError;
use crate::i18n::{Catalogue, Localize, PART_INDEX};
use crate::modifier::{DamagePart, RollMod};
use crate::parse::{self, Piece};
use crate::RResult;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Builds roll formulas from a symbolic formula and a set of contexts.
///
/// A tree can be reused for any number of rolls, one at a time: the
/// [PendingRoll] returned by [RollTree::prepare] borrows the tree until it is
/// resolved, cancelled or dropped.
pub struct RollTree {
    options: RollTreeOptions,
    settings: RollSettings,
    i18n: Box<dyn Localize>,
    nodes: Nodes,
    root: Option<NodeId>,
    roll_mods: Vec<RollMod>,
}

impl fmt::Debug for RollTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollTree")
            .field("options", &self.options)
            .field("settings", &self.settings)
            .field("nodes", &self.nodes)
            .field("root", &self.root)
            .field("roll_mods", &self.roll_mods)
            .finish_non_exhaustive()
    }
}

impl Default for RollTree {
    fn default() -> Self {
        Self::new(RollTreeOptions::default())
    }
}

impl RollTree {
    pub fn new(options: RollTreeOptions) -> Self {
        Self {
            options,
            settings: RollSettings::default(),
            i18n: Box::new(Catalogue::english()),
            nodes: Nodes::default(),
            root: None,
            roll_mods: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: RollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_localizer(mut self, i18n: impl Localize + 'static) -> Self {
        self.i18n = Box::new(i18n);
        self
    }

    pub fn options(&self) -> &RollTreeOptions {
        &self.options
    }

    pub fn settings(&self) -> &RollSettings {
        &self.settings
    }

    /// The entry node of the most recent roll.
    pub fn root(&self) -> Option<&RollNode> {
        self.root.map(|id| &self.nodes[id])
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    /// Every modifier referenced by the most recent roll, one per name.
    pub fn roll_mods(&self) -> &[RollMod] {
        &self.roll_mods
    }

    /// Runs a whole roll: prepares it, asks `dialog` for a selection unless
    /// the tree skips the UI, and resolves it. Returns `false` if the roll
    /// was cancelled.
    pub fn build_roll<D, F>(
        &mut self,
        formula: &str,
        contexts: &mut RollContext,
        dialog: &mut D,
        callback: F,
    ) -> RResult<bool>
    where
        D: SelectionDialog + ?Sized,
        F: FnMut(RollEvent<'_>),
    {
        let pending = self.prepare(formula, contexts);
        let selection = if pending.tree.options.skip_ui {
            pending.default_selection()
        } else {
            if pending.tree.options.debug {
                debug!(candidates = ?pending.candidates(), "available modifiers");
            }
            dialog.show(pending.dialog_request())
        };
        pending.resolve(selection, callback)
    }

    /// First phase of a roll: applies selectors, replaces unresolvable
    /// variables with `0`, builds the node tree and gathers its modifiers.
    pub fn prepare<'a>(&'a mut self, formula: &str, contexts: &'a mut RollContext) -> PendingRoll<'a> {
        contexts.apply_selectors();
        let contexts: &'a RollContext = contexts;

        let formula = sanitize(formula, |variable| {
            RollNode::get_context_for_variable(variable, contexts).0.is_some()
        });
        self.populate(&formula, contexts);
        PendingRoll {
            tree: self,
            contexts,
            formula,
        }
    }

    /// Rebuilds the node tree for `formula` and the aggregated modifier list.
    pub fn populate(&mut self, formula: &str, contexts: &RollContext) {
        if self.options.debug {
            debug!(formula, ?contexts, "resolving formula");
        }

        let (nodes, root) = Nodes::new_root(formula);
        self.nodes = nodes;
        self.root = Some(root);
        self.roll_mods.clear();

        RollNode::populate(&mut self.nodes, root, contexts);

        let mut seen = HashSet::new();
        let mut roll_mods = Vec::new();
        for (_, node) in self.nodes.registered() {
            if let Some(m) = node.reference_modifier() {
                if seen.insert(m.name.clone()) {
                    roll_mods.push(m.clone());
                }
            }
            for m in node.calculated_mods() {
                if !seen.contains(&m.name) && !formula.contains(m.name.as_str()) {
                    seen.insert(m.name.clone());
                    roll_mods.push(m.clone());
                }
            }
        }
        self.roll_mods = roll_mods;
    }

    fn apply_selection(&mut self, selection: &Selection) {
        for m in &mut self.roll_mods {
            if let Some(&enabled) = selection.modifiers.get(&m.name) {
                m.enabled = enabled;
            }
        }
        // shadowed nodes too: the registry only keeps the last of equal fragments
        for node in self.nodes.iter_mut() {
            let enabled = match node.reference_modifier_mut() {
                Some(m) => {
                    if let Some(&enabled) = selection.modifiers.get(&m.name) {
                        m.enabled = enabled;
                    }
                    m.enabled
                }
                None => continue,
            };
            node.is_enabled = enabled;
        }
    }

    fn view(&self) -> View<'_> {
        View {
            nodes: &self.nodes,
            i18n: self.i18n.as_ref(),
        }
    }
}

/// Replaces every occurrence of each variable whose context cannot be found
/// with `0`. `has_context` is asked once per distinct variable.
fn sanitize(formula: &str, mut has_context: impl FnMut(&str) -> bool) -> String {
    let missing: HashSet<&str> = parse::variables(formula)
        .into_iter()
        .filter(|&variable| {
            let found = has_context(variable);
            if !found {
                warn!(variable, "cannot find context for variable, substituting with a 0");
            }
            !found
        })
        .collect();
    if missing.is_empty() {
        return formula.to_owned();
    }

    parse::scan(formula)
        .into_iter()
        .map(|piece| match piece {
            Piece::Variable(v) if missing.contains(v) => NEUTRAL,
            Piece::Text(s) | Piece::Variable(s) => s,
            Piece::DamageSection => DAMAGE_SECTION,
        })
        .collect()
}

/// A roll between its two phases, waiting for a [Selection].
#[derive(Debug)]
pub struct PendingRoll<'a> {
    tree: &'a mut RollTree,
    contexts: &'a RollContext,
    formula: String,
}

impl<'a> PendingRoll<'a> {
    /// The formula after unresolvable variables were replaced.
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn tree(&self) -> &RollTree {
        self.tree
    }

    pub fn candidates(&self) -> &[RollMod] {
        &self.tree.roll_mods
    }

    /// The selection used when no dialog is shown: the default button, the
    /// configured roll mode, no bonus and every damage section.
    pub fn default_selection(&self) -> Selection {
        let options = &self.tree.options;
        let parts = options
            .damage_sections()
            .into_iter()
            .map(|part| DamagePart { enabled: true, ..part })
            .collect();
        Selection {
            button: Some(options.default_button().to_owned()),
            roll_mode: self.tree.settings.roll_mode,
            bonus: None,
            parts,
            modifiers: Default::default(),
        }
    }

    pub fn dialog_request(&self) -> DialogRequest<'_> {
        let options = &self.tree.options;
        DialogRequest {
            tree: self.tree,
            formula: &self.formula,
            contexts: self.contexts,
            candidates: &self.tree.roll_mods,
            main_die: options.main_die.as_deref(),
            config: DialogConfig {
                buttons: &options.buttons,
                default_button: options.default_button.as_deref(),
                title: options.title.as_deref(),
                dialog_options: &options.dialog_options,
                parts: options.damage_sections(),
            },
            defaults: self.default_selection(),
        }
    }

    /// Abandons the roll, reporting the cancellation to `callback`.
    pub fn cancel<F: FnMut(RollEvent<'_>)>(self, mut callback: F) -> bool {
        info!(formula = %self.formula, "roll was cancelled");
        callback(RollEvent::Cancelled);
        false
    }

    /// Second phase of a roll: applies `selection` and emits one event per
    /// resulting section. Returns `false` if the selection cancels the roll.
    pub fn resolve<F: FnMut(RollEvent<'_>)>(self, selection: Selection, mut callback: F) -> RResult<bool> {
        let button = match &selection.button {
            Some(button) => button.clone(),
            None => return Ok(self.cancel(callback)),
        };
        self.validate(&selection)?;

        let tree = self.tree;
        tree.apply_selection(&selection);
        let tree: &RollTree = tree;
        let root = match tree.root() {
            Some(root) => root,
            None => return Ok(false),
        };
        let template = root.resolve_in(&tree.view(), 0);

        let bonus = selection.bonus.as_deref().map(str::trim).filter(|b| !b.is_empty());
        let enabled_parts: Vec<DamagePart> = selection.parts.into_iter().filter(|p| p.enabled).collect();
        let count = enabled_parts.len();

        let emit = |result: ResolvedFormula, part: Option<DamagePart>| {
            if tree.options.debug {
                debug!(formula = %self.formula, candidates = ?tree.roll_mods, ?result, "final roll results outcome");
            }
            BuiltRoll {
                button: &button,
                roll_mode: selection.roll_mode,
                result,
                part,
                root,
                roll_mods: &tree.roll_mods,
                bonus,
            }
        };

        if enabled_parts.is_empty() {
            let mut result = template;
            if result.has_section() {
                result.splice_section(NEUTRAL);
            }
            if let Some(bonus) = bonus {
                result.append_bonus(bonus, tree.i18n.as_ref());
            }
            callback(RollEvent::Built(emit(result, None)));
            return Ok(true);
        }

        for (index, mut part) in enabled_parts.into_iter().enumerate() {
            let mut section = template.clone();
            if section.has_section() {
                let formula = if part.formula.trim().is_empty() {
                    NEUTRAL
                } else {
                    part.formula.as_str()
                };
                if part.is_primary_section {
                    section.splice_section(formula);
                } else {
                    section = ResolvedFormula::uniform(formula);
                }
            }
            if let Some(bonus) = bonus {
                section.append_bonus(bonus, tree.i18n.as_ref());
            }
            if count > 1 {
                let (index, count) = ((index + 1).to_string(), count.to_string());
                let label = tree
                    .i18n
                    .format(PART_INDEX, &[("partIndex", index.as_str()), ("partCount", count.as_str())]);
                part.part_index = Some(label);
            }
            callback(RollEvent::Built(emit(section, Some(part))));
        }
        Ok(true)
    }

    fn validate(&self, selection: &Selection) -> RResult<()> {
        if let Some(name) = selection
            .modifiers
            .keys()
            .find(|name| !self.tree.roll_mods.iter().any(|m| &m.name == *name))
        {
            return Err(RollError::UnknownModifier(name.clone()));
        }
        let offered = self.tree.options.damage_sections().len();
        if selection.parts.len() > offered {
            return Err(RollError::UnknownPart(offered));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Value;
    use crate::modifier::RollMode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn contexts() -> RollContext {
        RollContext::from_value(json!({
            "allContexts": {
                "actor": {
                    "abilities": { "str": { "mod": 3 }, "dex": { "mod": 2 } },
                    "bonuses": {
                        "bless": { "name": "Bless", "modifier": "1d4" },
                        "bless2": { "name": "Bless", "modifier": "1d4 + 0" },
                        "flank": { "name": "Flanking", "modifier": "2" }
                    }
                }
            },
            "mainContext": "actor"
        }))
        .unwrap()
    }

    type Record = (String, RollMode, Option<ResolvedFormula>, Option<DamagePart>);

    fn run(tree: &mut RollTree, formula: &str, selection: Selection) -> (RResult<bool>, Vec<Record>) {
        let mut ctx = contexts();
        let mut events = vec![];
        let pending = tree.prepare(formula, &mut ctx);
        let ret = pending.resolve(selection, |e: RollEvent<'_>| {
            events.push((e.button().to_owned(), e.roll_mode(), e.result().cloned(), e.part().cloned()))
        });
        (ret, events)
    }

    fn known(ctx: &RollContext) -> impl FnMut(&str) -> bool + '_ {
        move |variable| ctx.get_context_for_variable(variable).0.is_some()
    }

    #[test]
    fn test_sanitize_every_occurrence() {
        let ctx = RollContext::new();
        assert_eq!(sanitize("@a + @a * @ab", known(&ctx)), "0 + 0 * 0");
        let ctx = RollContext::new().with_context("a", Value::from(1));
        assert_eq!(sanitize("@a + @b + @b.c + @b", known(&ctx)), "@a + 0 + 0 + 0");
    }

    #[test]
    fn test_sanitize_looks_up_each_variable_once() {
        let mut lookups = vec![];
        let ret = sanitize("@a + @a * @b", |variable: &str| {
            lookups.push(variable.to_owned());
            variable == "@a"
        });
        assert_eq!(ret, "@a + @a * 0");
        assert_eq!(lookups, vec!["@a", "@b"]);

        let mut lookups = 0;
        let ret = sanitize("1d20 + 4 <damageSection>", |_: &str| {
            lookups += 1;
            false
        });
        assert_eq!(ret, "1d20 + 4 <damageSection>");
        assert_eq!(lookups, 0);
    }

    #[test]
    fn test_populate_resets() {
        let mut tree = RollTree::default();
        let ctx = contexts();
        tree.populate("1d20 + @bonuses.bless", &ctx);
        assert_eq!(tree.roll_mods().len(), 1);
        assert_eq!(tree.nodes().len(), 2);

        tree.populate("1d20", &ctx);
        assert!(tree.roll_mods().is_empty());
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.root().map(RollNode::formula), Some("1d20"));
    }

    #[test]
    fn test_roll_mods_dedup_by_name() {
        let mut tree = RollTree::default();
        tree.populate("@bonuses.bless + @bonuses.bless2 + @bonuses.flank", &contexts());
        let names: Vec<_> = tree.roll_mods().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Bless", "Flanking"]);
    }

    #[test]
    fn test_calculated_mod_named_in_formula_is_skipped() {
        let mut ctx = contexts();
        if let Some(Value::Map(actor)) = ctx.all_contexts.get_mut("actor") {
            actor.insert("haste".into(), Value::from(vec![RollMod::new("Haste", "1")]));
            actor.insert("one".into(), Value::from("1"));
        }
        let mut tree = RollTree::default();

        // the plain "1" registered last replaces Haste's node, so Haste is
        // only known through the calculated mods of the root
        tree.populate("@haste + @one", &ctx);
        assert_eq!(tree.nodes().lookup("1").and_then(RollNode::reference_modifier), None);
        assert_eq!(tree.roll_mods(), &[RollMod::new("Haste", "1")]);

        tree.populate("@haste + @one [Haste]", &ctx);
        assert!(tree.roll_mods().is_empty());
    }

    #[test]
    fn test_shadowed_modifier_can_be_disabled() {
        let mut ctx = contexts();
        if let Some(Value::Map(actor)) = ctx.all_contexts.get_mut("actor") {
            actor.insert("haste".into(), Value::from(vec![RollMod::new("Haste", "1")]));
            actor.insert("one".into(), Value::from("1"));
        }
        let mut tree = RollTree::default();
        let mut results = vec![];
        let mut dialog = |request: DialogRequest<'_>| {
            assert_eq!(request.candidates, &[RollMod::new("Haste", "1")]);
            Selection::button("roll").with_modifier("Haste", false)
        };
        let ret = tree.build_roll("1d20 + @haste + @one", &mut ctx, &mut dialog, |e| {
            results.extend(e.result().cloned())
        });
        assert_eq!(ret, Ok(true));
        assert_eq!(
            results,
            vec![ResolvedFormula::new("1d20 + 0 + 1", "1d20 + 0[Haste (disabled)] + 1")]
        );
        assert!(tree.nodes().all().iter().filter_map(RollNode::reference_modifier).all(|m| !m.enabled));
    }

    #[test]
    fn test_selection_toggles_modifier() {
        let mut tree = RollTree::default();
        let (ret, events) = run(
            &mut tree,
            "1d20 + @bonuses.bless",
            Selection::button("roll").with_modifier("Bless", false),
        );
        assert_eq!(ret, Ok(true));
        assert_eq!(
            events[0].2,
            Some(ResolvedFormula::new("1d20 + 0", "1d20 + 0[Bless (disabled)]"))
        );
        assert!(!tree.roll_mods()[0].enabled);
    }

    #[test]
    fn test_unknown_modifier_rejected() {
        let mut tree = RollTree::default();
        let (ret, events) = run(&mut tree, "1d20", Selection::button("roll").with_modifier("Nope", true));
        assert_eq!(ret, Err(RollError::UnknownModifier("Nope".into())));
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_part_rejected() {
        let mut tree = RollTree::default();
        let selection = Selection::button("roll").with_parts(vec![DamagePart::primary("1d8")]);
        let (ret, _) = run(&mut tree, "<damageSection>", selection);
        assert_eq!(ret, Err(RollError::UnknownPart(0)));
    }

    #[test]
    fn test_cancel() {
        let mut tree = RollTree::default();
        let (ret, events) = run(&mut tree, "1d20", Selection::cancelled());
        assert_eq!(ret, Ok(false));
        assert_eq!(events, vec![("cancel".to_owned(), RollMode::None, None, None)]);
    }

    #[test]
    fn test_explicit_cancel() {
        let mut tree = RollTree::default();
        let mut ctx = contexts();
        let mut cancelled = 0;
        let pending = tree.prepare("1d20", &mut ctx);
        assert!(!pending.cancel(|e| {
            assert_eq!(e, RollEvent::Cancelled);
            cancelled += 1;
        }));
        assert_eq!(cancelled, 1);
    }

    #[test]
    fn test_leftover_placeholder_and_bonus() {
        let mut tree = RollTree::default();
        let (_, events) = run(&mut tree, "1d8 + <damageSection>", Selection::button("roll").with_bonus("4"));
        assert_eq!(
            events[0].2,
            Some(ResolvedFormula::new("1d8 + 0 +4", "1d8 + 0 +4[Additional Bonus]"))
        );
    }

    #[test]
    fn test_primary_and_secondary_sections() {
        let parts = vec![DamagePart::primary("1d8"), DamagePart::section("2d6")];
        let mut tree = RollTree::new(RollTreeOptions {
            parts: parts.clone(),
            ..RollTreeOptions::default()
        });
        let selection = Selection::button("roll").with_parts(parts).with_bonus("-2");
        let (ret, events) = run(&mut tree, "<damageSection> + @abilities.str.mod", selection);
        assert_eq!(ret, Ok(true));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].2.as_ref().map(|r| r.final_roll.as_str()), Some("1d8 + 3 -2"));
        assert_eq!(events[1].2.as_ref().map(|r| r.final_roll.as_str()), Some("2d6 -2"));
        assert_eq!(
            events[1].3.as_ref().and_then(|p| p.part_index.as_deref()),
            Some("Part 2 of 2")
        );
    }

    #[test]
    fn test_disabled_parts_are_skipped() {
        let mut secondary = DamagePart::section("2d6");
        secondary.enabled = false;
        let parts = vec![DamagePart::primary("1d8"), secondary];
        let mut tree = RollTree::new(RollTreeOptions {
            parts: parts.clone(),
            ..RollTreeOptions::default()
        });
        let (_, events) = run(&mut tree, "<damageSection>", Selection::button("roll").with_parts(parts));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].3.as_ref().and_then(|p| p.part_index.clone()), None);
        assert_eq!(events[0].2.as_ref().map(|r| r.final_roll.as_str()), Some("1d8"));
    }

    #[test]
    fn test_default_selection() {
        let mut options = RollTreeOptions::headless();
        options.parts = vec![
            DamagePart {
                enabled: false,
                ..DamagePart::primary("1d8")
            },
            DamagePart {
                is_damage_section: false,
                ..DamagePart::section("1")
            },
        ];
        let mut tree = RollTree::new(options).with_settings(RollSettings {
            roll_mode: RollMode::GmRoll,
        });
        let mut ctx = contexts();
        let pending = tree.prepare("1d20", &mut ctx);
        let selection = pending.default_selection();
        assert_eq!(selection.button.as_deref(), Some("roll"));
        assert_eq!(selection.roll_mode, RollMode::GmRoll);
        assert_eq!(selection.bonus, None);
        assert_eq!(selection.parts.len(), 1);
        assert!(selection.parts[0].enabled);
    }
}
