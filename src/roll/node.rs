use crate::common::*;
use crate::context::{RollContext, Value};
use crate::i18n::{Localize, DISABLED_MODIFIER};
use crate::modifier::RollMod;
use crate::parse::{self, Piece};
use crate::roll::num::Number;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use tracing::{trace, warn};

/// Key of the list of toggleable modifiers a stat carries next to its value.
pub const ROLLED_MODS: &str = "rolledMods";

pub type NodeId = usize;

/// The two renderings of a resolved (sub)tree.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFormula {
    /// Plain arithmetic, ready for an evaluator.
    pub final_roll: String,
    /// Annotated for display, e.g. `1d20 + 3[Strength]`.
    pub formula: String,
}

impl ResolvedFormula {
    pub fn new(final_roll: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            final_roll: final_roll.into(),
            formula: formula.into(),
        }
    }

    pub fn uniform(s: impl Into<String>) -> Self {
        let s = s.into();
        Self::new(s.clone(), s)
    }

    /// Replaces the first damage-section placeholder in both renderings.
    pub fn splice_section(&mut self, section: &str) {
        self.final_roll = self.final_roll.replacen(DAMAGE_SECTION, section, 1);
        self.formula = self.formula.replacen(DAMAGE_SECTION, section, 1);
    }

    pub fn has_section(&self) -> bool {
        self.final_roll.contains(DAMAGE_SECTION)
    }

    /// Appends a flat bonus. A bonus without a leading operator is added.
    pub fn append_bonus(&mut self, bonus: &str, i18n: &dyn Localize) {
        let bonus = bonus.trim();
        let signed = if starts_with_operator(bonus) {
            bonus.to_owned()
        } else {
            format!("+{}", bonus)
        };
        self.final_roll.push(' ');
        self.final_roll.push_str(&signed);
        self.formula.push(' ');
        self.formula
            .push_str(&i18n.format(crate::i18n::ADDITIONAL_BONUS, &[("bonus", &signed)]));
    }
}

/// Everything a segment needs to render itself.
pub(crate) struct View<'a> {
    pub nodes: &'a Nodes,
    pub i18n: &'a dyn Localize,
}

#[enum_dispatch::enum_dispatch]
pub(crate) trait Render {
    fn render(&self, view: &View<'_>, depth: usize) -> ResolvedFormula;
}

/// One piece of a node's formula after population.
#[derive(Debug, Clone, PartialEq)]
#[enum_dispatch::enum_dispatch(Render)]
pub(crate) enum Segment {
    Literal(Literal),
    Inline(Inline),
    Child(Child),
    Group(Group),
    Placeholder(Placeholder),
}

/// Formula text copied through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Literal(String);

impl Render for Literal {
    fn render(&self, _: &View<'_>, _: usize) -> ResolvedFormula {
        ResolvedFormula::uniform(self.0.as_str())
    }
}

/// A scalar substituted in place of a variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Inline(Number);

impl Inline {
    fn neutral() -> Self {
        Self(Number::ZERO)
    }
}

impl Render for Inline {
    fn render(&self, _: &View<'_>, _: usize) -> ResolvedFormula {
        ResolvedFormula::uniform(self.0.to_string())
    }
}

/// A variable expanded into its own node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Child(NodeId);

impl Render for Child {
    fn render(&self, view: &View<'_>, depth: usize) -> ResolvedFormula {
        let node = &view.nodes[self.0];
        let ret = node.resolve_in(view, depth + 1);
        if node.reference_modifier.is_some() {
            // modifier nodes group their own value
            ret
        } else {
            ResolvedFormula::new(group(&ret.final_roll), group(&ret.formula))
        }
    }
}

/// Several expansions of one variable, summed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Group(NonEmpty<Segment>);

impl Render for Group {
    fn render(&self, view: &View<'_>, depth: usize) -> ResolvedFormula {
        if let [single] = &self.0[..] {
            return single.render(view, depth);
        }
        let parts: Vec<_> = self.0.iter().map(|s| s.render(view, depth)).collect();
        let final_roll = parts.iter().map(|p| p.final_roll.as_str()).collect::<Vec<_>>().join(" + ");
        let formula = parts.iter().map(|p| p.formula.as_str()).collect::<Vec<_>>().join(" + ");
        ResolvedFormula::new(group(&final_roll), group(&formula))
    }
}

/// The `<damageSection>` marker, left for the tree to splice.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placeholder;

impl Render for Placeholder {
    fn render(&self, _: &View<'_>, _: usize) -> ResolvedFormula {
        ResolvedFormula::uniform(DAMAGE_SECTION)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollNode {
    id: NodeId,
    formula: String,
    parent: Option<NodeId>,
    children: Vec<(String, NodeId)>,
    reference_modifier: Option<RollMod>,
    calculated_mods: Vec<RollMod>,
    pub(crate) is_enabled: bool,
    root: bool,
    segments: Vec<Segment>,
}

impl RollNode {
    fn new(id: NodeId, formula: String, parent: Option<NodeId>, reference_modifier: Option<RollMod>) -> Self {
        let is_enabled = reference_modifier.as_ref().map_or(true, |m| m.enabled);
        Self {
            id,
            formula,
            parent,
            children: Vec::new(),
            reference_modifier,
            calculated_mods: Vec::new(),
            is_enabled,
            root: false,
            segments: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes, keyed by the sub-formula each was expanded from.
    pub fn children(&self) -> &[(String, NodeId)] {
        &self.children
    }

    pub fn reference_modifier(&self) -> Option<&RollMod> {
        self.reference_modifier.as_ref()
    }

    pub(crate) fn reference_modifier_mut(&mut self) -> Option<&mut RollMod> {
        self.reference_modifier.as_mut()
    }

    pub fn calculated_mods(&self) -> &[RollMod] {
        &self.calculated_mods
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Static form of [RollContext::get_context_for_variable].
    pub fn get_context_for_variable<'a, 'v>(
        variable: &'v str,
        contexts: &'a RollContext,
    ) -> (Option<&'a Value>, &'v str) {
        contexts.get_context_for_variable(variable)
    }

    /// Expands the variables of node `id`, creating and registering a child
    /// node for every sub-formula and modifier it references.
    pub fn populate(nodes: &mut Nodes, id: NodeId, contexts: &RollContext) {
        Expander {
            nodes,
            contexts,
            discovered: Vec::new(),
        }
        .populate(id, 0)
    }

    /// Flattens this node and its children into a formula. A disabled node
    /// contributes `0`.
    pub fn resolve(&self, nodes: &Nodes, i18n: &dyn Localize, depth: usize) -> ResolvedFormula {
        self.resolve_in(&View { nodes, i18n }, depth)
    }

    pub(crate) fn resolve_in(&self, view: &View<'_>, depth: usize) -> ResolvedFormula {
        trace!(depth, formula = %self.formula, enabled = self.is_enabled, "resolving node");

        match &self.reference_modifier {
            Some(m) if !self.is_enabled => {
                let label = view.i18n.format(DISABLED_MODIFIER, &[("name", &m.name)]);
                ResolvedFormula::new(NEUTRAL, format!("{}[{}]", NEUTRAL, label))
            }
            Some(m) => {
                let inner = self.render_segments(view, depth);
                ResolvedFormula::new(
                    group(&inner.final_roll),
                    format!("{}[{}]", group(&inner.formula), m.name),
                )
            }
            None if !self.is_enabled => ResolvedFormula::uniform(NEUTRAL),
            None => self.render_segments(view, depth),
        }
    }

    fn render_segments(&self, view: &View<'_>, depth: usize) -> ResolvedFormula {
        self.segments
            .iter()
            .map(|s| s.render(view, depth))
            .fold(ResolvedFormula::default(), |mut acc, r| {
                acc.final_roll.push_str(&r.final_roll);
                acc.formula.push_str(&r.formula);
                acc
            })
    }
}

/// Node storage for one tree, plus the registry of nodes by formula fragment.
///
/// Registering a fragment that is already present replaces the earlier node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nodes {
    arena: Vec<RollNode>,
    registry: IndexMap<String, NodeId>,
}

impl Nodes {
    pub(crate) fn new_root(formula: &str) -> (Self, NodeId) {
        let mut nodes = Self::default();
        let mut root = RollNode::new(0, formula.to_owned(), None, None);
        root.root = true;
        nodes.arena.push(root);
        nodes.register(formula, 0);
        (nodes, 0)
    }

    fn push(&mut self, formula: String, parent: NodeId, modifier: Option<RollMod>) -> NodeId {
        let id = self.arena.len();
        self.arena.push(RollNode::new(id, formula, Some(parent), modifier));
        id
    }

    fn register(&mut self, fragment: &str, id: NodeId) {
        self.registry.insert(fragment.to_owned(), id);
    }

    pub fn get(&self, id: NodeId) -> Option<&RollNode> {
        self.arena.get(id)
    }

    /// Registered nodes keyed by the fragment they were expanded from.
    pub fn registered(&self) -> impl Iterator<Item = (&str, &RollNode)> + '_ {
        self.registry.iter().map(move |(k, &id)| (k.as_str(), &self.arena[id]))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RollNode> + '_ {
        self.arena.iter_mut()
    }

    pub fn lookup(&self, fragment: &str) -> Option<&RollNode> {
        self.registry.get(fragment).map(|&id| &self.arena[id])
    }

    /// Number of registered fragments.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Every node built, registered or not.
    pub fn all(&self) -> &[RollNode] {
        &self.arena
    }

    fn has_ancestor_formula(&self, id: NodeId, formula: &str) -> bool {
        let mut current = Some(id);
        while let Some(i) = current {
            if self.arena[i].formula == formula {
                return true;
            }
            current = self.arena[i].parent;
        }
        false
    }
}

impl Index<NodeId> for Nodes {
    type Output = RollNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.arena[id]
    }
}

impl IndexMut<NodeId> for Nodes {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.arena[id]
    }
}

struct Expander<'n, 'c> {
    nodes: &'n mut Nodes,
    contexts: &'c RollContext,
    discovered: Vec<RollMod>,
}

impl Expander<'_, '_> {
    fn populate(&mut self, id: NodeId, depth: usize) {
        let formula = self.nodes[id].formula.clone();
        let outer = std::mem::take(&mut self.discovered);

        let segments = parse::scan(&formula)
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(text) => Segment::Literal(Literal(text.to_owned())),
                Piece::DamageSection => Segment::Placeholder(Placeholder),
                Piece::Variable(variable) => self.expand_variable(id, variable, depth),
            })
            .collect();

        let node = &mut self.nodes[id];
        node.segments = segments;
        node.calculated_mods = std::mem::replace(&mut self.discovered, outer);
    }

    fn expand_variable(&mut self, id: NodeId, variable: &str, depth: usize) -> Segment {
        let contexts = self.contexts;
        let res = match contexts.resolve(variable) {
            Some(res) if res.is_complete() => res,
            Some(res) => {
                warn!(variable, remainder = res.remainder, "variable path not found, substituting with a 0");
                return Segment::Inline(Inline::neutral());
            }
            None => {
                warn!(variable, "cannot find context for variable, substituting with a 0");
                return Segment::Inline(Inline::neutral());
            }
        };

        let value = self.expand_value(id, variable, res.value, depth);
        let rolled: Vec<RollMod> = match (res.value, res.parent.and_then(|p| p.get(ROLLED_MODS))) {
            (Value::Number(_), Some(Value::List(mods))) => mods
                .iter()
                .filter_map(|m| match m {
                    Value::Modifier(m) => Some(m.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        if rolled.is_empty() {
            return value;
        }

        let mut items: NonEmpty<Segment> = vec1![value];
        for m in rolled {
            items.push(self.spawn_modifier(id, m, depth));
        }
        Segment::Group(Group(items))
    }

    fn expand_value(&mut self, id: NodeId, variable: &str, value: &Value, depth: usize) -> Segment {
        match value {
            Value::Number(x) => Segment::Inline(Inline(*x)),
            Value::Flag(b) => Segment::Inline(Inline(Number::Int(*b as Int))),
            Value::Formula(f) => self.spawn(id, f.clone(), None, depth),
            Value::Modifier(m) => self.spawn_modifier(id, m.clone(), depth),
            Value::List(items) => {
                let segments = items
                    .iter()
                    .map(|item| self.expand_value(id, variable, item, depth))
                    .collect();
                match NonEmpty::try_from_vec(segments) {
                    Ok(segments) => Segment::Group(Group(segments)),
                    Err(_) => Segment::Inline(Inline::neutral()),
                }
            }
            Value::Null => Segment::Inline(Inline::neutral()),
            Value::Map(_) => {
                warn!(variable, "variable names a context rather than a value, substituting with a 0");
                Segment::Inline(Inline::neutral())
            }
        }
    }

    fn spawn_modifier(&mut self, id: NodeId, m: RollMod, depth: usize) -> Segment {
        self.discovered.push(m.clone());
        let formula = m.modifier.clone();
        self.spawn(id, formula, Some(m), depth)
    }

    fn spawn(&mut self, parent: NodeId, formula: String, modifier: Option<RollMod>, depth: usize) -> Segment {
        if depth + 1 > MAX_DEPTH {
            warn!(formula = %formula, depth, "formula nested too deeply, substituting with a 0");
            return Segment::Inline(Inline::neutral());
        }
        if self.nodes.arena.len() >= MAX_NODES {
            warn!(formula = %formula, "formula expands to too many nodes, substituting with a 0");
            return Segment::Inline(Inline::neutral());
        }
        let recursive = !parse::variables(&formula).is_empty();
        if recursive && self.nodes.has_ancestor_formula(parent, &formula) {
            warn!(formula = %formula, "formula refers to itself, substituting with a 0");
            return Segment::Inline(Inline::neutral());
        }

        let child = self.nodes.push(formula.clone(), parent, modifier);
        self.nodes.register(&formula, child);
        self.nodes[parent].children.push((formula, child));
        self.populate(child, depth + 1);
        Segment::Child(Child(child))
    }
}
