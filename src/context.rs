//! Translation state and the context handed to every rule
//!
//! A rule sees its node through [`Cx`]: the rendered text of its children,
//! the resolved inference slots of any node below it, and the context links
//! above it. It may only write its own node's slots, with the narrow
//! exceptions exposed here (multi-value destinations, redirecting the
//! enclosing assignment).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ast::{Category, Node, NodeId, Tree};
use crate::config::TranslatorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::CompileResult;
use crate::lattice::{Datatype, Shape, StorageClass};
use crate::reserved::Reserved;
use crate::unit::Include;

/// Code template returned by a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// Complete text, no substitution
    Fixed(String),
    /// Child texts joined by `infix`, wrapped in `prefix` and `suffix`
    Join {
        prefix: String,
        infix: String,
        suffix: String,
    },
    /// `%(k)s` is the k-th child's text; `%(name)s`, `%(type)s` and
    /// `%(value)s` read the node itself
    Format(String),
}

impl Template {
    pub fn fixed(text: impl Into<String>) -> Self {
        Template::Fixed(text.into())
    }

    pub fn join(prefix: &str, infix: &str, suffix: &str) -> Self {
        Template::Join {
            prefix: prefix.to_string(),
            infix: infix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn format(pattern: impl Into<String>) -> Self {
        Template::Format(pattern.into())
    }
}

pub type RuleResult = CompileResult<Template>;

/// A translation rule
pub type Rule = fn(&mut Cx<'_>) -> RuleResult;

/// The process-wide wall clock used by `tic`/`toc`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallClock {
    started: bool,
    used: bool,
}

impl WallClock {
    /// Start or reset the timer
    pub fn tic(&mut self) {
        self.started = true;
        self.used = true;
    }

    /// Read the timer, returning whether it was started first
    pub fn toc(&mut self) -> bool {
        self.used = true;
        self.started
    }

    pub fn in_use(&self) -> bool {
        self.used
    }
}

/// Mutable state shared across one translation
#[derive(Debug, Default)]
pub struct State {
    pub config: TranslatorConfig,
    pub diagnostics: Diagnostics,
    pub includes: BTreeSet<Include>,
    pub suggestions: BTreeMap<String, Datatype>,
    pub timer: WallClock,
    scopes: Vec<HashMap<String, Datatype>>,
    /// Temporary name and defining statement per extracted node
    extracted: HashMap<NodeId, (String, String)>,
    pending: Vec<String>,
    counters: HashMap<&'static str, usize>,
}

impl State {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            config,
            scopes: vec![HashMap::new()],
            ..Self::default()
        }
    }

    /// Declared type first, then the innermost inferred one
    pub fn lookup(&self, name: &str) -> Option<Datatype> {
        if let Some(datatype) = self.config.declarations.get(name) {
            return Some(*datatype);
        }
        self.scopes.last().and_then(|scope| scope.get(name)).copied()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.config.declarations.contains_key(name)
    }

    /// Remember the type a variable was assigned
    pub fn record(&mut self, name: &str, datatype: Datatype) {
        if !datatype.is_known() || self.is_declared(name) {
            return;
        }
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        let merged = match scope.get(name) {
            Some(previous) if *previous != datatype => previous.join(datatype),
            _ => datatype,
        };
        scope.insert(name.to_string(), merged);
        self.suggestions.insert(name.to_string(), merged);
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Statements extracted while resolving the current statement
    pub fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    pub fn restore_pending(&mut self, pending: Vec<String>) {
        self.pending = pending;
    }

    fn temporary(&mut self, datatype: Datatype) -> String {
        let type_name = datatype.type_name();
        let counter = self.counters.entry(type_name).or_insert(0);
        *counter += 1;
        format!("{}_{}_{}", self.config.temp_prefix, type_name, counter)
    }

    pub fn report(&mut self, tree: &Tree, id: NodeId, kind: DiagnosticKind, message: impl Into<String>) {
        let node = tree.node(id);
        self.diagnostics.push(Diagnostic {
            severity: kind.severity(),
            kind,
            node: id,
            category: node.category,
            label: node.label(),
            message: message.into(),
        });
    }
}

/// What a rule can see and change
pub struct Cx<'a> {
    tree: &'a mut Tree,
    state: &'a mut State,
    id: NodeId,
    texts: Vec<String>,
}

impl<'a> Cx<'a> {
    pub fn new(tree: &'a mut Tree, state: &'a mut State, id: NodeId, texts: Vec<String>) -> Self {
        Self {
            tree,
            state,
            id,
            texts,
        }
    }

    pub fn into_texts(self) -> Vec<String> {
        self.texts
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &Tree {
        self.tree
    }

    pub fn node(&self) -> &Node {
        self.tree.node(self.id)
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.node().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn child_id(&self, k: usize) -> NodeId {
        self.node().children[k]
    }

    pub fn child(&self, k: usize) -> &Node {
        self.tree.node(self.child_id(k))
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> + '_ {
        let tree: &Tree = self.tree;
        tree.node(self.id).children.iter().map(move |&c| tree.node(c))
    }

    /// Rendered text of the k-th child
    pub fn text(&self, k: usize) -> &str {
        &self.texts[k]
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Rendered text of any already-resolved node
    pub fn rendered(&self, id: NodeId) -> String {
        let node = self.tree.node(id);
        node.rendered.clone().unwrap_or_else(|| node.label())
    }

    pub fn datatype(&self) -> Datatype {
        self.node().datatype
    }

    pub fn shape(&self) -> Shape {
        self.node().datatype.shape
    }

    pub fn class(&self) -> StorageClass {
        self.node().datatype.class
    }

    pub fn numeric(&self) -> bool {
        self.node().numeric
    }

    pub fn type_name(&self) -> &'static str {
        self.node().datatype.type_name()
    }

    /// Set the node's type; numeric-ness follows it
    pub fn set_datatype(&mut self, datatype: Datatype) {
        let node = self.tree.node_mut(self.id);
        node.datatype = datatype;
        node.numeric = datatype.is_numeric();
    }

    pub fn set_shape(&mut self, shape: Shape) {
        let datatype = self.datatype().with_shape(shape);
        self.set_datatype(datatype);
    }

    pub fn set_class(&mut self, class: StorageClass) {
        let datatype = self.datatype().with_class(class);
        self.set_datatype(datatype);
    }

    pub fn set_numeric(&mut self, numeric: bool) {
        self.tree.node_mut(self.id).numeric = numeric;
    }

    pub fn parent(&self) -> Option<&Node> {
        self.tree.parent(self.id).map(|p| self.tree.node(p))
    }

    pub fn parent_category(&self) -> Option<Category> {
        self.parent().map(|p| p.category)
    }

    pub fn group(&self) -> Option<&Node> {
        self.tree.group(self.id).map(|g| self.tree.node(g))
    }

    /// Type of a variable, declared or inferred
    pub fn lookup(&self, name: &str) -> Option<Datatype> {
        self.state.lookup(name)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Hint from the node itself, or from the variable it is assigned to
    pub fn assignment_hint(&self) -> Option<Datatype> {
        if let Some(hint) = self.node().suggest {
            return Some(hint);
        }
        let parent = self.tree.parent(self.id)?;
        let assign = self.tree.node(parent);
        if assign.category != Category::Assign || self.tree.position(self.id) != Some(1) {
            return None;
        }
        let target = self.tree.node(*assign.children.first()?);
        if target.category != Category::Var {
            return None;
        }
        self.lookup(&target.name)
    }

    /// Record a diagnostic against this node
    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let id = self.id;
        self.report_at(id, kind, message);
    }

    pub fn report_at(&mut self, id: NodeId, kind: DiagnosticKind, message: impl Into<String>) {
        self.state.report(self.tree, id, kind, message);
    }

    pub fn include(&mut self, include: Include) {
        self.state.includes.insert(include);
    }

    pub fn timer(&mut self) -> &mut WallClock {
        &mut self.state.timer
    }

    /// Remember the type assigned to a variable
    pub fn record_variable(&mut self, name: &str, datatype: Datatype) {
        self.state.record(name, datatype);
    }

    /// Type a multi-value destination and hint its declaration
    pub fn suggest_child(&mut self, k: usize, datatype: Datatype) {
        let id = self.child_id(k);
        let name = {
            let node = self.tree.node_mut(id);
            node.suggest = Some(datatype);
            node.datatype = datatype;
            node.numeric = datatype.is_numeric();
            node.name.clone()
        };
        if self.tree.node(id).category == Category::Var {
            self.state.record(&name, datatype);
        }
    }

    /// Make the enclosing node render through `rule` instead
    pub fn redirect_parent(&mut self, rule: Reserved) {
        if let Some(parent) = self.tree.parent(self.id) {
            self.tree.node_mut(parent).redirect = Some(rule);
        }
    }

    /// Hoist the k-th child into a temporary and use the temporary instead
    pub fn extract_child(&mut self, k: usize) -> String {
        let id = self.child_id(k);
        let name = self.extract_node(id);
        self.texts[k] = name.clone();
        name
    }

    /// Hoist any resolved node below this one into a temporary
    pub fn extract_node(&mut self, id: NodeId) -> String {
        let text = self.rendered(id);
        let datatype = self.tree.node(id).datatype;
        let name = self.extract(id, text, datatype);
        self.tree.node_mut(id).rendered = Some(name.clone());
        name
    }

    /// Hoist this node, computed as `text`, into a temporary
    pub fn extract_self(&mut self, text: String) -> String {
        let datatype = self.datatype();
        self.extract(self.id, text, datatype)
    }

    fn extract(&mut self, id: NodeId, text: String, datatype: Datatype) -> String {
        if let Some((name, definition)) = self.state.extracted.get(&id) {
            if !self.state.pending.contains(definition) {
                self.state.pending.push(definition.clone());
            }
            return name.clone();
        }
        let name = self.state.temporary(datatype);
        log::debug!("extracting node {} into {}", id.index(), name);
        let definition = format!("{} {} = {} ;", datatype.type_name(), name, text);
        self.state.pending.push(definition.clone());
        self.state.suggestions.insert(name.clone(), datatype);
        self.state.extracted.insert(id, (name.clone(), definition));
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_tracks_start() {
        let mut clock = WallClock::default();
        assert!(!clock.in_use());
        assert!(!clock.toc());
        clock.tic();
        assert!(clock.toc());
        assert!(clock.in_use());
    }

    #[test]
    fn test_record_joins_previous_inference() {
        let mut state = State::new(TranslatorConfig::new());
        state.record("x", Datatype::scalar(StorageClass::Int));
        state.record("x", Datatype::new(Shape::ColVec, StorageClass::Float));
        assert_eq!(
            state.lookup("x"),
            Some(Datatype::new(Shape::ColVec, StorageClass::Float))
        );
        assert_eq!(state.suggestions["x"].type_name(), "vec");
    }

    #[test]
    fn test_declared_type_wins_over_inference() {
        let mut config = TranslatorConfig::new();
        config.declare("y", "rowvec").unwrap();
        let mut state = State::new(config);
        state.record("y", Datatype::scalar(StorageClass::Float));
        assert_eq!(state.lookup("y").unwrap().type_name(), "rowvec");
        assert!(!state.suggestions.contains_key("y"));
    }

    #[test]
    fn test_scopes_are_isolated() {
        let mut state = State::new(TranslatorConfig::new());
        state.push_scope();
        state.record("z", Datatype::scalar(StorageClass::Float));
        assert!(state.lookup("z").is_some());
        state.pop_scope();
        assert!(state.lookup("z").is_none());
    }

    #[test]
    fn test_temporaries_count_per_type() {
        let mut state = State::new(TranslatorConfig::new());
        let urowvec = Datatype::new(Shape::RowVec, StorageClass::Uword);
        assert_eq!(state.temporary(urowvec), "_aux_urowvec_1");
        assert_eq!(state.temporary(urowvec), "_aux_urowvec_2");
        assert_eq!(state.temporary(Datatype::scalar(StorageClass::Float)), "_aux_double_1");
    }
}
