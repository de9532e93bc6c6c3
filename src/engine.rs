//! Rule dispatch engine
//!
//! Walks the tree bottom-up. Every child is resolved before its parent, the
//! parent's type slots are seeded, its rule is chosen (a reserved-name rule
//! for the category if one exists, else the category's generic rule) and the
//! returned template is rendered against the children's text.

use crate::ast::{Category, Node, NodeId, Tree};
use crate::config::TranslatorConfig;
use crate::context::{Cx, Rule, RuleResult, State, Template};
use crate::diagnostics::DiagnosticKind;
use crate::error::CompileResult;
use crate::lattice::Datatype;
use crate::operators;
use crate::reserved::{self, Reserved};
use crate::statements;
use crate::unit::TranslationUnit;

/// Translates parsed trees into Armadillo statements
#[derive(Debug)]
pub struct Translator {
    state: State,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Self {
            state: State::new(TranslatorConfig::new()),
        }
    }

    pub fn with_config(config: TranslatorConfig) -> CompileResult<Self> {
        config.validate()?;
        Ok(Self {
            state: State::new(config),
        })
    }

    /// Declare the type of a variable, e.g. `declare("A", "mat")`
    pub fn declare(&mut self, name: &str, type_name: &str) -> CompileResult<()> {
        self.state.config.declare(name, type_name)
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.state.config
    }

    /// Translate a whole program
    ///
    /// Never fails: problems are reported as diagnostics on the returned unit
    /// and the affected statement renders as a best-effort fallback.
    pub fn translate(&mut self, tree: &mut Tree) -> TranslationUnit {
        let statements = match tree.root() {
            Some(root) if tree.node(root).category == Category::Block => self.block(tree, root),
            Some(root) => self.statement_lines(tree, root),
            None => Vec::new(),
        };

        let config = self.state.config.clone();
        let state = std::mem::replace(&mut self.state, State::new(config));
        log::debug!(
            "translated {} statements with {} diagnostics",
            statements.len(),
            state.diagnostics.len()
        );
        TranslationUnit {
            statements,
            diagnostics: state.diagnostics.into_vec(),
            includes: state.includes,
            suggestions: state.suggestions,
            uses_timer: state.timer.in_use(),
        }
    }

    /// Resolve one node and everything below it, returning its text
    pub fn resolve(&mut self, tree: &mut Tree, id: NodeId) -> CompileResult<String> {
        match tree.node(id).category {
            Category::Block => Ok(self.block(tree, id).join("\n")),
            Category::Function => {
                self.state.push_scope();
                let text = self.resolve_node(tree, id);
                self.state.pop_scope();
                text
            }
            _ => self.resolve_node(tree, id),
        }
    }

    fn resolve_node(&mut self, tree: &mut Tree, id: NodeId) -> CompileResult<String> {
        let children = tree.children(id).to_vec();
        let mut texts = Vec::with_capacity(children.len());
        for child in children {
            texts.push(self.resolve(tree, child)?);
        }

        seed(tree, id);
        let rule = dispatch(tree, id);
        let mut cx = Cx::new(tree, &mut self.state, id, texts);
        let template = rule(&mut cx)?;
        let texts = cx.into_texts();

        let node = tree.node(id);
        let text = render(node, &template, &texts);
        log::trace!("{:?} '{}' -> {}", node.category, node.label(), text);
        tree.node_mut(id).rendered = Some(text.clone());
        Ok(text)
    }

    /// Lines of one top-level statement that is not a block
    fn statement_lines(&mut self, tree: &mut Tree, id: NodeId) -> Vec<String> {
        let outer = self.state.take_pending();
        let result = self.resolve(tree, id);
        let mut lines = self.state.take_pending();
        self.state.restore_pending(outer);
        match result {
            Ok(text) => lines.extend(text.lines().map(str::to_string)),
            Err(err) => {
                log::debug!("statement {} failed: {}", id.index(), err);
                self.state.report(tree, id, err.diagnostic_kind(), err.to_string());
                lines = vec![format!("// error: {}", err)];
            }
        }
        lines
    }

    /// Statements of a block, each preceded by the temporaries it extracted
    fn block(&mut self, tree: &mut Tree, id: NodeId) -> Vec<String> {
        let children = tree.children(id).to_vec();
        let mut lines = Vec::new();
        for statement in children {
            lines.extend(self.statement_lines(tree, statement));
        }
        lines
    }
}

/// Operators start from the join of their operands; everything else from
/// the unresolved pair
fn seed(tree: &mut Tree, id: NodeId) {
    let (datatype, numeric) = {
        let arena: &Tree = tree;
        let node = arena.node(id);
        if node.category.is_operator() {
            let operands: Vec<&Node> = node.children.iter().map(|&c| arena.node(c)).collect();
            let datatype = Datatype::join_all(operands.iter().map(|c| c.datatype));
            let numeric = datatype.is_numeric() && operands.iter().all(|c| c.numeric);
            (datatype, numeric)
        } else {
            (Datatype::UNKNOWN, false)
        }
    };
    let node = tree.node_mut(id);
    node.datatype = datatype;
    node.numeric = numeric;
}

/// Reserved name selecting a specific rule for this node, if any
fn reserved_key(tree: &Tree, node: &Node) -> Option<Reserved> {
    if let Some(redirect) = node.redirect {
        return Some(redirect);
    }
    match node.category {
        Category::Var | Category::Get => Reserved::from_name(&node.name),
        Category::Assigns => node
            .children
            .last()
            .map(|&rhs| tree.node(rhs))
            .filter(|rhs| rhs.category == Category::Get)
            .and_then(|rhs| Reserved::from_name(&rhs.name)),
        _ => None,
    }
}

fn dispatch(tree: &Tree, id: NodeId) -> Rule {
    let node = tree.node(id);
    if let Some(name) = reserved_key(tree, node) {
        if let Some(rule) = reserved::rule(node.category, name) {
            log::debug!("node {} {:?} -> reserved rule '{}'", id.index(), node.category, name);
            return rule;
        }
    }
    match generic_rule(node.category) {
        Some(rule) => {
            log::debug!("node {} {:?} -> generic rule", id.index(), node.category);
            rule
        }
        None => unsupported,
    }
}

/// Generic rule of a category
pub fn generic_rule(category: Category) -> Option<Rule> {
    use Category::*;
    let rule: Rule = match category {
        Statement => statements::statement,
        Assign => statements::assign,
        Assigns => statements::assigns,
        Function => statements::function,
        Params | Returns => statements::names,
        Return => statements::return_,
        Break => statements::break_,
        Var => statements::var,
        Get | Set => statements::subscript,
        Int => statements::int,
        Float => statements::float,
        Imag => statements::imag,
        Str => statements::string,
        Matrix => statements::matrix,
        Row => statements::row,

        Add => operators::add,
        Sub => operators::sub,
        Mul => operators::mul,
        ElMul => operators::el_mul,
        RightDiv => operators::right_div,
        LeftDiv => operators::left_div,
        ElRightDiv => operators::el_right_div,
        ElLeftDiv => operators::el_left_div,
        Pow | ElPow => operators::power,
        Gt => operators::gt,
        Ge => operators::ge,
        Lt => operators::lt,
        Le => operators::le,
        Ne => operators::ne,
        Eq => operators::eq,
        AndAnd => operators::and_and,
        And => operators::and,
        OrOr => operators::or_or,
        Or => operators::or,
        Neg => operators::neg,
        Not => operators::not,
        Transpose => operators::transpose,
        CTranspose => operators::ctranspose,
        Paren => operators::paren,
        Range => operators::range,
        All => operators::all,
        End => operators::end,

        Block | Cell | Cget => return None,
    };
    Some(rule)
}

/// No rule at all: keep the node's name as an opaque token
fn unsupported(cx: &mut Cx<'_>) -> RuleResult {
    let label = cx.node().label();
    let message = format!("no translation rule for {:?}", cx.node().category);
    cx.report(DiagnosticKind::UnsupportedConstruct, message);
    Ok(Template::fixed(label))
}

/// Produce the text of a template
pub fn render(node: &Node, template: &Template, texts: &[String]) -> String {
    match template {
        Template::Fixed(text) => text.clone(),
        Template::Join {
            prefix,
            infix,
            suffix,
        } => format!("{}{}{}", prefix, texts.join(infix), suffix),
        Template::Format(pattern) => substitute(pattern, node, texts),
    }
}

fn placeholder(key: &str, node: &Node, texts: &[String]) -> Option<String> {
    match key {
        "name" => Some(node.name.clone()),
        "type" => Some(node.datatype.type_name().to_string()),
        "value" => node.value.clone(),
        _ => key.parse::<usize>().ok().and_then(|k| texts.get(k)).cloned(),
    }
}

/// Replace `%(key)s` placeholders; unknown keys are left in place
fn substitute(pattern: &str, node: &Node, texts: &[String]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("%(") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(")s") else {
            break;
        };
        out.push_str(&rest[..start]);
        match placeholder(&after[..end], node, texts) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::unit::Include;

    fn literal_node() -> Node {
        let mut tree = Tree::new();
        let id = tree.push_literal(Category::Int, "7");
        tree.node(id).clone()
    }

    #[test]
    fn test_substitute_positional_and_named() {
        let node = literal_node();
        let texts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(substitute("%(1)s + %(0)s", &node, &texts), "b + a");
        assert_eq!(substitute("v=%(value)s t=%(type)s", &node, &texts), "v=7 t=TYPE");
        assert_eq!(substitute("%(9)s|%(x", &node, &texts), "%(9)s|%(x");
    }

    #[test]
    fn test_render_join() {
        let node = literal_node();
        let texts = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let template = Template::join("f(", ", ", ")");
        assert_eq!(render(&node, &template, &texts), "f(x, y, z)");
    }

    #[test]
    fn test_every_category_but_cells_has_a_generic_rule() {
        assert!(generic_rule(Category::Mul).is_some());
        assert!(generic_rule(Category::End).is_some());
        assert!(generic_rule(Category::Cell).is_none());
        assert!(generic_rule(Category::Cget).is_none());
    }

    #[test]
    fn test_unsupported_construct_keeps_going() {
        let mut tree = parse("c = {1, 2}\nx = 3").unwrap();
        let unit = Translator::new().translate(&mut tree);
        assert_eq!(unit.statements, vec!["c = Cell ;", "x = 3 ;"]);
        let error = unit.errors().next().unwrap();
        assert_eq!(error.kind, DiagnosticKind::UnsupportedConstruct);
        assert_eq!(error.category, Category::Cell);
    }

    #[test]
    fn test_reserved_rule_preferred_over_generic() {
        let mut tree = parse("n = length(v)").unwrap();
        let mut translator = Translator::new();
        translator.declare("v", "vec").unwrap();
        let unit = translator.translate(&mut tree);
        assert_eq!(unit.code(), "n = v.n_elem ;");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut tree = parse("y = A(end, 1:2) * 2 + size(B, 1)").unwrap();
        let mut translator = Translator::new();
        translator.declare("A", "mat").unwrap();
        translator.declare("B", "mat").unwrap();
        translator.declare("y", "rowvec").unwrap();
        let root = tree.root().unwrap();

        let first = translator.resolve(&mut tree, root).unwrap();
        let types: Vec<Datatype> = tree.ids().map(|id| tree.node(id).datatype).collect();
        let second = translator.resolve(&mut tree, root).unwrap();
        let again: Vec<Datatype> = tree.ids().map(|id| tree.node(id).datatype).collect();

        assert_eq!(first, second);
        assert_eq!(types, again);
    }

    #[test]
    fn test_extraction_is_not_repeated_on_reresolve() {
        let mut tree = parse("n = prod(size(A))").unwrap();
        let mut translator = Translator::new();
        translator.declare("A", "mat").unwrap();
        let root = tree.root().unwrap();

        let first = translator.resolve(&mut tree, root).unwrap();
        let second = translator.resolve(&mut tree, root).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "urowvec _aux_urowvec_1 = {A.n_rows, A.n_cols} ;\nn = prod(_aux_urowvec_1) ;"
        );

        let unit = translator.translate(&mut tree);
        let temporaries: Vec<&String> = unit
            .suggestions
            .keys()
            .filter(|name| name.starts_with("_aux_urowvec_"))
            .collect();
        assert_eq!(temporaries, vec!["_aux_urowvec_1"]);
    }

    #[test]
    fn test_translator_resets_between_units() {
        let mut translator = Translator::new();
        let mut tree = parse("x = 1:3").unwrap();
        let unit = translator.translate(&mut tree);
        assert!(unit.includes.contains(&Include::Span));

        let mut tree = parse("y = 2").unwrap();
        let unit = translator.translate(&mut tree);
        assert!(unit.includes.is_empty());
        assert!(!unit.suggestions.contains_key("x"));
    }

    #[test]
    fn test_with_config_rejects_reserved_declaration() {
        let mut config = TranslatorConfig::new();
        config
            .declarations
            .insert("max".to_string(), "double".parse().unwrap());
        assert!(Translator::with_config(config).is_err());
    }
}
