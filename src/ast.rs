//! Abstract syntax tree for matrix scripts
//!
//! The tree is an arena: nodes own their children through [`NodeId`]
//! indices, and the parent index is a plain back-reference used to answer
//! context questions (enclosing subscript, enclosing function, logical group).

use serde::{Deserialize, Serialize};

use crate::lattice::Datatype;
use crate::reserved::Reserved;

/// Index of a node inside its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Syntactic role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Sequence of statements
    Block,
    /// Expression used as a statement: `f(x)`
    Statement,
    /// `x = expr`
    Assign,
    /// `[a, b] = expr`
    Assigns,
    /// `function [out] = name(params) ... end`
    Function,
    Params,
    Returns,
    Return,
    Break,

    /// Variable reference or bare call without parentheses
    Var,
    /// Subscript read or call: `A(i, j)`, `f(x)`
    Get,
    /// Subscript write: `A(i) = ...`
    Set,

    Int,
    Float,
    /// Imaginary literal: `2i`
    Imag,
    Str,
    /// Matrix literal `[...]`, children are rows
    Matrix,
    Row,
    /// Cell literal `{...}`
    Cell,
    /// Brace subscript `c{i}`
    Cget,

    Add,
    Sub,
    Mul,
    ElMul,
    RightDiv,
    LeftDiv,
    ElRightDiv,
    ElLeftDiv,
    Pow,
    ElPow,

    Gt,
    Ge,
    Lt,
    Le,
    Ne,
    Eq,
    AndAnd,
    And,
    OrOr,
    Or,

    Neg,
    Not,
    Transpose,
    CTranspose,

    /// `start:stop` or `start:step:stop`
    Range,
    /// A lone `:` inside a subscript
    All,
    /// `end` inside a subscript
    End,
    Paren,
}

impl Category {
    /// Reads or writes through a subscript
    pub fn is_subscript(self) -> bool {
        matches!(self, Category::Get | Category::Set)
    }

    /// Operators and parentheses whose type is seeded from their operands
    pub fn is_operator(self) -> bool {
        use Category::*;
        matches!(
            self,
            Add | Sub
                | Mul
                | ElMul
                | RightDiv
                | LeftDiv
                | ElRightDiv
                | ElLeftDiv
                | Pow
                | ElPow
                | Gt
                | Ge
                | Lt
                | Le
                | Ne
                | Eq
                | AndAnd
                | And
                | OrOr
                | Or
                | Neg
                | Not
                | Transpose
                | CTranspose
                | Paren
        )
    }

    /// Left-associative operators whose chains are flattened into one node
    pub fn is_nary(self) -> bool {
        use Category::*;
        matches!(
            self,
            Add | Sub
                | Mul
                | ElMul
                | RightDiv
                | LeftDiv
                | ElRightDiv
                | ElLeftDiv
                | Pow
                | ElPow
                | AndAnd
                | And
                | OrOr
                | Or
        )
    }

    /// Literal numbers
    pub fn is_number(self) -> bool {
        matches!(self, Category::Int | Category::Float)
    }
}

/// One AST element together with its inference slots
#[derive(Debug, Clone)]
pub struct Node {
    pub category: Category,
    /// Identifier text for variables, calls and functions
    pub name: String,
    /// Literal text for numbers and strings
    pub value: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,

    pub datatype: Datatype,
    pub numeric: bool,
    /// Declared-type hint for the surrounding declaration step
    pub suggest: Option<Datatype>,
    /// Rule to use instead of the one the category and name select
    pub redirect: Option<Reserved>,
    /// Text produced by the node's own rule
    pub rendered: Option<String>,
}

impl Node {
    fn new(category: Category, name: String, value: Option<String>) -> Self {
        Self {
            category,
            name,
            value,
            children: Vec::new(),
            parent: None,
            datatype: Datatype::UNKNOWN,
            numeric: false,
            suggest: None,
            redirect: None,
            rendered: None,
        }
    }

    /// Literal value as an integer, for constant folding
    pub fn int_value(&self) -> Option<i64> {
        match self.category {
            Category::Int => self.value.as_deref()?.parse().ok(),
            _ => None,
        }
    }

    /// Integer literal equal to `value`
    pub fn is_int_literal(&self, value: i64) -> bool {
        self.int_value() == Some(value)
    }

    /// Label used when a diagnostic or fallback has to name the node
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{:?}", self.category)
        } else {
            self.name.clone()
        }
    }
}

/// Arena holding every node of one translation unit
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node, adopting `children`
    pub fn push(
        &mut self,
        category: Category,
        name: impl Into<String>,
        children: Vec<NodeId>,
    ) -> NodeId {
        self.insert(Node::new(category, name.into(), None), children)
    }

    /// Create a literal node carrying `value`
    pub fn push_literal(&mut self, category: Category, value: impl Into<String>) -> NodeId {
        self.insert(Node::new(category, String::new(), Some(value.into())), Vec::new())
    }

    fn insert(&mut self, node: Node, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes[id.0].children = children;
        id
    }

    /// Append `child` to the end of `parent`'s children
    pub fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node id, in creation order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child(&self, id: NodeId, k: usize) -> Option<NodeId> {
        self.nodes[id.0].children.get(k).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Index of `id` among its parent's children
    pub fn position(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Parents of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Nearest ancestor that is not part of an arithmetic expression
    pub fn group(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|&a| {
            let category = self.node(a).category;
            !(category.is_operator() || matches!(category, Category::Range | Category::Row))
        })
    }

    /// Function definition containing `id`
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&a| self.node(a).category == Category::Function)
    }

    /// Find the first node of `category`, in creation order
    pub fn find(&self, category: Category) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.category == category)
            .map(NodeId)
    }
}
