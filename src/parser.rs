//! Parser for matrix scripts
//!
//! Parses programs like:
//! - `C = A * B'`
//! - `[r, c] = size(A)`
//! - `x(2:end) = v(1:end-1) ./ 2`
//! - `function y = f(x) ... end`
//!
//! Same-operator chains of left-associative operators are flattened into one
//! n-ary node, so `a + b + c` becomes a single `Add` with three children.

use crate::ast::{Category, NodeId, Tree};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{tokenize, Spanned, Token};

/// Bracket kinds that change how whitespace is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    /// `[...]` and `{...}`: whitespace separates elements
    Concat,
    /// `(...)`: whitespace is insignificant
    Paren,
}

/// Statements the translator does not model
const CONTROL_FLOW: [&str; 9] = [
    "if", "elseif", "else", "for", "while", "switch", "case", "otherwise", "try",
];

/// Parse a program into a tree rooted at a `Block`
pub fn parse(source: &str) -> CompileResult<Tree> {
    Parser::new(source)?.parse_program()
}

/// Parser for matrix scripts
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    tree: Tree,
    groups: Vec<Group>,
}

impl Parser {
    pub fn new(source: &str) -> CompileResult<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            tree: Tree::new(),
            groups: Vec::new(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    /// Whitespace precedes the token `offset` ahead
    fn spaced_at(&self, offset: usize) -> bool {
        self.tokens
            .get(self.pos + offset)
            .map_or(false, |t| t.spaced)
    }

    /// Advance to the next token
    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches expected
    fn check(&self, expected: &Token) -> bool {
        match self.peek() {
            Some(token) => std::mem::discriminant(token) == std::mem::discriminant(expected),
            None => false,
        }
    }

    /// Consume the token if it matches, otherwise error
    fn expect(&mut self, expected: Token) -> CompileResult<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}'", expected)))
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let found = match self.tokens.get(self.pos) {
            Some(t) => format!("'{}' at position {}", t.token, t.span.start),
            None => "end of input".to_string(),
        };
        CompileError::parse_error(format!("{}, found {}", message.into(), found))
    }

    fn expect_ident(&mut self) -> CompileResult<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn in_concat(&self) -> bool {
        self.groups.last() == Some(&Group::Concat)
    }

    fn at_separator(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Semicolon | Token::Comma | Token::Newline)
        )
    }

    fn skip_separators(&mut self) {
        while self.at_separator() {
            self.advance();
        }
    }

    /// Parse a complete program
    pub fn parse_program(mut self) -> CompileResult<Tree> {
        let statements = self.parse_statements(false)?;
        if self.peek().is_some() {
            return Err(self.error("Unexpected token"));
        }
        let root = self.tree.push(Category::Block, "", statements);
        self.tree.set_root(root);
        Ok(self.tree)
    }

    /// Statements up to end of input, or up to `end`/`function` inside a
    /// function body
    fn parse_statements(&mut self, in_function: bool) -> CompileResult<Vec<NodeId>> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None => break,
                Some(Token::End | Token::Function) if in_function => break,
                Some(Token::End) => return Err(self.error("Unexpected 'end'")),
                _ => {}
            }
            statements.push(self.parse_statement()?);
            match self.peek() {
                None | Some(Token::Semicolon | Token::Comma | Token::Newline) => {}
                Some(Token::End | Token::Function) if in_function => {}
                _ => return Err(self.error("Expected end of statement")),
            }
        }
        Ok(statements)
    }

    /// Parse a single statement
    fn parse_statement(&mut self) -> CompileResult<NodeId> {
        match self.peek() {
            Some(Token::Function) => return self.parse_function(),
            Some(Token::Return) => {
                self.advance();
                return Ok(self.tree.push(Category::Return, "", vec![]));
            }
            Some(Token::Break) => {
                self.advance();
                return Ok(self.tree.push(Category::Break, "", vec![]));
            }
            Some(Token::LBracket) if self.is_multi_assignment() => {
                return self.parse_multi_assignment();
            }
            Some(Token::Ident(name)) => {
                if CONTROL_FLOW.contains(&name.as_str()) {
                    return Err(self.error(format!("Control flow '{}' is not supported", name)));
                }
                if self.is_command() {
                    return self.parse_command();
                }
            }
            _ => {}
        }

        let expr = self.parse_expr()?;
        if !self.check(&Token::Equals) {
            return Ok(self.tree.push(Category::Statement, "", vec![expr]));
        }

        // Assignment: the left side must be a variable or a subscript
        match self.tree.node(expr).category {
            Category::Var => {}
            Category::Get => self.tree.node_mut(expr).category = Category::Set,
            _ => return Err(self.error("Invalid assignment target")),
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(self.tree.push(Category::Assign, "", vec![expr, value]))
    }

    /// `[a, b] = ...`: the bracket closes right before a single `=`
    fn is_multi_assignment(&self) -> bool {
        let mut depth = 0usize;
        for (offset, spanned) in self.tokens[self.pos..].iter().enumerate() {
            match spanned.token {
                Token::LBracket | Token::LParen | Token::LBrace => depth += 1,
                Token::RBracket | Token::RParen | Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self.peek_at(offset + 1) == Some(&Token::Equals);
                    }
                }
                Token::Newline => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_multi_assignment(&mut self) -> CompileResult<NodeId> {
        self.expect(Token::LBracket)?;
        self.groups.push(Group::Concat);
        let mut targets = Vec::new();
        while !self.check(&Token::RBracket) {
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            let target = self.parse_postfix()?;
            match self.tree.node(target).category {
                Category::Var => {}
                Category::Get => self.tree.node_mut(target).category = Category::Set,
                _ => return Err(self.error("Invalid assignment target")),
            }
            targets.push(target);
        }
        self.groups.pop();
        self.expect(Token::RBracket)?;
        self.expect(Token::Equals)?;
        let value = self.parse_expr()?;
        targets.push(value);
        Ok(self.tree.push(Category::Assigns, "", targets))
    }

    /// Command syntax: `hold on`, `close all`
    fn is_command(&self) -> bool {
        matches!(self.peek_at(1), Some(Token::Ident(_)))
            && self.spaced_at(1)
            && !matches!(self.peek_at(2), Some(Token::Equals | Token::LParen))
    }

    fn parse_command(&mut self) -> CompileResult<NodeId> {
        let name = self.expect_ident()?;
        let mut words = Vec::new();
        while let Some(Token::Ident(word) | Token::Int(word)) = self.peek() {
            let word = word.clone();
            self.advance();
            words.push(self.tree.push_literal(Category::Str, word));
        }
        let call = self.tree.push(Category::Get, name, words);
        Ok(self.tree.push(Category::Statement, "", vec![call]))
    }

    /// `function [o1, o2] = name(p1, p2) ... end`
    fn parse_function(&mut self) -> CompileResult<NodeId> {
        self.expect(Token::Function)?;

        let mut outputs = Vec::new();
        if self.check(&Token::LBracket) {
            self.advance();
            while !self.check(&Token::RBracket) {
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                let name = self.expect_ident()?;
                outputs.push(self.tree.push(Category::Var, name, vec![]));
            }
            self.advance();
            self.expect(Token::Equals)?;
        } else if self.peek_at(1) == Some(&Token::Equals) {
            let name = self.expect_ident()?;
            outputs.push(self.tree.push(Category::Var, name, vec![]));
            self.advance();
        }

        let name = self.expect_ident()?;
        let mut params = Vec::new();
        if self.check(&Token::LParen) {
            self.advance();
            while !self.check(&Token::RParen) {
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                let param = self.expect_ident()?;
                params.push(self.tree.push(Category::Var, param, vec![]));
            }
            self.advance();
        }

        let statements = self.parse_statements(true)?;
        if self.check(&Token::End) {
            self.advance();
        }

        let params = self.tree.push(Category::Params, "", params);
        let returns = self.tree.push(Category::Returns, "", outputs);
        let body = self.tree.push(Category::Block, "", statements);
        Ok(self.tree.push(Category::Function, name, vec![params, returns, body]))
    }

    /// Parse an expression (handles operator precedence)
    pub fn parse_expr(&mut self) -> CompileResult<NodeId> {
        self.parse_oror()
    }

    /// Append `right` to `left` when `left` is the same n-ary operator,
    /// otherwise combine them into a new node
    fn chain(&mut self, category: Category, left: NodeId, right: NodeId) -> NodeId {
        if category.is_nary() && self.tree.node(left).category == category {
            self.tree.adopt(left, right);
            left
        } else {
            self.tree.push(category, "", vec![left, right])
        }
    }

    fn parse_binary(
        &mut self,
        operand: fn(&mut Self) -> CompileResult<NodeId>,
        operator: fn(&Token) -> Option<Category>,
    ) -> CompileResult<NodeId> {
        let mut left = operand(self)?;
        while let Some(category) = self.peek().and_then(operator) {
            // Inside brackets, `a -b` is two elements and `a - b` one
            let signed = matches!(self.peek(), Some(Token::Plus | Token::Minus));
            if signed && self.in_concat() && self.spaced_at(0) && !self.spaced_at(1) {
                break;
            }
            self.advance();
            let right = operand(self)?;
            left = self.chain(category, left, right);
        }
        Ok(left)
    }

    fn parse_oror(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_andand, |t| match t {
            Token::PipePipe => Some(Category::OrOr),
            _ => None,
        })
    }

    fn parse_andand(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_or, |t| match t {
            Token::AmpAmp => Some(Category::AndAnd),
            _ => None,
        })
    }

    fn parse_or(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_and, |t| match t {
            Token::Pipe => Some(Category::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_comparison, |t| match t {
            Token::Amp => Some(Category::And),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_range, |t| match t {
            Token::EqEq => Some(Category::Eq),
            Token::NotEq => Some(Category::Ne),
            Token::Less => Some(Category::Lt),
            Token::LessEq => Some(Category::Le),
            Token::Greater => Some(Category::Gt),
            Token::GreaterEq => Some(Category::Ge),
            _ => None,
        })
    }

    /// `start:stop` and `start:step:stop`
    fn parse_range(&mut self) -> CompileResult<NodeId> {
        let start = self.parse_additive()?;
        if !self.check(&Token::Colon) {
            return Ok(start);
        }
        self.advance();
        let mut bounds = vec![start, self.parse_additive()?];
        if self.check(&Token::Colon) {
            self.advance();
            bounds.push(self.parse_additive()?);
        }
        Ok(self.tree.push(Category::Range, "", bounds))
    }

    fn parse_additive(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(Category::Add),
            Token::Minus => Some(Category::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_unary, |t| match t {
            Token::Star => Some(Category::Mul),
            Token::Slash => Some(Category::RightDiv),
            Token::Backslash => Some(Category::LeftDiv),
            Token::DotStar => Some(Category::ElMul),
            Token::DotSlash => Some(Category::ElRightDiv),
            Token::DotBackslash => Some(Category::ElLeftDiv),
            _ => None,
        })
    }

    /// Parse unary expressions: -a, ~a, +a
    fn parse_unary(&mut self) -> CompileResult<NodeId> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.tree.push(Category::Neg, "", vec![operand]))
            }
            Some(Token::Tilde) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.tree.push(Category::Not, "", vec![operand]))
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    /// `a ^ b` and `a .^ b`; the exponent may carry its own sign
    fn parse_power(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(Self::parse_exponent, |t| match t {
            Token::Caret => Some(Category::Pow),
            Token::DotCaret => Some(Category::ElPow),
            _ => None,
        })
    }

    fn parse_exponent(&mut self) -> CompileResult<NodeId> {
        match self.peek() {
            Some(Token::Minus) if self.pos > 0 && self.is_after_power() => {
                self.advance();
                let operand = self.parse_postfix()?;
                Ok(self.tree.push(Category::Neg, "", vec![operand]))
            }
            _ => self.parse_postfix(),
        }
    }

    fn is_after_power(&self) -> bool {
        matches!(
            self.tokens.get(self.pos - 1).map(|t| &t.token),
            Some(Token::Caret | Token::DotCaret)
        )
    }

    /// Postfix subscripts and transposes: `A(i, j)`, `c{k}`, `a'`, `a.'`
    fn parse_postfix(&mut self) -> CompileResult<NodeId> {
        let mut expr = self.parse_primary()?;
        loop {
            let adjacent = !(self.in_concat() && self.spaced_at(0));
            match self.peek() {
                Some(Token::LParen) if adjacent && self.tree.node(expr).category == Category::Var => {
                    let arguments = self.parse_arguments(Token::RParen)?;
                    self.tree.node_mut(expr).category = Category::Get;
                    for argument in arguments {
                        self.tree.adopt(expr, argument);
                    }
                }
                Some(Token::LBrace) if adjacent && self.tree.node(expr).category == Category::Var => {
                    let arguments = self.parse_arguments(Token::RBrace)?;
                    self.tree.node_mut(expr).category = Category::Cget;
                    for argument in arguments {
                        self.tree.adopt(expr, argument);
                    }
                }
                Some(Token::Apostrophe) => {
                    self.advance();
                    expr = self.tree.push(Category::CTranspose, "", vec![expr]);
                }
                Some(Token::DotApostrophe) => {
                    self.advance();
                    expr = self.tree.push(Category::Transpose, "", vec![expr]);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Subscript or call arguments; a lone `:` selects a whole axis
    fn parse_arguments(&mut self, close: Token) -> CompileResult<Vec<NodeId>> {
        self.advance();
        self.groups.push(Group::Paren);
        let mut arguments = Vec::new();
        while !self.check(&close) {
            if self.peek().is_none() {
                return Err(self.error(format!("Expected '{}'", close)));
            }
            let whole_axis = self.check(&Token::Colon)
                && matches!(self.peek_at(1), Some(Token::Comma | Token::RParen | Token::RBrace));
            if whole_axis {
                self.advance();
                arguments.push(self.tree.push(Category::All, "", vec![]));
            } else {
                arguments.push(self.parse_expr()?);
            }
            if self.check(&Token::Comma) {
                self.advance();
            } else if !self.check(&close) {
                return Err(self.error("Expected ',' between arguments"));
            }
        }
        self.groups.pop();
        self.advance();
        Ok(arguments)
    }

    /// Parse primary expressions: literals, names, groups
    fn parse_primary(&mut self) -> CompileResult<NodeId> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("Expected expression"));
        };
        match token {
            Token::Int(value) => {
                self.advance();
                Ok(self.tree.push_literal(Category::Int, value))
            }
            Token::Float(value) => {
                self.advance();
                Ok(self.tree.push_literal(Category::Float, value))
            }
            Token::Imag(value) => {
                self.advance();
                Ok(self.tree.push_literal(Category::Imag, value))
            }
            Token::Str(value) => {
                self.advance();
                Ok(self.tree.push_literal(Category::Str, value))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(self.tree.push(Category::Var, name, vec![]))
            }
            Token::End => {
                self.advance();
                Ok(self.tree.push(Category::End, "", vec![]))
            }
            Token::LParen => {
                self.advance();
                self.groups.push(Group::Paren);
                let inner = self.parse_expr()?;
                self.groups.pop();
                self.expect(Token::RParen)?;
                Ok(self.tree.push(Category::Paren, "", vec![inner]))
            }
            Token::LBracket => self.parse_matrix(),
            Token::LBrace => self.parse_cell(),
            other => Err(self.error(format!("Unexpected token '{}'", other))),
        }
    }

    /// Rows of a `[...]` or `{...}` literal
    fn parse_rows(&mut self, close: Token) -> CompileResult<Vec<Vec<NodeId>>> {
        self.advance();
        self.groups.push(Group::Concat);
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error(format!("Expected '{}'", close))),
                Some(token) if *token == close => break,
                Some(Token::Semicolon | Token::Newline) => {
                    self.advance();
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                Some(Token::Comma) => {
                    self.advance();
                }
                _ => row.push(self.parse_expr()?),
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
        self.groups.pop();
        self.advance();
        Ok(rows)
    }

    /// Parse matrix literals: [1 2; 3 4], [a, b], []
    fn parse_matrix(&mut self) -> CompileResult<NodeId> {
        let rows = self.parse_rows(Token::RBracket)?;
        let rows = rows
            .into_iter()
            .map(|elements| self.tree.push(Category::Row, "", elements))
            .collect();
        Ok(self.tree.push(Category::Matrix, "", rows))
    }

    fn parse_cell(&mut self) -> CompileResult<NodeId> {
        let elements = self.parse_rows(Token::RBrace)?.concat();
        Ok(self.tree.push(Category::Cell, "", elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(tree: &Tree, k: usize) -> NodeId {
        let root = tree.root().unwrap();
        tree.children(root)[k]
    }

    fn categories(tree: &Tree, id: NodeId) -> Vec<Category> {
        tree.children(id)
            .iter()
            .map(|&c| tree.node(c).category)
            .collect()
    }

    #[test]
    fn test_simple_assignment() {
        let tree = parse("C = A * B").unwrap();
        let assign = statement(&tree, 0);
        assert_eq!(tree.node(assign).category, Category::Assign);
        assert_eq!(categories(&tree, assign), vec![Category::Var, Category::Mul]);
    }

    #[test]
    fn test_chains_are_flattened() {
        let tree = parse("x = a + b + c - d").unwrap();
        let sub = tree.child(statement(&tree, 0), 1).unwrap();
        assert_eq!(tree.node(sub).category, Category::Sub);
        let add = tree.child(sub, 0).unwrap();
        assert_eq!(tree.children(add).len(), 3);
    }

    #[test]
    fn test_precedence() {
        let tree = parse("x = -a ^ 2 + b * c'").unwrap();
        let add = tree.child(statement(&tree, 0), 1).unwrap();
        assert_eq!(categories(&tree, add), vec![Category::Neg, Category::Mul]);
        let mul = tree.child(add, 1).unwrap();
        assert_eq!(categories(&tree, mul), vec![Category::Var, Category::CTranspose]);
    }

    #[test]
    fn test_subscript_assignment() {
        let tree = parse("A(1, :) = v(2:end)").unwrap();
        let assign = statement(&tree, 0);
        let target = tree.child(assign, 0).unwrap();
        assert_eq!(tree.node(target).category, Category::Set);
        assert_eq!(categories(&tree, target), vec![Category::Int, Category::All]);
        let source = tree.child(assign, 1).unwrap();
        let range = tree.child(source, 0).unwrap();
        assert_eq!(categories(&tree, range), vec![Category::Int, Category::End]);
    }

    #[test]
    fn test_multi_assignment() {
        let tree = parse("[r, c] = size(A);").unwrap();
        let assigns = statement(&tree, 0);
        assert_eq!(tree.node(assigns).category, Category::Assigns);
        assert_eq!(
            categories(&tree, assigns),
            vec![Category::Var, Category::Var, Category::Get]
        );
    }

    #[test]
    fn test_matrix_whitespace_separation() {
        let tree = parse("x = [a -b; c - d]").unwrap();
        let matrix = tree.child(statement(&tree, 0), 1).unwrap();
        let rows = tree.children(matrix).to_vec();
        assert_eq!(tree.children(rows[0]).len(), 2);
        assert_eq!(tree.children(rows[1]).len(), 1);
    }

    #[test]
    fn test_function_definition() {
        let tree = parse("function [s, p] = f(a, b)\n  s = a + b;\n  p = a * b;\nend").unwrap();
        let function = statement(&tree, 0);
        let node = tree.node(function);
        assert_eq!(node.category, Category::Function);
        assert_eq!(node.name, "f");
        assert_eq!(
            categories(&tree, function),
            vec![Category::Params, Category::Returns, Category::Block]
        );
        let body = tree.child(function, 2).unwrap();
        assert_eq!(tree.children(body).len(), 2);
    }

    #[test]
    fn test_command_syntax() {
        let tree = parse("hold on").unwrap();
        let call = tree.child(statement(&tree, 0), 0).unwrap();
        assert_eq!(tree.node(call).name, "hold");
        assert_eq!(categories(&tree, call), vec![Category::Str]);
    }

    #[test]
    fn test_parent_links_after_subscript() {
        let tree = parse("y = A(end)").unwrap();
        let end = tree.find(Category::End).unwrap();
        let get = tree.parent(end).unwrap();
        assert_eq!(tree.node(get).category, Category::Get);
        assert_eq!(tree.node(get).name, "A");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse("x = (1 + 2"), Err(CompileError::ParseError { .. })));
        assert!(matches!(parse("for i = 1:3"), Err(CompileError::ParseError { .. })));
        assert!(matches!(parse("3 = x"), Err(CompileError::ParseError { .. })));
        assert!(matches!(parse("x = 1 2"), Err(CompileError::ParseError { .. })));
    }
}
