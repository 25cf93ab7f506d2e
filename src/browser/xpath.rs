//! XPath 1.0 queries over a parsed HTML document.
//!
//! The whole expression language is supported: location paths over every
//! axis (with the `@`, `.`, `..` and `//` abbreviations), filter
//! expressions such as `(//td)[2]`, unions, the boolean, equality,
//! relational and arithmetic operators, and the core function library.
//!
//! The data model is the HTML one. Element and attribute names compare
//! case-insensitively, there are no namespace nodes, and processing
//! instructions never appear (the HTML parser turns them into comments).
//! No variables are bound, so a `$name` reference is a parse error.

use std::str::FromStr;

use scraper::{ElementRef, Html};
use thiserror::Error;

use super::normalize_space;

/// XPath failure. Positions are byte offsets into the expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    /// A character that cannot start any token.
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset.
        pos: usize,
    },
    /// A string literal without its closing quote.
    #[error("unterminated string literal starting at position {pos}")]
    UnterminatedLiteral {
        /// Byte offset of the opening quote.
        pos: usize,
    },
    /// A numeric literal that does not parse.
    #[error("invalid number at position {pos}")]
    InvalidNumber {
        /// Byte offset.
        pos: usize,
    },
    /// A token other than the one the grammar requires.
    #[error("expected {expected} at position {pos}")]
    Expected {
        /// What the parser was looking for.
        expected: &'static str,
        /// Byte offset.
        pos: usize,
    },
    /// The expression ended early.
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for.
        expected: &'static str,
    },
    /// Axis name that XPath does not define.
    #[error("unknown axis '{name}' at position {pos}")]
    UnknownAxis {
        /// Axis name as written.
        name: String,
        /// Byte offset.
        pos: usize,
    },
    /// Function name outside the core library.
    #[error("unknown function '{name}' at position {pos}")]
    UnknownFunction {
        /// Function name as written.
        name: String,
        /// Byte offset.
        pos: usize,
    },
    /// A function called with the wrong number of arguments.
    #[error("function '{name}' does not take {got} argument(s)")]
    Arity {
        /// Function name.
        name: &'static str,
        /// Number of arguments supplied.
        got: usize,
    },
    /// A `$name` reference.
    #[error("unbound variable '${name}' at position {pos}")]
    UnboundVariable {
        /// Variable name without the `$`.
        name: String,
        /// Byte offset.
        pos: usize,
    },
    /// An operand that must be a node-set evaluated to something else.
    #[error("{context} requires a node-set")]
    NotANodeSet {
        /// Where the node-set was required.
        context: &'static str,
    },
}

/// A compiled XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Compile `expr`.
    ///
    /// # Errors
    ///
    /// Returns an [`XPathError`] describing the first syntax error.
    pub fn parse(expr: &str) -> Result<Self, XPathError> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            tokens,
            cursor: 0,
        };
        let root = parser.parse_expr()?;
        if parser.peek().is_some() {
            return Err(parser.error("end of expression"));
        }
        Ok(Self {
            source: expr.to_string(),
            expr: root,
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `html` with the document as context node.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::NotANodeSet`] when a path step, filter, union
    /// or node-set function is applied to a number, string or boolean.
    pub fn evaluate<'a>(&self, html: &'a Html) -> Result<XPathValue<'a>, XPathError> {
        let evaluator = Evaluator { html };
        let ctx = Context {
            node: Item::Document,
            position: 1,
            size: 1,
        };
        Ok(match evaluator.eval(&self.expr, &ctx)? {
            Value::Nodes(items) => XPathValue::Nodes(
                items
                    .into_iter()
                    .map(|item| XPathNode::from_item(item, html))
                    .collect(),
            ),
            Value::Bool(b) => XPathValue::Boolean(b),
            Value::Num(n) => XPathValue::Number(n),
            Value::Str(s) => XPathValue::String(s),
        })
    }

    /// Nodes selected in `html`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::NotANodeSet`] if the expression does not
    /// evaluate to a node-set, or any [`XPath::evaluate`] error.
    pub fn select<'a>(&self, html: &'a Html) -> Result<Vec<XPathNode<'a>>, XPathError> {
        match self.evaluate(html)? {
            XPathValue::Nodes(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet { context: "select" }),
        }
    }
}

impl FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Result of evaluating an [`XPath`].
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue<'a> {
    /// Nodes in document order.
    Nodes(Vec<XPathNode<'a>>),
    /// Result of a boolean expression.
    Boolean(bool),
    /// Result of a numeric expression.
    Number(f64),
    /// Result of a string expression.
    String(String),
}

impl XPathValue<'_> {
    /// Whether the expression found something: a non-empty node-set, a true
    /// boolean, or any number or string (a single result).
    pub fn is_present(&self) -> bool {
        match self {
            Self::Nodes(nodes) => !nodes.is_empty(),
            Self::Boolean(b) => *b,
            Self::Number(_) | Self::String(_) => true,
        }
    }
}

/// A node selected by an [`XPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPathNode<'a> {
    /// The document root (`/`).
    Document {
        /// The `<html>` element.
        root: ElementRef<'a>,
    },
    /// An element.
    Element(ElementRef<'a>),
    /// An attribute.
    Attribute {
        /// Attribute name (lowercase for HTML).
        name: &'a str,
        /// Attribute value.
        value: &'a str,
    },
    /// A text node.
    Text(&'a str),
    /// A comment.
    Comment(&'a str),
}

impl<'a> XPathNode<'a> {
    fn from_item(item: Item<'a>, html: &'a Html) -> Self {
        match item {
            Item::Document => Self::Document {
                root: html.root_element(),
            },
            Item::Element(el) => Self::Element(el),
            Item::Attribute { name, value, .. } => Self::Attribute { name, value },
            Item::Text { text, .. } => Self::Text(text),
            Item::Comment { text, .. } => Self::Comment(text),
        }
    }

    /// XPath string-value: concatenated descendant text for elements and
    /// the document.
    pub fn string_value(&self) -> String {
        match self {
            Self::Document { root } => root.text().collect(),
            Self::Element(el) => el.text().collect(),
            Self::Attribute { value, .. } => (*value).to_string(),
            Self::Text(text) | Self::Comment(text) => (*text).to_string(),
        }
    }

    /// The element, if this node is one.
    pub fn as_element(&self) -> Option<ElementRef<'a>> {
        match self {
            Self::Element(el) => Some(*el),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfNode,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "namespace" => Self::Namespace,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfNode,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Comment,
    ProcessingInstruction,
    Node,
}

impl NodeTest {
    fn is_node_type(name: &str) -> bool {
        matches!(name, "comment" | "text" | "processing-instruction" | "node")
    }

    fn matches(&self, item: &Item<'_>, axis: Axis) -> bool {
        // Name tests select the axis' principal node type only.
        let principal = match item {
            Item::Attribute { .. } => axis == Axis::Attribute,
            Item::Element(_) => axis != Axis::Attribute,
            _ => false,
        };
        match (self, item) {
            (Self::Node, _) => true,
            (Self::Text, Item::Text { .. }) => true,
            (Self::Comment, Item::Comment { .. }) => true,
            (Self::Any, _) => principal,
            (Self::Name(n), Item::Element(el)) => {
                principal && el.value().name().eq_ignore_ascii_case(n)
            }
            (Self::Name(n), Item::Attribute { name, .. }) => {
                principal && name.eq_ignore_ascii_case(n)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Binding strength of the binary operators, loosest first.
const UNARY_LEVEL: u8 = 6;

fn binary_op(tok: &Tok) -> Option<(u8, BinaryOp)> {
    Some(match tok {
        Tok::Or => (0, BinaryOp::Or),
        Tok::And => (1, BinaryOp::And),
        Tok::Eq => (2, BinaryOp::Eq),
        Tok::NotEq => (2, BinaryOp::NotEq),
        Tok::Lt => (3, BinaryOp::Lt),
        Tok::Le => (3, BinaryOp::Le),
        Tok::Gt => (3, BinaryOp::Gt),
        Tok::Ge => (3, BinaryOp::Ge),
        Tok::Plus => (4, BinaryOp::Add),
        Tok::Minus => (4, BinaryOp::Sub),
        Tok::Multiply => (5, BinaryOp::Mul),
        Tok::Div => (5, BinaryOp::Div),
        Tok::Mod => (5, BinaryOp::Mod),
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Last,
    Position,
    Count,
    Id,
    LocalName,
    NamespaceUri,
    Name,
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Lang,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

const FUNCTIONS: &[(&str, Function)] = &[
    ("last", Function::Last),
    ("position", Function::Position),
    ("count", Function::Count),
    ("id", Function::Id),
    ("local-name", Function::LocalName),
    ("namespace-uri", Function::NamespaceUri),
    ("name", Function::Name),
    ("string", Function::String),
    ("concat", Function::Concat),
    ("starts-with", Function::StartsWith),
    ("contains", Function::Contains),
    ("substring-before", Function::SubstringBefore),
    ("substring-after", Function::SubstringAfter),
    ("substring", Function::Substring),
    ("string-length", Function::StringLength),
    ("normalize-space", Function::NormalizeSpace),
    ("translate", Function::Translate),
    ("boolean", Function::Boolean),
    ("not", Function::Not),
    ("true", Function::True),
    ("false", Function::False),
    ("lang", Function::Lang),
    ("number", Function::Number),
    ("sum", Function::Sum),
    ("floor", Function::Floor),
    ("ceiling", Function::Ceiling),
    ("round", Function::Round),
];

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        FUNCTIONS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, f)| f)
    }

    fn name(self) -> &'static str {
        FUNCTIONS
            .iter()
            .find(|(_, f)| *f == self)
            .map_or("unknown", |&(n, _)| n)
    }

    /// Minimum and maximum argument count; `None` means unbounded.
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Last | Self::Position | Self::True | Self::False => (0, Some(0)),
            Self::Count
            | Self::Id
            | Self::Boolean
            | Self::Not
            | Self::Lang
            | Self::Sum
            | Self::Floor
            | Self::Ceiling
            | Self::Round => (1, Some(1)),
            Self::LocalName
            | Self::NamespaceUri
            | Self::Name
            | Self::String
            | Self::StringLength
            | Self::NormalizeSpace
            | Self::Number => (0, Some(1)),
            Self::Concat => (2, None),
            Self::StartsWith | Self::Contains | Self::SubstringBefore | Self::SubstringAfter => {
                (2, Some(2))
            }
            Self::Substring => (2, Some(3)),
            Self::Translate => (3, Some(3)),
        }
    }

    fn accepts(self, got: usize) -> bool {
        let (min, max) = self.arity();
        got >= min && max.is_none_or(|max| got <= max)
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(LocationPath),
    /// A primary expression with predicates and/or a trailing relative path.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    ColonColon,
    /// `*` as a name test.
    Star,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `*` as multiplication.
    Multiply,
    And,
    Or,
    Div,
    Mod,
    Name(String),
    Literal(String),
    Number(f64),
    Variable(String),
}

impl Tok {
    /// Whether `*` and the names `and`, `or`, `div` and `mod` following this
    /// token are operators rather than name tests.
    fn allows_operator_after(&self) -> bool {
        !matches!(
            self,
            Self::At
                | Self::ColonColon
                | Self::LParen
                | Self::LBracket
                | Self::Comma
                | Self::Slash
                | Self::DoubleSlash
                | Self::Pipe
                | Self::Plus
                | Self::Minus
                | Self::Eq
                | Self::NotEq
                | Self::Lt
                | Self::Le
                | Self::Gt
                | Self::Ge
                | Self::Multiply
                | Self::And
                | Self::Or
                | Self::Div
                | Self::Mod
        )
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn tokenize(input: &str) -> Result<Vec<Token>, XPathError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let char_at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let collect = |from: usize, to: usize| -> String {
        chars
            .get(from..to)
            .unwrap_or_default()
            .iter()
            .map(|&(_, c)| c)
            .collect()
    };
    let name_end = |from: usize| -> usize {
        let mut end = from;
        while let Some(c) = char_at(end) {
            let axis_separator = c == ':' && char_at(end.saturating_add(1)) == Some(':');
            if !is_name_char(c) || axis_separator {
                break;
            }
            end = end.saturating_add(1);
        }
        end
    };

    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0usize;
    while let Some(&(pos, ch)) = chars.get(i) {
        let next = char_at(i.saturating_add(1));
        let operator = tokens
            .last()
            .is_some_and(|t| t.tok.allows_operator_after());
        let (tok, len) = match ch {
            c if c.is_whitespace() => {
                i = i.saturating_add(1);
                continue;
            }
            '/' if next == Some('/') => (Tok::DoubleSlash, 2),
            '/' => (Tok::Slash, 1),
            '[' => (Tok::LBracket, 1),
            ']' => (Tok::RBracket, 1),
            '(' => (Tok::LParen, 1),
            ')' => (Tok::RParen, 1),
            '@' => (Tok::At, 1),
            ',' => (Tok::Comma, 1),
            '|' => (Tok::Pipe, 1),
            '+' => (Tok::Plus, 1),
            '-' => (Tok::Minus, 1),
            '=' => (Tok::Eq, 1),
            '*' if operator => (Tok::Multiply, 1),
            '*' => (Tok::Star, 1),
            '!' if next == Some('=') => (Tok::NotEq, 2),
            '<' if next == Some('=') => (Tok::Le, 2),
            '<' => (Tok::Lt, 1),
            '>' if next == Some('=') => (Tok::Ge, 2),
            '>' => (Tok::Gt, 1),
            ':' if next == Some(':') => (Tok::ColonColon, 2),
            '.' if next == Some('.') => (Tok::DotDot, 2),
            '.' if !next.is_some_and(|c| c.is_ascii_digit()) => (Tok::Dot, 1),
            '"' | '\'' => {
                let body = i.saturating_add(1);
                let mut end = body;
                while char_at(end).is_some_and(|c| c != ch) {
                    end = end.saturating_add(1);
                }
                if char_at(end).is_none() {
                    return Err(XPathError::UnterminatedLiteral { pos });
                }
                let text = collect(body, end);
                (Tok::Literal(text), end.saturating_sub(i).saturating_add(1))
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = i;
                let mut seen_dot = false;
                while let Some(c) = char_at(end) {
                    if c == '.' && !seen_dot {
                        seen_dot = true;
                    } else if !c.is_ascii_digit() {
                        break;
                    }
                    end = end.saturating_add(1);
                }
                let n = collect(i, end)
                    .parse()
                    .map_err(|_| XPathError::InvalidNumber { pos })?;
                (Tok::Number(n), end.saturating_sub(i))
            }
            '$' => {
                let body = i.saturating_add(1);
                if !char_at(body).is_some_and(is_name_start) {
                    return Err(XPathError::UnexpectedChar { ch, pos });
                }
                let end = name_end(body);
                (Tok::Variable(collect(body, end)), end.saturating_sub(i))
            }
            c if is_name_start(c) => {
                let end = name_end(i);
                let name = collect(i, end);
                let tok = match name.as_str() {
                    "and" if operator => Tok::And,
                    "or" if operator => Tok::Or,
                    "div" if operator => Tok::Div,
                    "mod" if operator => Tok::Mod,
                    _ => Tok::Name(name),
                };
                (tok, end.saturating_sub(i))
            }
            other => return Err(XPathError::UnexpectedChar { ch: other, pos }),
        };
        tokens.push(Token { tok, pos });
        i = i.saturating_add(len);
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens
            .get(self.cursor.saturating_add(offset))
            .map(|t| &t.tok)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.cursor).map_or(0, |t| t.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor = self.cursor.saturating_add(1);
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.cursor = self.cursor.saturating_add(1);
            return true;
        }
        false
    }

    fn error(&self, expected: &'static str) -> XPathError {
        match self.tokens.get(self.cursor) {
            Some(token) => XPathError::Expected {
                expected,
                pos: token.pos,
            },
            None => XPathError::UnexpectedEnd { expected },
        }
    }

    fn expect(&mut self, tok: &Tok, expected: &'static str) -> Result<(), XPathError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Dot | Tok::DotDot | Tok::At | Tok::Star | Tok::Name(_))
        )
    }

    fn at_filter_start(&self) -> bool {
        match self.peek() {
            Some(Tok::Variable(_) | Tok::LParen | Tok::Literal(_) | Tok::Number(_)) => true,
            Some(Tok::Name(name)) => {
                self.peek_at(1) == Some(&Tok::LParen) && !NodeTest::is_node_type(name)
            }
            _ => false,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, XPathError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: u8) -> Result<Expr, XPathError> {
        if level >= UNARY_LEVEL {
            return self.parse_unary();
        }
        let tighter = level.saturating_add(1);
        let mut left = self.parse_binary(tighter)?;
        while let Some((op_level, op)) = self.peek().and_then(binary_op) {
            if op_level != level {
                break;
            }
            self.advance();
            let right = self.parse_binary(tighter)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        let mut left = self.parse_path_expr()?;
        while self.eat(&Tok::Pipe) {
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path_expr(&mut self) -> Result<Expr, XPathError> {
        if !self.at_filter_start() {
            if self.peek().is_none() {
                return Err(self.error("expression"));
            }
            return Ok(Expr::Path(self.parse_location_path()?));
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let mut steps = Vec::new();
        match self.peek() {
            Some(Tok::Slash) => {
                self.advance();
                self.parse_relative(&mut steps)?;
            }
            Some(Tok::DoubleSlash) => {
                self.advance();
                steps.push(Step::descendant_or_self());
                self.parse_relative(&mut steps)?;
            }
            _ => {}
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn parse_location_path(&mut self) -> Result<LocationPath, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Tok::Slash) => {
                self.advance();
                if self.at_step_start() {
                    self.parse_relative(&mut steps)?;
                }
                true
            }
            Some(Tok::DoubleSlash) => {
                self.advance();
                steps.push(Step::descendant_or_self());
                self.parse_relative(&mut steps)?;
                true
            }
            _ => {
                self.parse_relative(&mut steps)?;
                false
            }
        };
        Ok(LocationPath { absolute, steps })
    }

    fn parse_relative(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.parse_step()?);
        loop {
            match self.peek() {
                Some(Tok::Slash) => {
                    self.advance();
                    steps.push(self.parse_step()?);
                }
                Some(Tok::DoubleSlash) => {
                    self.advance();
                    steps.push(Step::descendant_or_self());
                    steps.push(self.parse_step()?);
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        let (axis, test) = match self.peek() {
            Some(Tok::Dot) => {
                self.advance();
                (Axis::SelfNode, NodeTest::Node)
            }
            Some(Tok::DotDot) => {
                self.advance();
                (Axis::Parent, NodeTest::Node)
            }
            Some(Tok::At) => {
                self.advance();
                (Axis::Attribute, self.parse_node_test()?)
            }
            Some(Tok::Name(name)) if self.peek_at(1) == Some(&Tok::ColonColon) => {
                let name = name.clone();
                let pos = self.position();
                let axis =
                    Axis::from_name(&name).ok_or(XPathError::UnknownAxis { name, pos })?;
                self.advance();
                self.advance();
                (axis, self.parse_node_test()?)
            }
            _ => (Axis::Child, self.parse_node_test()?),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.parse_predicates()?,
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Tok::LBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(&Tok::RBracket, "']'")?;
        }
        Ok(predicates)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        let error = self.error("node test");
        match self.advance().map(|t| t.tok) {
            Some(Tok::Star) => Ok(NodeTest::Any),
            Some(Tok::Name(name)) => {
                if !self.eat(&Tok::LParen) {
                    return Ok(NodeTest::Name(name.to_ascii_lowercase()));
                }
                let test = match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => {
                        // The target literal is accepted and has nothing to match.
                        if matches!(self.peek(), Some(Tok::Literal(_))) {
                            self.advance();
                        }
                        NodeTest::ProcessingInstruction
                    }
                    _ => return Err(error),
                };
                self.expect(&Tok::RParen, "')'")?;
                Ok(test)
            }
            _ => Err(error),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let pos = self.position();
        match self.peek() {
            Some(Tok::Variable(name)) => Err(XPathError::UnboundVariable {
                name: name.clone(),
                pos,
            }),
            Some(Tok::Literal(text)) => {
                let text = text.clone();
                self.advance();
                Ok(Expr::Literal(text))
            }
            Some(Tok::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Tok::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(Tok::Name(_)) => self.parse_call(),
            _ => Err(self.error("expression")),
        }
    }

    fn parse_call(&mut self) -> Result<Expr, XPathError> {
        let Some(Token {
            tok: Tok::Name(name),
            pos,
        }) = self.advance()
        else {
            return Err(self.error("function name"));
        };
        let function = Function::from_name(&name).ok_or(XPathError::UnknownFunction { name, pos })?;
        self.expect(&Tok::LParen, "'('")?;

        let mut args = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Tok::Comma) {
                    continue;
                }
                self.expect(&Tok::RParen, "')'")?;
                break;
            }
        }

        if !function.accepts(args.len()) {
            return Err(XPathError::Arity {
                name: function.name(),
                got: args.len(),
            });
        }
        Ok(Expr::Call(function, args))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item<'a> {
    Document,
    Element(ElementRef<'a>),
    Attribute {
        owner: ElementRef<'a>,
        index: usize,
        name: &'a str,
        value: &'a str,
    },
    Text {
        parent: ElementRef<'a>,
        index: usize,
        text: &'a str,
    },
    Comment {
        parent: ElementRef<'a>,
        index: usize,
        text: &'a str,
    },
}

impl<'a> Item<'a> {
    /// The element itself, or the element an attribute, text or comment
    /// belongs to.
    fn nearest_element(self) -> Option<ElementRef<'a>> {
        match self {
            Self::Document => None,
            Self::Element(el) => Some(el),
            Self::Attribute { owner, .. } => Some(owner),
            Self::Text { parent, .. } | Self::Comment { parent, .. } => Some(parent),
        }
    }
}

enum Value<'a> {
    Nodes(Vec<Item<'a>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl<'a> Value<'a> {
    fn into_nodes(self, context: &'static str) -> Result<Vec<Item<'a>>, XPathError> {
        match self {
            Self::Nodes(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet { context }),
        }
    }
}

struct Context<'a> {
    node: Item<'a>,
    position: usize,
    size: usize,
}

fn to_f64(n: usize) -> f64 {
    u32::try_from(n).map_or(f64::from(u32::MAX), f64::from)
}

/// XPath `round()`: halves round towards positive infinity.
fn round_half_up(n: f64) -> f64 {
    if n.is_finite() {
        (n + 0.5).floor()
    } else {
        n
    }
}

/// XPath `number()` of a string: optional sign, digits and one point,
/// surrounded by whitespace. Anything else is NaN.
fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = round_half_up(start);
    let end = length.map_or(f64::INFINITY, |len| first + round_half_up(len));
    s.chars()
        .zip(1_u32..)
        .filter(|&(_, at)| {
            let at = f64::from(at);
            at >= first && at < end
        })
        .map(|(c, _)| c)
        .collect()
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.chars().position(|f| f == c) {
            Some(at) => to.get(at).copied(),
            None => Some(c),
        })
        .collect()
}

/// Deduplicate and sort into document order.
fn document_order(mut items: Vec<Item<'_>>) -> Vec<Item<'_>> {
    items.sort_by_cached_key(order_key);
    items.dedup();
    items
}

/// Sibling indices from the document root; attributes sort before children.
fn order_key(item: &Item<'_>) -> Vec<usize> {
    let mut path = item.nearest_element().map(element_path).unwrap_or_default();
    match item {
        Item::Document | Item::Element(_) => {}
        Item::Attribute { index, .. } => path.extend([0, *index]),
        Item::Text { index, .. } | Item::Comment { index, .. } => {
            path.push(index.saturating_add(1));
        }
    }
    path
}

fn element_path(el: ElementRef<'_>) -> Vec<usize> {
    let mut path: Vec<usize> = std::iter::once(*el)
        .chain(el.ancestors())
        .map(|node| node.prev_siblings().count().saturating_add(1))
        .collect();
    path.reverse();
    path
}

struct Evaluator<'a> {
    html: &'a Html,
}

impl<'a> Evaluator<'a> {
    fn eval(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Value<'a>, XPathError> {
        Ok(match expr {
            Expr::Binary(op, left, right) => self.binary(*op, left, right, ctx)?,
            Expr::Negate(inner) => Value::Num(-self.number(&self.eval(inner, ctx)?)),
            Expr::Union(left, right) => {
                let mut nodes = self.eval(left, ctx)?.into_nodes("'|'")?;
                nodes.extend(self.eval(right, ctx)?.into_nodes("'|'")?);
                Value::Nodes(document_order(nodes))
            }
            Expr::Path(path) => {
                let start = if path.absolute {
                    Item::Document
                } else {
                    ctx.node
                };
                Value::Nodes(self.apply_steps(&path.steps, vec![start])?)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = document_order(
                    self.eval(primary, ctx)?
                        .into_nodes("a predicate or path step")?,
                );
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                if !steps.is_empty() {
                    nodes = self.apply_steps(steps, nodes)?;
                }
                Value::Nodes(nodes)
            }
            Expr::Literal(text) => Value::Str(text.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Call(function, args) => self.call(*function, args, ctx)?,
        })
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: &Context<'a>,
    ) -> Result<Value<'a>, XPathError> {
        let lhs = self.eval(left, ctx)?;
        Ok(match op {
            BinaryOp::Or => {
                Value::Bool(self.boolean(&lhs) || self.boolean(&self.eval(right, ctx)?))
            }
            BinaryOp::And => {
                Value::Bool(self.boolean(&lhs) && self.boolean(&self.eval(right, ctx)?))
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => Value::Bool(self.compare(op, &lhs, &self.eval(right, ctx)?)),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.number(&lhs);
                let b = self.number(&self.eval(right, ctx)?);
                Value::Num(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                })
            }
        })
    }

    fn apply_steps(&self, steps: &[Step], start: Vec<Item<'a>>) -> Result<Vec<Item<'a>>, XPathError> {
        let mut current = start;
        for step in steps {
            let mut next = Vec::new();
            for node in &current {
                // Reverse axes yield nearest first, so positions count outwards.
                let mut candidates: Vec<Item<'a>> = self
                    .axis(*node, step.axis)
                    .into_iter()
                    .filter(|candidate| step.test.matches(candidate, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            current = document_order(next);
        }
        Ok(current)
    }

    fn filter(&self, candidates: Vec<Item<'a>>, predicate: &Expr) -> Result<Vec<Item<'a>>, XPathError> {
        let size = candidates.len();
        let mut kept = Vec::with_capacity(size);
        for (node, position) in candidates.into_iter().zip(1_usize..) {
            let ctx = Context {
                node,
                position,
                size,
            };
            let holds = match self.eval(predicate, &ctx)? {
                Value::Num(n) => n == to_f64(position),
                value => self.boolean(&value),
            };
            if holds {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn axis(&self, node: Item<'a>, axis: Axis) -> Vec<Item<'a>> {
        match axis {
            Axis::Child => self.children(node),
            Axis::Descendant => self.descendants(node),
            Axis::DescendantOrSelf => {
                let mut all = vec![node];
                all.extend(self.descendants(node));
                all
            }
            Axis::SelfNode => vec![node],
            Axis::Parent => self.parent(node).into_iter().collect(),
            Axis::Ancestor => {
                std::iter::successors(self.parent(node), |n| self.parent(*n)).collect()
            }
            Axis::AncestorOrSelf => {
                std::iter::successors(Some(node), |n| self.parent(*n)).collect()
            }
            Axis::Attribute => match node {
                Item::Element(el) => el
                    .value()
                    .attrs()
                    .enumerate()
                    .map(|(index, (name, value))| Item::Attribute {
                        owner: el,
                        index,
                        name,
                        value,
                    })
                    .collect(),
                _ => Vec::new(),
            },
            Axis::FollowingSibling => self.siblings(node, true),
            Axis::PrecedingSibling => self.siblings(node, false),
            Axis::Following => self.following(node),
            Axis::Preceding => self.preceding(node),
            Axis::Namespace => Vec::new(),
        }
    }

    fn children(&self, node: Item<'a>) -> Vec<Item<'a>> {
        match node {
            Item::Document => vec![Item::Element(self.html.root_element())],
            Item::Element(el) => el
                .children()
                .enumerate()
                .filter_map(|(index, child)| {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        return Some(Item::Element(child_el));
                    }
                    let value = child.value();
                    if let Some(text) = value.as_text() {
                        return Some(Item::Text {
                            parent: el,
                            index,
                            text: &**text,
                        });
                    }
                    value.as_comment().map(|comment| Item::Comment {
                        parent: el,
                        index,
                        text: &**comment,
                    })
                })
                .collect(),
            Item::Attribute { .. } | Item::Text { .. } | Item::Comment { .. } => Vec::new(),
        }
    }

    fn descendants(&self, node: Item<'a>) -> Vec<Item<'a>> {
        let mut out = Vec::new();
        let mut stack = self.children(node);
        stack.reverse();
        while let Some(item) = stack.pop() {
            out.push(item);
            if let Item::Element(_) = item {
                let mut kids = self.children(item);
                kids.reverse();
                stack.extend(kids);
            }
        }
        out
    }

    fn parent(&self, node: Item<'a>) -> Option<Item<'a>> {
        match node {
            Item::Document => None,
            Item::Element(el) => el
                .parent()
                .map(|p| ElementRef::wrap(p).map_or(Item::Document, Item::Element)),
            Item::Attribute { owner, .. } => Some(Item::Element(owner)),
            Item::Text { parent, .. } | Item::Comment { parent, .. } => {
                Some(Item::Element(parent))
            }
        }
    }

    fn siblings(&self, node: Item<'a>, following: bool) -> Vec<Item<'a>> {
        if matches!(node, Item::Attribute { .. }) {
            return Vec::new();
        }
        let Some(parent) = self.parent(node) else {
            return Vec::new();
        };
        let all = self.children(parent);
        let Some(at) = all.iter().position(|sibling| *sibling == node) else {
            return Vec::new();
        };
        if following {
            all.into_iter().skip(at.saturating_add(1)).collect()
        } else {
            let mut before: Vec<Item<'a>> = all.into_iter().take(at).collect();
            before.reverse();
            before
        }
    }

    /// Everything after `node` in document order, excluding its descendants.
    fn following(&self, node: Item<'a>) -> Vec<Item<'a>> {
        let mut out = Vec::new();
        let mut start = node;
        if let Item::Attribute { owner, .. } = node {
            // An attribute precedes its owner's content.
            start = Item::Element(owner);
            out.extend(self.descendants(start));
        }
        for current in std::iter::successors(Some(start), |n| self.parent(*n)) {
            for sibling in self.siblings(current, true) {
                out.push(sibling);
                out.extend(self.descendants(sibling));
            }
        }
        out
    }

    /// Everything before `node` except its ancestors, nearest first.
    fn preceding(&self, node: Item<'a>) -> Vec<Item<'a>> {
        let start = match node {
            Item::Attribute { owner, .. } => Item::Element(owner),
            other => other,
        };
        let mut out = Vec::new();
        for current in std::iter::successors(Some(start), |n| self.parent(*n)) {
            for sibling in self.siblings(current, false) {
                let mut subtree = vec![sibling];
                subtree.extend(self.descendants(sibling));
                out.extend(subtree.into_iter().rev());
            }
        }
        out
    }

    fn call(&self, function: Function, args: &[Expr], ctx: &Context<'a>) -> Result<Value<'a>, XPathError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, ctx)?);
        }
        let mut args = values.into_iter();

        Ok(match function {
            Function::Last => Value::Num(to_f64(ctx.size)),
            Function::Position => Value::Num(to_f64(ctx.position)),
            Function::Count => {
                let nodes = self.node_arg(args.next(), ctx, "count()")?;
                Value::Num(to_f64(nodes.len()))
            }
            Function::Id => {
                let ids: Vec<String> = match args.next() {
                    Some(Value::Nodes(nodes)) => nodes
                        .iter()
                        .flat_map(|n| {
                            self.item_string(n)
                                .split_whitespace()
                                .map(str::to_string)
                                .collect::<Vec<_>>()
                        })
                        .collect(),
                    other => self
                        .string_arg(other, ctx)
                        .split_whitespace()
                        .map(str::to_string)
                        .collect(),
                };
                Value::Nodes(self.elements_with_ids(&ids))
            }
            Function::LocalName | Function::Name => {
                let nodes = self.node_arg(args.next(), ctx, "name()")?;
                Value::Str(
                    document_order(nodes)
                        .first()
                        .map(|n| self.item_name(n))
                        .unwrap_or_default(),
                )
            }
            Function::NamespaceUri => {
                self.node_arg(args.next(), ctx, "namespace-uri()")?;
                Value::Str(String::new())
            }
            Function::String => Value::Str(self.string_arg(args.next(), ctx)),
            Function::Concat => Value::Str(args.map(|v| self.string(&v)).collect()),
            Function::StartsWith => {
                let (s, prefix) = self.two_strings(args.next(), args.next(), ctx);
                Value::Bool(s.starts_with(&prefix))
            }
            Function::Contains => {
                let (s, needle) = self.two_strings(args.next(), args.next(), ctx);
                Value::Bool(s.contains(&needle))
            }
            Function::SubstringBefore => {
                let (s, sep) = self.two_strings(args.next(), args.next(), ctx);
                Value::Str(
                    s.split_once(&sep)
                        .map(|(before, _)| before.to_string())
                        .unwrap_or_default(),
                )
            }
            Function::SubstringAfter => {
                let (s, sep) = self.two_strings(args.next(), args.next(), ctx);
                Value::Str(
                    s.split_once(&sep)
                        .map(|(_, after)| after.to_string())
                        .unwrap_or_default(),
                )
            }
            Function::Substring => {
                let s = self.string_arg(args.next(), ctx);
                let start = self.number_arg(args.next(), ctx);
                let length = args.next().map(|v| self.number(&v));
                Value::Str(substring(&s, start, length))
            }
            Function::StringLength => {
                Value::Num(to_f64(self.string_arg(args.next(), ctx).chars().count()))
            }
            Function::NormalizeSpace => {
                Value::Str(normalize_space(&self.string_arg(args.next(), ctx)))
            }
            Function::Translate => {
                let s = self.string_arg(args.next(), ctx);
                let (from, to) = self.two_strings(args.next(), args.next(), ctx);
                Value::Str(translate(&s, &from, &to))
            }
            Function::Boolean => Value::Bool(args.next().is_some_and(|v| self.boolean(&v))),
            Function::Not => Value::Bool(!args.next().is_some_and(|v| self.boolean(&v))),
            Function::True => Value::Bool(true),
            Function::False => Value::Bool(false),
            Function::Lang => {
                let wanted = self.string_arg(args.next(), ctx);
                Value::Bool(self.lang_matches(ctx.node, &wanted))
            }
            Function::Number => Value::Num(self.number_arg(args.next(), ctx)),
            Function::Sum => {
                let nodes = self.node_arg(args.next(), ctx, "sum()")?;
                Value::Num(nodes.iter().map(|n| parse_number(&self.item_string(n))).sum())
            }
            Function::Floor => Value::Num(self.number_arg(args.next(), ctx).floor()),
            Function::Ceiling => Value::Num(self.number_arg(args.next(), ctx).ceil()),
            Function::Round => Value::Num(round_half_up(self.number_arg(args.next(), ctx))),
        })
    }

    /// A node-set argument, or the context node when it is omitted.
    fn node_arg(
        &self,
        value: Option<Value<'a>>,
        ctx: &Context<'a>,
        function: &'static str,
    ) -> Result<Vec<Item<'a>>, XPathError> {
        match value {
            Some(value) => value.into_nodes(function),
            None => Ok(vec![ctx.node]),
        }
    }

    /// A string argument, or the context node's string-value when omitted.
    fn string_arg(&self, value: Option<Value<'a>>, ctx: &Context<'a>) -> String {
        match value {
            Some(value) => self.string(&value),
            None => self.item_string(&ctx.node),
        }
    }

    fn number_arg(&self, value: Option<Value<'a>>, ctx: &Context<'a>) -> f64 {
        match value {
            Some(value) => self.number(&value),
            None => parse_number(&self.item_string(&ctx.node)),
        }
    }

    fn two_strings(
        &self,
        first: Option<Value<'a>>,
        second: Option<Value<'a>>,
        ctx: &Context<'a>,
    ) -> (String, String) {
        (self.string_arg(first, ctx), self.string_arg(second, ctx))
    }

    fn elements_with_ids(&self, ids: &[String]) -> Vec<Item<'a>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().id().is_some_and(|id| ids.iter().any(|w| w == id)))
            .map(Item::Element)
            .collect()
    }

    fn lang_matches(&self, node: Item<'a>, wanted: &str) -> bool {
        let Some(element) = node.nearest_element() else {
            return false;
        };
        let lang = std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .find_map(|el| el.value().attr("xml:lang").or_else(|| el.value().attr("lang")));
        lang.is_some_and(|lang| {
            let lang = lang.to_ascii_lowercase();
            let wanted = wanted.to_ascii_lowercase();
            lang == wanted
                || lang
                    .strip_prefix(&wanted)
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }

    fn compare(&self, op: BinaryOp, left: &Value<'a>, right: &Value<'a>) -> bool {
        let as_str = |item: &Item<'a>| Value::Str(self.item_string(item));
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let sx = as_str(x);
                b.iter().any(|y| self.compare_atomic(op, &sx, &as_str(y)))
            }),
            (Value::Nodes(a), Value::Bool(_)) => {
                self.compare_atomic(op, &Value::Bool(!a.is_empty()), right)
            }
            (Value::Bool(_), Value::Nodes(b)) => {
                self.compare_atomic(op, left, &Value::Bool(!b.is_empty()))
            }
            (Value::Nodes(a), other) => a.iter().any(|x| self.compare_atomic(op, &as_str(x), other)),
            (other, Value::Nodes(b)) => b.iter().any(|y| self.compare_atomic(op, other, &as_str(y))),
            _ => self.compare_atomic(op, left, right),
        }
    }

    fn compare_atomic(&self, op: BinaryOp, a: &Value<'a>, b: &Value<'a>) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = if matches!(a, Value::Bool(_)) || matches!(b, Value::Bool(_)) {
                    self.boolean(a) == self.boolean(b)
                } else if matches!(a, Value::Num(_)) || matches!(b, Value::Num(_)) {
                    self.number(a) == self.number(b)
                } else {
                    self.string(a) == self.string(b)
                };
                equal == (op == BinaryOp::Eq)
            }
            BinaryOp::Lt => self.number(a) < self.number(b),
            BinaryOp::Le => self.number(a) <= self.number(b),
            BinaryOp::Gt => self.number(a) > self.number(b),
            BinaryOp::Ge => self.number(a) >= self.number(b),
            _ => false,
        }
    }

    fn boolean(&self, value: &Value<'a>) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn number(&self, value: &Value<'a>) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string(other)),
        }
    }

    fn string(&self, value: &Value<'a>) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|node| self.item_string(node))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn item_string(&self, item: &Item<'a>) -> String {
        match item {
            Item::Document => self.html.root_element().text().collect(),
            Item::Element(el) => el.text().collect(),
            Item::Attribute { value, .. } => (*value).to_string(),
            Item::Text { text, .. } | Item::Comment { text, .. } => (*text).to_string(),
        }
    }

    fn item_name(&self, item: &Item<'a>) -> String {
        match item {
            Item::Element(el) => el.value().name().to_string(),
            Item::Attribute { name, .. } => (*name).to_string(),
            Item::Document | Item::Text { .. } | Item::Comment { .. } => String::new(),
        }
    }
}
