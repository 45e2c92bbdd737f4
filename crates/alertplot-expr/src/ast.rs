//! PromQL syntax tree.
//!
//! [`Expr`] is a closed enum over every expression form the parser accepts.
//! Its `Display` implementation prints the canonical text Prometheus itself
//! produces, which is what gets sent back to Prometheus as a chart formula.

use std::fmt;

use crate::lexer::format_duration;

/// A parsed PromQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal such as `5` or `0.95`.
    NumberLiteral(f64),
    /// A string literal.
    StringLiteral(String),
    /// An instant vector selector such as `up{job="api"}`.
    VectorSelector(VectorSelector),
    /// A range vector selector such as `up[5m]`.
    MatrixSelector(MatrixSelector),
    /// A subquery such as `rate(x[1m])[30m:1m]`.
    Subquery(SubqueryExpr),
    /// A function call such as `rate(x[5m])`.
    Call(Call),
    /// An aggregation such as `sum by (job) (x)`.
    Aggregate(AggregateExpr),
    /// A unary `+` or `-` applied to a non-literal expression.
    Unary(UnaryExpr),
    /// A binary operation.
    Binary(BinaryExpr),
    /// A parenthesized expression.
    Paren(Box<Expr>),
}

/// Label matching operators inside `{...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    Regex,
    /// `!~`
    NotRegex,
}

impl MatchOp {
    /// Returns the operator as written in PromQL.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Regex => "=~",
            Self::NotRegex => "!~",
        }
    }
}

/// A single `name op "value"` label matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelMatcher {
    /// Label name.
    pub name: String,
    /// Matching operator.
    pub op: MatchOp,
    /// Value or regular expression.
    pub value: String,
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op.as_str(), Quoted(&self.value))
    }
}

/// Double-quotes a string with escapes PromQL reads back unchanged.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\u{07}' => f.write_str("\\a")?,
                '\u{08}' => f.write_str("\\b")?,
                '\u{0c}' => f.write_str("\\f")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                '\u{0b}' => f.write_str("\\v")?,
                c if c.is_ascii_control() => write!(f, "\\x{:02x}", u32::from(c))?,
                c if c.is_control() => write!(f, "\\u{:04x}", u32::from(c))?,
                c => write!(f, "{c}")?,
            }
        }
        f.write_str("\"")
    }
}

/// The `@` modifier pinning evaluation to a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtModifier {
    /// `@ <unix seconds>`, held in milliseconds.
    Timestamp(i64),
    /// `@ start()`: the start of the range query.
    Start,
    /// `@ end()`: the end of the range query.
    End,
}

impl fmt::Display for AtModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(millis) => write!(f, "@ {:.3}", *millis as f64 / 1000.0),
            Self::Start => f.write_str("@ start()"),
            Self::End => f.write_str("@ end()"),
        }
    }
}

/// An instant vector selector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorSelector {
    /// Metric name, if given outside the braces.
    pub name: Option<String>,
    /// Label matchers inside the braces.
    pub matchers: Vec<LabelMatcher>,
    /// `offset` modifier in milliseconds.
    pub offset: Option<i64>,
    /// `@` modifier.
    pub at: Option<AtModifier>,
}

impl VectorSelector {
    fn fmt_without_modifiers(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or_default();
        if self.matchers.is_empty() {
            return f.write_str(name);
        }
        let mut matchers: Vec<String> = self.matchers.iter().map(ToString::to_string).collect();
        matchers.sort();
        write!(f, "{name}{{{}}}", matchers.join(","))
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_without_modifiers(f)?;
        fmt_modifiers(f, self.at, self.offset)
    }
}

/// A range vector selector.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSelector {
    /// The underlying selector, carrying any `offset` or `@`.
    pub selector: VectorSelector,
    /// Range in milliseconds.
    pub range: i64,
}

impl fmt::Display for MatrixSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.selector.fmt_without_modifiers(f)?;
        write!(f, "[{}]", format_duration(self.range))?;
        fmt_modifiers(f, self.selector.at, self.selector.offset)
    }
}

/// A subquery `expr[range:step]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpr {
    /// The inner expression.
    pub expr: Box<Expr>,
    /// Range in milliseconds.
    pub range: i64,
    /// Resolution step in milliseconds; the global default when absent.
    pub step: Option<i64>,
    /// `offset` modifier in milliseconds.
    pub offset: Option<i64>,
    /// `@` modifier.
    pub at: Option<AtModifier>,
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = self.step.map(format_duration).unwrap_or_default();
        write!(f, "{}[{}:{}]", self.expr, format_duration(self.range), step)?;
        fmt_modifiers(f, self.at, self.offset)
    }
}

fn fmt_modifiers(
    f: &mut fmt::Formatter<'_>,
    at: Option<AtModifier>,
    offset: Option<i64>,
) -> fmt::Result {
    if let Some(at) = at {
        write!(f, " {at}")?;
    }
    match offset {
        Some(millis) if millis != 0 => write!(f, " offset {}", format_duration(millis)),
        _ => Ok(()),
    }
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Function name.
    pub func: String,
    /// Arguments in order.
    pub args: Vec<Expr>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.func, join(&self.args))
    }
}

/// An aggregation over label dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    /// Aggregation operator, lowercased (`sum`, `topk`, ...).
    pub op: String,
    /// The aggregated expression.
    pub expr: Box<Expr>,
    /// Parameter of `topk`, `bottomk`, `quantile`, `count_values`, ...
    pub param: Option<Box<Expr>>,
    /// Grouping labels.
    pub grouping: Vec<String>,
    /// True for `without`, false for `by`.
    pub without: bool,
}

/// Aggregation operators that take a leading parameter.
pub(crate) const PARAMETERIZED_AGGREGATORS: &[&str] =
    &["bottomk", "count_values", "limit_ratio", "limitk", "quantile", "topk"];

/// All aggregation operators.
pub(crate) const AGGREGATORS: &[&str] = &[
    "avg",
    "bottomk",
    "count",
    "count_values",
    "group",
    "limit_ratio",
    "limitk",
    "max",
    "min",
    "quantile",
    "stddev",
    "stdvar",
    "sum",
    "topk",
];

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.op)?;
        if self.without {
            write!(f, " without ({}) ", self.grouping.join(", "))?;
        } else if !self.grouping.is_empty() {
            write!(f, " by ({}) ", self.grouping.join(", "))?;
        }
        match &self.param {
            Some(param) => write!(f, "({param}, {})", self.expr),
            None => write!(f, "({})", self.expr),
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
}

/// A unary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    /// The operator.
    pub op: UnaryOp,
    /// The operand.
    pub expr: Box<Expr>,
}

impl fmt::Display for UnaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        };
        write!(f, "{op}{}", self.expr)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `^`
    Pow,
    /// `atan2`
    Atan2,
    /// `==`
    Eql,
    /// `!=`
    Neq,
    /// `<`
    Lss,
    /// `<=`
    Lte,
    /// `>`
    Gtr,
    /// `>=`
    Gte,
    /// `and`
    And,
    /// `or`
    Or,
    /// `unless`
    Unless,
}

impl BinaryOp {
    /// Returns the operator as written in PromQL.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "^",
            Self::Atan2 => "atan2",
            Self::Eql => "==",
            Self::Neq => "!=",
            Self::Lss => "<",
            Self::Lte => "<=",
            Self::Gtr => ">",
            Self::Gte => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Unless => "unless",
        }
    }

    /// Binding strength; higher binds tighter.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And | Self::Unless => 2,
            Self::Eql | Self::Neq | Self::Lss | Self::Lte | Self::Gtr | Self::Gte => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod | Self::Atan2 => 5,
            Self::Pow => 6,
        }
    }

    /// Returns true for `^`, the only right-associative operator.
    #[must_use]
    pub const fn is_right_associative(&self) -> bool {
        matches!(self, Self::Pow)
    }

    /// Returns true for comparison operators.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eql | Self::Neq | Self::Lss | Self::Lte | Self::Gtr | Self::Gte
        )
    }

    /// Returns true for `and`, `or` and `unless`.
    #[must_use]
    pub const fn is_set_operator(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Unless)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How series on both sides of a binary operation are paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Plain one-to-one (or many-to-many for set operators).
    OneToOne,
    /// `group_left`
    ManyToOne,
    /// `group_right`
    OneToMany,
}

/// `on`/`ignoring` and `group_left`/`group_right` modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMatching {
    /// True for `on`, false for `ignoring`.
    pub on: bool,
    /// Labels listed in `on(...)`/`ignoring(...)`.
    pub labels: Vec<String>,
    /// Grouping cardinality.
    pub card: Cardinality,
    /// Extra labels listed in `group_left(...)`/`group_right(...)`.
    pub include: Vec<String>,
}

impl fmt::Display for VectorMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() && !self.on {
            return Ok(());
        }
        let tag = if self.on { "on" } else { "ignoring" };
        write!(f, " {tag} ({})", self.labels.join(", "))?;
        let side = match self.card {
            Cardinality::OneToOne => return Ok(()),
            Cardinality::ManyToOne => "left",
            Cardinality::OneToMany => "right",
        };
        write!(f, " group_{side} ({})", self.include.join(", "))
    }
}

/// A binary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    /// The operator.
    pub op: BinaryOp,
    /// Left operand.
    pub lhs: Box<Expr>,
    /// Right operand.
    pub rhs: Box<Expr>,
    /// `bool` modifier on comparisons.
    pub return_bool: bool,
    /// Vector matching modifiers, if any were written.
    pub matching: Option<VectorMatching>,
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.lhs, self.op)?;
        if self.return_bool {
            f.write_str(" bool")?;
        }
        if let Some(matching) = &self.matching {
            write!(f, "{matching}")?;
        }
        write!(f, " {}", self.rhs)
    }
}

impl Expr {
    /// Strips any number of enclosing parentheses.
    #[must_use]
    pub fn unparen(&self) -> &Self {
        let mut expr = self;
        while let Self::Paren(inner) = expr {
            expr = inner;
        }
        expr
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumberLiteral(value) => fmt_number(f, *value),
            Self::StringLiteral(value) => write!(f, "{}", Quoted(value)),
            Self::VectorSelector(selector) => write!(f, "{selector}"),
            Self::MatrixSelector(matrix) => write!(f, "{matrix}"),
            Self::Subquery(subquery) => write!(f, "{subquery}"),
            Self::Call(call) => write!(f, "{call}"),
            Self::Aggregate(aggregate) => write!(f, "{aggregate}"),
            Self::Unary(unary) => write!(f, "{unary}"),
            Self::Binary(binary) => write!(f, "{binary}"),
            Self::Paren(inner) => write!(f, "({inner})"),
        }
    }
}

fn fmt_number(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        f.write_str("NaN")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "Inf" } else { "-Inf" })
    } else {
        write!(f, "{value}")
    }
}

fn join(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
