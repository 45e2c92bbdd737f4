//! Recursive-descent PromQL parser.
//!
//! Binary operators are handled by precedence climbing using
//! [`BinaryOp::precedence`]. Unary minus binds tighter than every binary
//! operator except `^`, so `-2 ^ 2` is `-(2 ^ 2)`. A sign directly in front of
//! a number literal is folded into the literal.

use crate::ast::{
    AggregateExpr, AtModifier, BinaryExpr, BinaryOp, Call, Cardinality, Expr, LabelMatcher, MatchOp,
    MatrixSelector, SubqueryExpr, UnaryExpr, UnaryOp, VectorMatching, VectorSelector, AGGREGATORS,
    PARAMETERIZED_AGGREGATORS,
};
use crate::error::{ExprError, Result};
use crate::lexer::{tokenize, Token, TokenKind};

/// Words that cannot start an expression.
const KEYWORDS: &[&str] = &[
    "and",
    "atan2",
    "bool",
    "by",
    "group_left",
    "group_right",
    "ignoring",
    "offset",
    "on",
    "or",
    "unless",
    "without",
];

/// Parses a PromQL expression.
///
/// # Errors
///
/// Returns `ExprError::Parse` if the input is not valid PromQL.
pub fn parse(input: &str) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let expr = parser.expr(0)?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error<T>(&self, reason: impl Into<String>) -> Result<T> {
        Err(ExprError::parse(self.peek().pos, reason))
    }

    fn unexpected<T>(&self) -> Result<T> {
        match &self.peek().kind {
            TokenKind::Eof => self.error("unexpected end of input"),
            kind => self.error(format!("unexpected {kind:?}")),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.peek_is(kind) {
            self.advance();
            Ok(())
        } else {
            self.unexpected()
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.peek_is(&TokenKind::Eof) {
            Ok(())
        } else {
            self.unexpected()
        }
    }

    fn expr(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;

        while let Some(op) = self.peek_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let return_bool = self.eat_keyword("bool");
            if return_bool && !op.is_comparison() {
                return self.error("bool modifier can only be used on comparison operators");
            }
            let matching = self.vector_matching()?;

            let next = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let rhs = self.expr(next)?;

            lhs = Expr::Binary(BinaryExpr {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                return_bool,
                matching,
            });
        }

        Ok(lhs)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        let op = match &self.peek().kind {
            TokenKind::Add => BinaryOp::Add,
            TokenKind::Sub => BinaryOp::Sub,
            TokenKind::Mul => BinaryOp::Mul,
            TokenKind::Div => BinaryOp::Div,
            TokenKind::Mod => BinaryOp::Mod,
            TokenKind::Pow => BinaryOp::Pow,
            TokenKind::Eql => BinaryOp::Eql,
            TokenKind::Neq => BinaryOp::Neq,
            TokenKind::Lss => BinaryOp::Lss,
            TokenKind::Lte => BinaryOp::Lte,
            TokenKind::Gtr => BinaryOp::Gtr,
            TokenKind::Gte => BinaryOp::Gte,
            TokenKind::Ident(word) => match word.to_ascii_lowercase().as_str() {
                "and" => BinaryOp::And,
                "or" => BinaryOp::Or,
                "unless" => BinaryOp::Unless,
                "atan2" => BinaryOp::Atan2,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn vector_matching(&mut self) -> Result<Option<VectorMatching>> {
        let on = if self.eat_keyword("on") {
            true
        } else if self.eat_keyword("ignoring") {
            false
        } else {
            if self.peek_keyword("group_left") || self.peek_keyword("group_right") {
                return self.error("group modifiers must follow on or ignoring");
            }
            return Ok(None);
        };
        let labels = self.label_list()?;

        let card = if self.eat_keyword("group_left") {
            Cardinality::ManyToOne
        } else if self.eat_keyword("group_right") {
            Cardinality::OneToMany
        } else {
            Cardinality::OneToOne
        };
        let include = if card != Cardinality::OneToOne && self.peek_is(&TokenKind::LeftParen) {
            self.label_list()?
        } else {
            Vec::new()
        };

        Ok(Some(VectorMatching {
            on,
            labels,
            card,
            include,
        }))
    }

    fn label_list(&mut self) -> Result<Vec<String>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut labels = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::RightParen => {
                    self.advance();
                    return Ok(labels);
                }
                TokenKind::Ident(label) => {
                    self.advance();
                    labels.push(label);
                }
                _ => return self.error("expected label name"),
            }
            if self.peek_is(&TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(&TokenKind::RightParen)?;
                return Ok(labels);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Add => UnaryOp::Plus,
            TokenKind::Sub => UnaryOp::Minus,
            _ => return self.postfix(),
        };
        self.advance();

        let operand = self.expr(BinaryOp::Pow.precedence())?;
        Ok(match (op, operand) {
            (UnaryOp::Minus, Expr::NumberLiteral(value)) => Expr::NumberLiteral(-value),
            (UnaryOp::Plus, Expr::NumberLiteral(value)) => Expr::NumberLiteral(value),
            (op, operand) => Expr::Unary(UnaryExpr {
                op,
                expr: Box::new(operand),
            }),
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.peek_is(&TokenKind::LeftBracket) {
                expr = self.range_or_subquery(expr)?;
            } else if self.peek_keyword("offset") {
                expr = self.offset(expr)?;
            } else if self.peek_is(&TokenKind::At) {
                expr = self.at(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn range_or_subquery(&mut self, expr: Expr) -> Result<Expr> {
        let open = self.advance();
        let range = self.duration()?;

        if self.peek_is(&TokenKind::Colon) {
            self.advance();
            let step = if matches!(self.peek().kind, TokenKind::Duration(_)) {
                Some(self.duration()?)
            } else {
                None
            };
            self.expect(&TokenKind::RightBracket)?;
            return Ok(Expr::Subquery(SubqueryExpr {
                expr: Box::new(expr),
                range,
                step,
                offset: None,
                at: None,
            }));
        }

        self.expect(&TokenKind::RightBracket)?;
        match expr {
            Expr::VectorSelector(selector) if selector.offset.is_none() && selector.at.is_none() => {
                Ok(Expr::MatrixSelector(MatrixSelector { selector, range }))
            }
            _ => Err(ExprError::parse(
                open.pos,
                "ranges only allowed for vector selectors",
            )),
        }
    }

    fn offset(&mut self, expr: Expr) -> Result<Expr> {
        let keyword = self.advance();
        let negative = self.peek_is(&TokenKind::Sub);
        if negative {
            self.advance();
        }
        let millis = self.duration()?;
        let millis = if negative { -millis } else { millis };

        match expr {
            Expr::VectorSelector(mut selector) if selector.offset.is_none() => {
                selector.offset = Some(millis);
                Ok(Expr::VectorSelector(selector))
            }
            Expr::MatrixSelector(mut matrix) if matrix.selector.offset.is_none() => {
                matrix.selector.offset = Some(millis);
                Ok(Expr::MatrixSelector(matrix))
            }
            Expr::Subquery(mut subquery) if subquery.offset.is_none() => {
                subquery.offset = Some(millis);
                Ok(Expr::Subquery(subquery))
            }
            _ => Err(ExprError::parse(
                keyword.pos,
                "offset modifier must follow a selector or a subquery",
            )),
        }
    }

    fn at(&mut self, expr: Expr) -> Result<Expr> {
        let marker = self.advance();
        let at = self.at_value()?;

        match expr {
            Expr::VectorSelector(mut selector) if selector.at.is_none() => {
                selector.at = Some(at);
                Ok(Expr::VectorSelector(selector))
            }
            Expr::MatrixSelector(mut matrix) if matrix.selector.at.is_none() => {
                matrix.selector.at = Some(at);
                Ok(Expr::MatrixSelector(matrix))
            }
            Expr::Subquery(mut subquery) if subquery.at.is_none() => {
                subquery.at = Some(at);
                Ok(Expr::Subquery(subquery))
            }
            _ => Err(ExprError::parse(
                marker.pos,
                "@ modifier must follow a selector or a subquery",
            )),
        }
    }

    /// Parses what follows `@`: signed Unix seconds, `start()` or `end()`.
    fn at_value(&mut self) -> Result<AtModifier> {
        let mut token = self.advance();
        let negative = token.kind == TokenKind::Sub;
        if negative || token.kind == TokenKind::Add {
            token = self.advance();
        }
        match token.kind {
            TokenKind::Number(seconds) => {
                let seconds = if negative { -seconds } else { seconds };
                let millis = (seconds * 1000.0).round();
                if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
                    return Err(ExprError::parse(
                        token.pos,
                        format!("timestamp out of bounds for @ modifier: {seconds}"),
                    ));
                }
                Ok(AtModifier::Timestamp(millis as i64))
            }
            TokenKind::Ident(name) if !negative && (name == "start" || name == "end") => {
                self.expect(&TokenKind::LeftParen)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(if name == "start" {
                    AtModifier::Start
                } else {
                    AtModifier::End
                })
            }
            _ => Err(ExprError::parse(
                token.pos,
                "@ modifier expects a timestamp, start() or end()",
            )),
        }
    }

    fn duration(&mut self) -> Result<i64> {
        match self.peek().kind {
            TokenKind::Duration(millis) => {
                self.advance();
                Ok(millis)
            }
            _ => self.error("expected duration"),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::LeftParen => {
                let inner = self.expr(0)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            TokenKind::Number(value) => Ok(Expr::NumberLiteral(value)),
            TokenKind::String(value) => Ok(Expr::StringLiteral(value)),
            TokenKind::LeftBrace => {
                let matchers = self.matchers()?;
                if matchers.is_empty() {
                    return Err(ExprError::parse(
                        token.pos,
                        "vector selector must contain at least one matcher",
                    ));
                }
                Ok(Expr::VectorSelector(VectorSelector {
                    name: None,
                    matchers,
                    ..VectorSelector::default()
                }))
            }
            TokenKind::Ident(name) => self.identifier(name, token.pos),
            TokenKind::Eof => Err(ExprError::parse(token.pos, "unexpected end of input")),
            other => Err(ExprError::parse(token.pos, format!("unexpected {other:?}"))),
        }
    }

    fn identifier(&mut self, name: String, pos: usize) -> Result<Expr> {
        let lower = name.to_ascii_lowercase();
        let call_follows = self.peek_is(&TokenKind::LeftParen);

        if AGGREGATORS.contains(&lower.as_str())
            && (call_follows || self.peek_keyword("by") || self.peek_keyword("without"))
        {
            return self.aggregate(lower);
        }
        if call_follows {
            self.advance();
            let args = self.args()?;
            return Ok(Expr::Call(Call { func: name, args }));
        }
        match lower.as_str() {
            "inf" => return Ok(Expr::NumberLiteral(f64::INFINITY)),
            "nan" => return Ok(Expr::NumberLiteral(f64::NAN)),
            word if KEYWORDS.contains(&word) => {
                return Err(ExprError::parse(pos, format!("unexpected keyword {name:?}")));
            }
            _ => {}
        }

        let matchers = if self.peek_is(&TokenKind::LeftBrace) {
            self.advance();
            self.matchers()?
        } else {
            Vec::new()
        };
        Ok(Expr::VectorSelector(VectorSelector {
            name: Some(name),
            matchers,
            ..VectorSelector::default()
        }))
    }

    /// Parses matchers after an opening brace, through the closing brace.
    fn matchers(&mut self) -> Result<Vec<LabelMatcher>> {
        let mut matchers = Vec::new();
        loop {
            if self.peek_is(&TokenKind::RightBrace) {
                self.advance();
                return Ok(matchers);
            }

            let name = match self.peek().kind.clone() {
                TokenKind::Ident(name) => name,
                _ => return self.error("expected label name"),
            };
            self.advance();

            let op = match self.peek().kind {
                TokenKind::Assign => MatchOp::Equal,
                TokenKind::Neq => MatchOp::NotEqual,
                TokenKind::EqlRegex => MatchOp::Regex,
                TokenKind::NeqRegex => MatchOp::NotRegex,
                _ => return self.error("expected label matching operator"),
            };
            self.advance();

            let value = match self.peek().kind.clone() {
                TokenKind::String(value) => value,
                _ => return self.error("expected label value string"),
            };
            self.advance();
            matchers.push(LabelMatcher { name, op, value });

            if self.peek_is(&TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(&TokenKind::RightBrace)?;
                return Ok(matchers);
            }
        }
    }

    /// Parses call arguments after an opening paren, through the closing paren.
    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek_is(&TokenKind::RightParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expr(0)?);
            if self.peek_is(&TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(&TokenKind::RightParen)?;
                return Ok(args);
            }
        }
    }

    fn grouping_keyword(&mut self) -> Option<bool> {
        if self.eat_keyword("by") {
            Some(false)
        } else if self.eat_keyword("without") {
            Some(true)
        } else {
            None
        }
    }

    fn aggregate(&mut self, op: String) -> Result<Expr> {
        let mut grouping = Vec::new();
        let mut without = false;
        let prefix = self.grouping_keyword();
        if let Some(is_without) = prefix {
            without = is_without;
            grouping = self.label_list()?;
        }

        self.expect(&TokenKind::LeftParen)?;
        let mut args = self.args()?;

        if prefix.is_none() {
            if let Some(is_without) = self.grouping_keyword() {
                without = is_without;
                grouping = self.label_list()?;
            }
        }

        let parameterized = PARAMETERIZED_AGGREGATORS.contains(&op.as_str());
        let expected = if parameterized { 2 } else { 1 };
        if args.len() != expected {
            return self.error(format!(
                "wrong number of arguments for aggregate expression provided, expected {expected}, got {}",
                args.len()
            ));
        }

        let expr = args.pop().map(Box::new);
        let param = if parameterized {
            args.pop().map(Box::new)
        } else {
            None
        };
        match expr {
            Some(expr) => Ok(Expr::Aggregate(AggregateExpr {
                op,
                expr,
                param,
                grouping,
                without,
            })),
            None => self.error("missing aggregation argument"),
        }
    }
}
