//! Alerting expression decomposition.
//!
//! An alerting expression such as `rate(errors[5m]) > 0.1 and up == 1` is
//! broken down into one [`AlertingCondition`] per comparison leaf joined by
//! `and`. Every other shape contributes nothing.

use alertplot_core::{AlertingCondition, Direction};
use tracing::{debug, warn};

use crate::ast::{BinaryOp, Expr};
use crate::error::Result;
use crate::parser::parse;

/// The expression shapes decomposition distinguishes.
#[derive(Debug, Clone, Copy)]
enum Shape<'a> {
    Comparison {
        lhs: &'a Expr,
        op: BinaryOp,
        rhs: &'a Expr,
    },
    LogicalAnd {
        lhs: &'a Expr,
        rhs: &'a Expr,
    },
    Parenthesized(&'a Expr),
    Other,
}

impl<'a> Shape<'a> {
    fn of(expr: &'a Expr) -> Self {
        match expr {
            Expr::Paren(inner) => Self::Parenthesized(inner),
            Expr::Binary(binary) if binary.op == BinaryOp::And => Self::LogicalAnd {
                lhs: &binary.lhs,
                rhs: &binary.rhs,
            },
            Expr::Binary(binary) if binary.op.is_comparison() => Self::Comparison {
                lhs: &binary.lhs,
                op: binary.op,
                rhs: &binary.rhs,
            },
            _ => Self::Other,
        }
    }
}

/// Parses `expression` and returns its threshold conditions, left to right.
///
/// # Errors
///
/// Returns `ExprError::Parse` if `expression` is not valid PromQL.
pub fn decompose(expression: &str) -> Result<Vec<AlertingCondition>> {
    let expr = parse(expression)?;
    Ok(decompose_expr(&expr))
}

/// Returns the threshold conditions of an already parsed expression.
#[must_use]
pub fn decompose_expr(expr: &Expr) -> Vec<AlertingCondition> {
    let mut conditions = Vec::new();
    collect(expr, &mut conditions);
    conditions
}

fn collect(expr: &Expr, out: &mut Vec<AlertingCondition>) {
    match Shape::of(expr) {
        Shape::Parenthesized(inner) => collect(inner, out),
        Shape::LogicalAnd { lhs, rhs } => {
            collect(lhs, out);
            collect(rhs, out);
        }
        Shape::Comparison { lhs, op, rhs } => {
            if let Some(condition) = condition(lhs, op, rhs) {
                out.push(condition);
            }
        }
        Shape::Other => debug!(expr = %expr, "expression is not a comparison, skipping"),
    }
}

fn condition(lhs: &Expr, op: BinaryOp, rhs: &Expr) -> Option<AlertingCondition> {
    let Expr::NumberLiteral(threshold) = *rhs.unparen() else {
        warn!(rhs = %rhs, "comparison threshold is not a number literal, skipping");
        return None;
    };

    let direction = match op {
        BinaryOp::Lss | BinaryOp::Lte => Direction::Less,
        BinaryOp::Gtr | BinaryOp::Gte => Direction::Greater,
        other => {
            warn!(op = %other, "unsupported comparison operator, assuming >");
            Direction::Greater
        }
    };

    Some(AlertingCondition::new(lhs.to_string(), direction, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExprError;
    use test_case::test_case;

    fn single(expression: &str) -> AlertingCondition {
        let mut conditions = decompose(expression).unwrap();
        assert_eq!(conditions.len(), 1, "{expression}");
        conditions.remove(0)
    }

    #[test_case("x <= 5", "x", Direction::Less, 5.0 ; "less or equal")]
    #[test_case("x < 5", "x", Direction::Less, 5.0 ; "less")]
    #[test_case("x > 10", "x", Direction::Greater, 10.0 ; "greater")]
    #[test_case("x >= 10", "x", Direction::Greater, 10.0 ; "greater or equal")]
    #[test_case("x == 1", "x", Direction::Greater, 1.0 ; "equality falls back to greater")]
    #[test_case("x != 0", "x", Direction::Greater, 0.0 ; "inequality falls back to greater")]
    #[test_case("((x > 1))", "x", Direction::Greater, 1.0 ; "nested parens")]
    #[test_case("x > bool 1", "x", Direction::Greater, 1.0 ; "bool modifier")]
    #[test_case("x < -3.5", "x", Direction::Less, -3.5 ; "negative threshold")]
    #[test_case("x > (2)", "x", Direction::Greater, 2.0 ; "parenthesized threshold")]
    #[test_case("x > 1e3", "x", Direction::Greater, 1000.0 ; "exponent threshold")]
    #[test_case(
        "sum by (job) (rate(http_errors_total{code=~\"5..\"}[5m])) / sum by (job) (rate(http_requests_total[5m])) > 0.05",
        "sum by (job) (rate(http_errors_total{code=~\"5..\"}[5m])) / sum by (job) (rate(http_requests_total[5m]))",
        Direction::Greater,
        0.05
        ; "ratio formula"
    )]
    #[test_case("(a + b) > 3", "(a + b)", Direction::Greater, 3.0 ; "parenthesized formula kept")]
    #[test_case("x @ 100 > 1", "x @ 100.000", Direction::Greater, 1.0 ; "at modifier")]
    #[test_case("rate(x[5m] @ start()) < 1", "rate(x[5m] @ start())", Direction::Less, 1.0 ; "at start")]
    #[test_case(r#"x{a="\u00e9"} > 1"#, r#"x{a="é"}"#, Direction::Greater, 1.0 ; "unicode escape")]
    fn single_condition(expression: &str, formula: &str, direction: Direction, threshold: f64) {
        let condition = single(expression);
        assert_eq!(condition.formula, formula);
        assert_eq!(condition.direction, direction);
        assert!((condition.threshold - threshold).abs() < f64::EPSILON);
    }

    #[test]
    fn and_yields_both_sides_in_order() {
        let conditions = decompose("(x > 1) and (y > 2)").unwrap();
        assert_eq!(
            conditions,
            vec![
                AlertingCondition::new("x", Direction::Greater, 1.0),
                AlertingCondition::new("y", Direction::Greater, 2.0),
            ]
        );
    }

    #[test]
    fn chained_and() {
        let conditions = decompose("a < 1 and b > 2 and c <= 3").unwrap();
        let formulas: Vec<_> = conditions.iter().map(|c| c.formula.as_str()).collect();
        assert_eq!(formulas, ["a", "b", "c"]);
    }

    #[test]
    fn and_with_matching_modifier() {
        let conditions = decompose("x > 1 and on (job) y < 2").unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[1].direction, Direction::Less);
    }

    #[test_case("up" ; "bare selector")]
    #[test_case("x > 1 or y > 2" ; "or is not decomposed")]
    #[test_case("x > 1 unless y > 2" ; "unless is not decomposed")]
    #[test_case("x + 1" ; "arithmetic")]
    #[test_case("absent(up)" ; "function call")]
    #[test_case("x > y" ; "non literal threshold")]
    #[test_case("5" ; "number literal")]
    fn yields_nothing(expression: &str) {
        assert!(decompose(expression).unwrap().is_empty());
    }

    #[test]
    fn unsupported_leaf_does_not_affect_siblings() {
        let conditions = decompose("x > y and z < 4").unwrap();
        assert_eq!(conditions, vec![AlertingCondition::new("z", Direction::Less, 4.0)]);
    }

    #[test]
    fn invalid_expression_is_an_error() {
        assert!(matches!(decompose("x >"), Err(ExprError::Parse { .. })));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn comparison() -> impl Strategy<Value = String> {
            (
                "m_[a-z_]{0,6}",
                prop::sample::select(vec!["<", "<=", ">", ">=", "==", "!="]),
                0u32..10_000,
            )
                .prop_map(|(metric, op, value)| format!("{metric} {op} {value}"))
        }

        proptest! {
            #[test]
            fn and_is_concatenation(a in comparison(), b in comparison()) {
                let mut expected = decompose(&a).unwrap();
                expected.extend(decompose(&b).unwrap());
                prop_assert_eq!(decompose(&format!("{a} and {b}")).unwrap(), expected.clone());
                prop_assert_eq!(decompose(&format!("({a}) and ({b})")).unwrap(), expected);
            }
        }
    }
}
