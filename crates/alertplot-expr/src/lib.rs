//! PromQL parsing and alerting-expression decomposition.
//!
//! The crate parses the query language Prometheus alerting rules are written
//! in and recovers the threshold comparisons an alert fires on.
//!
//! # Example
//!
//! ```rust
//! use alertplot_core::Direction;
//! use alertplot_expr::decompose;
//!
//! let conditions = decompose("(rate(errors_total[5m]) > 0.5) and (up <= 0)").unwrap();
//! assert_eq!(conditions.len(), 2);
//! assert_eq!(conditions[0].formula, "rate(errors_total[5m])");
//! assert_eq!(conditions[1].direction, Direction::Less);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod decompose;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr};
pub use decompose::{decompose, decompose_expr};
pub use error::{ExprError, Result};
pub use parser::parse;
