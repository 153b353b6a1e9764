//! Optimization hook point.

use crate::ast::Program;

/// Runs the optimization pass over the decorated AST. Currently a no-op;
/// the hook exists so the pipeline shape is stable when passes land.
pub fn optimize(_program: &mut Program) {}
