//! Constant-expression evaluator over a boxed numeric variant.
//!
//! Variable accesses are delegated to a caller-supplied callback; the
//! callback signals "not a constant expression" through its `Result`, and
//! the evaluator short-circuits on the first such failure.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp, VarAccessExpr};
use crate::source::SourceArea;
use crate::ty::{DataType, ScalarType, TypeDenoter};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    /// Expression form that can never be constant (function call, ...).
    Illegal(String),
    DivisionByZero,
    /// A variable access the callback could not resolve to a constant.
    NonConst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub area: Option<SourceArea>,
}

impl EvalError {
    pub fn illegal(what: &str, area: Option<SourceArea>) -> Self {
        EvalError {
            kind: EvalErrorKind::Illegal(what.to_string()),
            area,
        }
    }

    pub fn non_const(area: Option<SourceArea>) -> Self {
        EvalError {
            kind: EvalErrorKind::NonConst,
            area,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            EvalErrorKind::Illegal(what) => {
                format!("illegal {} in constant expression", what)
            }
            EvalErrorKind::DivisionByZero => {
                "division by zero in constant expression".to_string()
            }
            EvalErrorKind::NonConst => "expected constant expression".to_string(),
        }
    }
}

type EvalResult = Result<Variant, EvalError>;

/// Tagged constant value. Integer arithmetic follows i64, real arithmetic
/// follows f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int(i64),
    Real(f64),
}

impl Variant {
    pub fn to_bool(self) -> bool {
        match self {
            Variant::Bool(b) => b,
            Variant::Int(i) => i != 0,
            Variant::Real(r) => r != 0.0,
        }
    }

    pub fn to_int(self) -> i64 {
        match self {
            Variant::Bool(b) => i64::from(b),
            Variant::Int(i) => i,
            Variant::Real(r) => r as i64,
        }
    }

    pub fn to_real(self) -> f64 {
        match self {
            Variant::Bool(b) => f64::from(u8::from(b)),
            Variant::Int(i) => i as f64,
            Variant::Real(r) => r,
        }
    }

    fn is_real(self) -> bool {
        matches!(self, Variant::Real(_))
    }

    fn arith(lhs: Variant, rhs: Variant, int_op: fn(i64, i64) -> i64, real_op: fn(f64, f64) -> f64) -> Variant {
        if lhs.is_real() || rhs.is_real() {
            Variant::Real(real_op(lhs.to_real(), rhs.to_real()))
        } else {
            Variant::Int(int_op(lhs.to_int(), rhs.to_int()))
        }
    }

    fn compare(lhs: Variant, rhs: Variant, int_op: fn(&i64, &i64) -> bool, real_op: fn(&f64, &f64) -> bool) -> Variant {
        if lhs.is_real() || rhs.is_real() {
            Variant::Bool(real_op(&lhs.to_real(), &rhs.to_real()))
        } else {
            Variant::Bool(int_op(&lhs.to_int(), &rhs.to_int()))
        }
    }
}

/// Evaluates `expr`; `on_var_access` supplies values for identifiers.
pub fn evaluate_expr<F>(expr: &Expr, on_var_access: &mut F) -> EvalResult
where
    F: FnMut(&VarAccessExpr) -> EvalResult,
{
    let area = Some(expr.area);
    match &expr.kind {
        ExprKind::Null => Err(EvalError::illegal("dynamic array dimension", area)),
        ExprKind::List(first, _) => {
            // Only the first sub-expression counts when used as a condition.
            evaluate_expr(first, on_var_access)
        }
        ExprKind::Literal(literal) => match literal.data_type {
            DataType::Scalar(ScalarType::Bool) => match literal.value.as_str() {
                "true" => Ok(Variant::Bool(true)),
                "false" => Ok(Variant::Bool(false)),
                other => Err(EvalError::illegal(
                    &format!("boolean literal value '{}'", other),
                    area,
                )),
            },
            DataType::Scalar(ScalarType::Int) | DataType::Scalar(ScalarType::UInt) => {
                let value = if let Some(hex) = literal
                    .value
                    .strip_prefix("0x")
                    .or_else(|| literal.value.strip_prefix("0X"))
                {
                    i64::from_str_radix(hex, 16)
                } else {
                    literal.value.parse()
                };
                value
                    .map(Variant::Int)
                    .map_err(|_| EvalError::illegal("integer literal", area))
            }
            DataType::Scalar(
                ScalarType::Half | ScalarType::Float | ScalarType::Double,
            ) => literal
                .value
                .trim_end_matches(['f', 'F', 'h', 'H'])
                .parse()
                .map(Variant::Real)
                .map_err(|_| EvalError::illegal("floating-point literal", area)),
            other => Err(EvalError::illegal(
                &format!("literal type '{}'", other),
                area,
            )),
        },
        ExprKind::TypeName(_) => Err(EvalError::illegal("type specifier", area)),
        ExprKind::Ternary {
            condition,
            then_expr,
            else_expr,
        } => {
            let cond = evaluate_expr(condition, on_var_access)?;
            if cond.to_bool() {
                evaluate_expr(then_expr, on_var_access)
            } else {
                evaluate_expr(else_expr, on_var_access)
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs_val = evaluate_expr(lhs, on_var_access)?;
            let rhs_val = evaluate_expr(rhs, on_var_access)?;
            eval_binary(*op, lhs_val, rhs_val, area)
        }
        ExprKind::Unary { op, expr } => {
            let value = evaluate_expr(expr, on_var_access)?;
            match op {
                UnaryOp::LogicalNot => Ok(Variant::Bool(!value.to_bool())),
                UnaryOp::Not => Ok(Variant::Int(!value.to_int())),
                UnaryOp::Nop => Ok(value),
                UnaryOp::Negate => Ok(match value {
                    Variant::Bool(b) => Variant::Int(-i64::from(b)),
                    Variant::Int(i) => Variant::Int(i.wrapping_neg()),
                    Variant::Real(r) => Variant::Real(-r),
                }),
                UnaryOp::Inc => Ok(Variant::arith(value, Variant::Int(1), i64::wrapping_add, |a, b| a + b)),
                UnaryOp::Dec => Ok(Variant::arith(value, Variant::Int(1), i64::wrapping_sub, |a, b| a - b)),
            }
        }
        ExprKind::PostUnary { op, expr } => {
            let value = evaluate_expr(expr, on_var_access)?;
            match op {
                // Post inc/dec yield the value before the operation.
                UnaryOp::Inc | UnaryOp::Dec => Ok(value),
                other => Err(EvalError::illegal(
                    &format!("unary operator '{}'", other.spell()),
                    area,
                )),
            }
        }
        ExprKind::Call(_) => Err(EvalError::illegal("function call", area)),
        ExprKind::Bracket(inner) => evaluate_expr(inner, on_var_access),
        ExprKind::Cast { type_denoter, expr } => {
            let value = evaluate_expr(expr, on_var_access)?;
            Ok(apply_cast(type_denoter, value))
        }
        ExprKind::VarAccess(access) => on_var_access(access),
        ExprKind::Initializer(_) => Err(EvalError::illegal("initializer list", area)),
        ExprKind::Suffix { .. } => Err(EvalError::illegal("suffix expression", area)),
        ExprKind::ArrayAccess { .. } => Err(EvalError::illegal("array access", area)),
    }
}

/// Evaluates an expression that must not reference any variables.
pub fn evaluate_const_expr(expr: &Expr) -> EvalResult {
    evaluate_expr(expr, &mut |access: &VarAccessExpr| {
        Err(EvalError::non_const(Some(access.var_ident.area)))
    })
}

fn eval_binary(op: BinaryOp, lhs: Variant, rhs: Variant, area: Option<SourceArea>) -> EvalResult {
    let result = match op {
        BinaryOp::LogicalAnd => Variant::Bool(lhs.to_bool() && rhs.to_bool()),
        BinaryOp::LogicalOr => Variant::Bool(lhs.to_bool() || rhs.to_bool()),
        BinaryOp::Or => Variant::Int(lhs.to_int() | rhs.to_int()),
        BinaryOp::Xor => Variant::Int(lhs.to_int() ^ rhs.to_int()),
        BinaryOp::And => Variant::Int(lhs.to_int() & rhs.to_int()),
        BinaryOp::LShift => Variant::Int(lhs.to_int().wrapping_shl(rhs.to_int() as u32)),
        BinaryOp::RShift => Variant::Int(lhs.to_int().wrapping_shr(rhs.to_int() as u32)),
        BinaryOp::Add => Variant::arith(lhs, rhs, i64::wrapping_add, |a, b| a + b),
        BinaryOp::Sub => Variant::arith(lhs, rhs, i64::wrapping_sub, |a, b| a - b),
        BinaryOp::Mul => Variant::arith(lhs, rhs, i64::wrapping_mul, |a, b| a * b),
        BinaryOp::Div => {
            if lhs.is_real() || rhs.is_real() {
                if rhs.to_real() == 0.0 {
                    return Err(EvalError {
                        kind: EvalErrorKind::DivisionByZero,
                        area,
                    });
                }
                Variant::Real(lhs.to_real() / rhs.to_real())
            } else {
                if rhs.to_int() == 0 {
                    return Err(EvalError {
                        kind: EvalErrorKind::DivisionByZero,
                        area,
                    });
                }
                Variant::Int(lhs.to_int().wrapping_div(rhs.to_int()))
            }
        }
        BinaryOp::Mod => {
            if lhs.is_real() || rhs.is_real() {
                if rhs.to_real() == 0.0 {
                    return Err(EvalError {
                        kind: EvalErrorKind::DivisionByZero,
                        area,
                    });
                }
                Variant::Real(lhs.to_real() % rhs.to_real())
            } else {
                if rhs.to_int() == 0 {
                    return Err(EvalError {
                        kind: EvalErrorKind::DivisionByZero,
                        area,
                    });
                }
                Variant::Int(lhs.to_int().wrapping_rem(rhs.to_int()))
            }
        }
        BinaryOp::Equal => Variant::compare(lhs, rhs, i64::eq, f64::eq),
        BinaryOp::NotEqual => Variant::compare(lhs, rhs, i64::ne, f64::ne),
        BinaryOp::Less => Variant::compare(lhs, rhs, i64::lt, f64::lt),
        BinaryOp::Greater => Variant::compare(lhs, rhs, i64::gt, f64::gt),
        BinaryOp::LessEqual => Variant::compare(lhs, rhs, i64::le, f64::le),
        BinaryOp::GreaterEqual => Variant::compare(lhs, rhs, i64::ge, f64::ge),
    };
    Ok(result)
}

fn apply_cast(type_denoter: &TypeDenoter, value: Variant) -> Variant {
    match type_denoter {
        TypeDenoter::Base(DataType::Scalar(ScalarType::Bool)) => Variant::Bool(value.to_bool()),
        TypeDenoter::Base(DataType::Scalar(ScalarType::Int | ScalarType::UInt)) => {
            Variant::Int(value.to_int())
        }
        TypeDenoter::Base(DataType::Scalar(
            ScalarType::Half | ScalarType::Float | ScalarType::Double,
        )) => Variant::Real(value.to_real()),
        // Aliases and wider types keep the value; the analyzer validates
        // the cast itself.
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceArea;

    fn int_lit(value: i64) -> Expr {
        Expr::new(
            ExprKind::Literal(crate::ast::LiteralExpr {
                data_type: DataType::Scalar(ScalarType::Int),
                value: value.to_string(),
            }),
            SourceArea::ignore(),
        )
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            SourceArea::ignore(),
        )
    }

    #[test]
    fn test_integer_arithmetic() {
        let expr = binary(
            BinaryOp::Add,
            int_lit(40),
            binary(BinaryOp::Mul, int_lit(2), int_lit(1)),
        );
        assert_eq!(evaluate_const_expr(&expr).unwrap(), Variant::Int(42));
    }

    #[test]
    fn test_division_by_zero_reported() {
        let expr = binary(BinaryOp::Div, int_lit(1), int_lit(0));
        let err = evaluate_const_expr(&expr).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    }

    #[test]
    fn test_ternary_short_circuits() {
        let expr = Expr::new(
            ExprKind::Ternary {
                condition: Box::new(int_lit(0)),
                // The unevaluated branch may divide by zero without error.
                then_expr: Box::new(binary(BinaryOp::Div, int_lit(1), int_lit(0))),
                else_expr: Box::new(int_lit(7)),
            },
            SourceArea::ignore(),
        );
        assert_eq!(evaluate_const_expr(&expr).unwrap(), Variant::Int(7));
    }

    #[test]
    fn test_var_access_signals_non_const() {
        use crate::ast::{VarAccessExpr, VarIdent};
        let expr = Expr::new(
            ExprKind::VarAccess(VarAccessExpr {
                var_ident: VarIdent::new("x", SourceArea::ignore()),
                assign_op: None,
                assign_expr: None,
            }),
            SourceArea::ignore(),
        );
        let err = evaluate_const_expr(&expr).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::NonConst);
    }

    #[test]
    fn test_callback_supplies_values() {
        use crate::ast::{VarAccessExpr, VarIdent};
        let access = Expr::new(
            ExprKind::VarAccess(VarAccessExpr {
                var_ident: VarIdent::new("n", SourceArea::ignore()),
                assign_op: None,
                assign_expr: None,
            }),
            SourceArea::ignore(),
        );
        let expr = binary(BinaryOp::LShift, int_lit(1), access);
        let result = evaluate_expr(&expr, &mut |_| Ok(Variant::Int(4))).unwrap();
        assert_eq!(result, Variant::Int(16));
    }

    #[test]
    fn test_function_call_is_illegal() {
        use crate::ast::{FunctionCall, VarIdent};
        let expr = Expr::new(
            ExprKind::Call(FunctionCall {
                var_ident: Some(VarIdent::new("f", SourceArea::ignore())),
                type_denoter: None,
                arguments: vec![],
                intrinsic: None,
                intrinsic_arg_type: None,
                flags: Default::default(),
                area: SourceArea::ignore(),
            }),
            SourceArea::ignore(),
        );
        let err = evaluate_const_expr(&expr).unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::Illegal(_)));
    }
}
