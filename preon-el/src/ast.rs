use crate::{BindingError, EmptyResolver, EvalError, Reference, Resolver, Span, StaticType, Value};
use core::cmp::Ordering;
use core::fmt;

/// Arithmetic operators; integer-only, wrapping two's complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `^`, exponentiation.
    Pow,
}

impl ArithOp {
    /// Apply the operator. Overflow wraps; division and remainder by zero
    /// fail; a negative exponent yields zero.
    pub fn apply(self, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
        match self {
            ArithOp::Add => Ok(lhs.wrapping_add(rhs)),
            ArithOp::Sub => Ok(lhs.wrapping_sub(rhs)),
            ArithOp::Mul => Ok(lhs.wrapping_mul(rhs)),
            ArithOp::Div => {
                if rhs == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(lhs.wrapping_div(rhs))
                }
            }
            ArithOp::Rem => {
                if rhs == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(lhs.wrapping_rem(rhs))
                }
            }
            ArithOp::Pow => {
                if rhs < 0 {
                    Ok(0)
                } else {
                    let exponent = u32::try_from(rhs).unwrap_or(u32::MAX);
                    Ok(lhs.wrapping_pow(exponent))
                }
            }
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
            ArithOp::Pow => "^",
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            ArithOp::Add => "plus",
            ArithOp::Sub => "minus",
            ArithOp::Mul => "multiplied by",
            ArithOp::Div => "divided by",
            ArithOp::Rem => "modulo",
            ArithOp::Pow => "raised to the power of",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CompareOp {
    /// Whether the operator needs an ordering, not just equality.
    pub const fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    fn decide(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            CompareOp::Lt => "is less than",
            CompareOp::Le => "is less than or equal to",
            CompareOp::Gt => "is greater than",
            CompareOp::Ge => "is greater than or equal to",
            CompareOp::Eq => "equals",
            CompareOp::Ne => "does not equal",
        }
    }
}

/// A typed expression node.
///
/// The static type of every node is fixed by its construction: the checked
/// constructors ([`Expr::arith`], [`Expr::compare`], ...) reject operands
/// of the wrong type, so a successfully built tree never changes type and
/// never needs re-checking.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Integer(i64),
    /// Boolean literal.
    Bool(bool),
    /// String literal.
    Str(String),
    /// Late-bound reference into the resolver chain.
    Reference(Reference),
    /// Integer arithmetic.
    Arith {
        /// The operator.
        op: ArithOp,
        /// Left operand, Integer-typed.
        lhs: Box<Expr>,
        /// Right operand, Integer-typed.
        rhs: Box<Expr>,
    },
    /// Integer negation.
    Negate(Box<Expr>),
    /// Comparison yielding Boolean.
    Compare {
        /// The operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand, same static type as `lhs`.
        rhs: Box<Expr>,
    },
    /// Short-circuit conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Boolean negation.
    Not(Box<Expr>),
    /// Conditional selection. Not part of the surface grammar; assembled by
    /// the codec layer for guarded size sums.
    Cond {
        /// Boolean test.
        test: Box<Expr>,
        /// Value when the test holds.
        then: Box<Expr>,
        /// Value when the test fails; same static type as `then`.
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// An arithmetic node over Integer operands.
    pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr, at: Span) -> Result<Expr, BindingError> {
        for operand in [&lhs, &rhs] {
            if operand.ty() != StaticType::Integer {
                return Err(BindingError::OperandType {
                    op: op.symbol(),
                    expected: StaticType::Integer,
                    found: operand.ty(),
                    at,
                });
            }
        }
        Ok(Expr::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// An Integer negation node.
    pub fn negate(operand: Expr, at: Span) -> Result<Expr, BindingError> {
        if operand.ty() != StaticType::Integer {
            return Err(BindingError::OperandType {
                op: "-",
                expected: StaticType::Integer,
                found: operand.ty(),
                at,
            });
        }
        Ok(Expr::Negate(Box::new(operand)))
    }

    /// A comparison node. Operands must share a static type; ordering
    /// operators are defined for Integer and String operands only.
    pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr, at: Span) -> Result<Expr, BindingError> {
        if lhs.ty() != rhs.ty() {
            return Err(BindingError::ComparisonMismatch {
                lhs: lhs.ty(),
                rhs: rhs.ty(),
                at,
            });
        }
        if op.is_ordering() && !matches!(lhs.ty(), StaticType::Integer | StaticType::String) {
            return Err(BindingError::Unordered { found: lhs.ty(), at });
        }
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// A conjunction over Boolean operands.
    pub fn and(lhs: Expr, rhs: Expr, at: Span) -> Result<Expr, BindingError> {
        Self::logical("and", lhs, rhs, at).map(|(lhs, rhs)| Expr::And(lhs, rhs))
    }

    /// A disjunction over Boolean operands.
    pub fn or(lhs: Expr, rhs: Expr, at: Span) -> Result<Expr, BindingError> {
        Self::logical("or", lhs, rhs, at).map(|(lhs, rhs)| Expr::Or(lhs, rhs))
    }

    /// A Boolean negation node.
    pub fn not(operand: Expr, at: Span) -> Result<Expr, BindingError> {
        if operand.ty() != StaticType::Boolean {
            return Err(BindingError::OperandType {
                op: "not",
                expected: StaticType::Boolean,
                found: operand.ty(),
                at,
            });
        }
        Ok(Expr::Not(Box::new(operand)))
    }

    /// A conditional node: Boolean test, branches of one shared type.
    pub fn cond(test: Expr, then: Expr, otherwise: Expr, at: Span) -> Result<Expr, BindingError> {
        if test.ty() != StaticType::Boolean {
            return Err(BindingError::OperandType {
                op: "if",
                expected: StaticType::Boolean,
                found: test.ty(),
                at,
            });
        }
        if then.ty() != otherwise.ty() {
            return Err(BindingError::BranchMismatch {
                then: then.ty(),
                otherwise: otherwise.ty(),
                at,
            });
        }
        Ok(Expr::Cond {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// The literal form of a scalar value, when one exists.
    pub fn literal(value: Value) -> Option<Expr> {
        match value {
            Value::Integer(value) => Some(Expr::Integer(value)),
            Value::Bool(value) => Some(Expr::Bool(value)),
            Value::String(value) => Some(Expr::Str(value)),
            _ => None,
        }
    }

    /// Static type of the node.
    pub fn ty(&self) -> StaticType {
        match self {
            Expr::Integer(_) | Expr::Arith { .. } | Expr::Negate(_) => StaticType::Integer,
            Expr::Bool(_) | Expr::Compare { .. } | Expr::And(..) | Expr::Or(..) | Expr::Not(_) => {
                StaticType::Boolean
            }
            Expr::Str(_) => StaticType::String,
            Expr::Reference(reference) => reference.ty(),
            Expr::Cond { then, .. } => then.ty(),
        }
    }

    /// True iff the subtree carries no references; such an expression
    /// evaluates identically under any resolver.
    pub fn is_parameterless(&self) -> bool {
        match self {
            Expr::Integer(_) | Expr::Bool(_) | Expr::Str(_) => true,
            Expr::Reference(_) => false,
            Expr::Arith { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.is_parameterless() && rhs.is_parameterless()
            }
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                lhs.is_parameterless() && rhs.is_parameterless()
            }
            Expr::Negate(operand) | Expr::Not(operand) => operand.is_parameterless(),
            Expr::Cond {
                test,
                then,
                otherwise,
            } => test.is_parameterless() && then.is_parameterless() && otherwise.is_parameterless(),
        }
    }

    /// Evaluate against a resolver chain.
    pub fn eval(&self, resolver: &dyn Resolver) -> Result<Value, EvalError> {
        match self {
            Expr::Integer(value) => Ok(Value::Integer(*value)),
            Expr::Bool(value) => Ok(Value::Bool(*value)),
            Expr::Str(value) => Ok(Value::String(value.clone())),
            Expr::Reference(reference) => reference.eval(resolver),
            Expr::Arith { op, lhs, rhs } => {
                let lhs = lhs.eval_integer(resolver)?;
                let rhs = rhs.eval_integer(resolver)?;
                op.apply(lhs, rhs).map(Value::Integer)
            }
            Expr::Negate(operand) => {
                Ok(Value::Integer(operand.eval_integer(resolver)?.wrapping_neg()))
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = lhs.eval(resolver)?;
                let rhs = rhs.eval(resolver)?;
                compare_values(*op, &lhs, &rhs).map(Value::Bool)
            }
            Expr::And(lhs, rhs) => {
                if !lhs.eval_bool(resolver)? {
                    return Ok(Value::Bool(false));
                }
                rhs.eval(resolver)
            }
            Expr::Or(lhs, rhs) => {
                if lhs.eval_bool(resolver)? {
                    return Ok(Value::Bool(true));
                }
                rhs.eval(resolver)
            }
            Expr::Not(operand) => Ok(Value::Bool(!operand.eval_bool(resolver)?)),
            Expr::Cond {
                test,
                then,
                otherwise,
            } => {
                if test.eval_bool(resolver)? {
                    then.eval(resolver)
                } else {
                    otherwise.eval(resolver)
                }
            }
        }
    }

    /// Evaluate, requiring an integer result.
    pub fn eval_integer(&self, resolver: &dyn Resolver) -> Result<i64, EvalError> {
        match self.eval(resolver)? {
            Value::Integer(value) => Ok(value),
            other => Err(EvalError::ResultType {
                expected: "an integer",
                found: other.type_name(),
            }),
        }
    }

    /// Evaluate, requiring a boolean result.
    pub fn eval_bool(&self, resolver: &dyn Resolver) -> Result<bool, EvalError> {
        match self.eval(resolver)? {
            Value::Bool(value) => Ok(value),
            other => Err(EvalError::ResultType {
                expected: "a boolean",
                found: other.type_name(),
            }),
        }
    }

    /// Replace every parameterless subtree by its literal value. A subtree
    /// whose evaluation fails, such as a division by zero, is left intact
    /// so the failure surfaces at decode time with its field context.
    pub fn fold(self) -> Expr {
        if self.is_parameterless() {
            if let Ok(value) = self.eval(&EmptyResolver) {
                if let Some(literal) = Expr::literal(value) {
                    return literal;
                }
            }
            return self;
        }
        match self {
            Expr::Arith { op, lhs, rhs } => Expr::Arith {
                op,
                lhs: Box::new(lhs.fold()),
                rhs: Box::new(rhs.fold()),
            },
            Expr::Negate(operand) => Expr::Negate(Box::new(operand.fold())),
            Expr::Compare { op, lhs, rhs } => Expr::Compare {
                op,
                lhs: Box::new(lhs.fold()),
                rhs: Box::new(rhs.fold()),
            },
            Expr::And(lhs, rhs) => Expr::And(Box::new(lhs.fold()), Box::new(rhs.fold())),
            Expr::Or(lhs, rhs) => Expr::Or(Box::new(lhs.fold()), Box::new(rhs.fold())),
            Expr::Not(operand) => Expr::Not(Box::new(operand.fold())),
            Expr::Cond {
                test,
                then,
                otherwise,
            } => Expr::Cond {
                test: Box::new(test.fold()),
                then: Box::new(then.fold()),
                otherwise: Box::new(otherwise.fold()),
            },
            other => other,
        }
    }

    /// Stable human-readable rendering, e.g.
    /// `(the value of n plus 1) multiplied by 8`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out);
        out
    }

    fn describe_into(&self, out: &mut String) {
        match self {
            Expr::Integer(value) => out.push_str(&value.to_string()),
            Expr::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
            Expr::Str(value) => {
                out.push('"');
                out.push_str(value);
                out.push('"');
            }
            Expr::Reference(reference) => {
                out.push_str("the value of ");
                out.push_str(&reference.path());
            }
            Expr::Arith { op, lhs, rhs } => {
                Self::describe_operand(lhs, out);
                out.push(' ');
                out.push_str(op.verb());
                out.push(' ');
                Self::describe_operand(rhs, out);
            }
            Expr::Negate(operand) => {
                out.push_str("the negation of ");
                Self::describe_operand(operand, out);
            }
            Expr::Compare { op, lhs, rhs } => {
                Self::describe_operand(lhs, out);
                out.push(' ');
                out.push_str(op.verb());
                out.push(' ');
                Self::describe_operand(rhs, out);
            }
            Expr::And(lhs, rhs) => {
                Self::describe_operand(lhs, out);
                out.push_str(" and ");
                Self::describe_operand(rhs, out);
            }
            Expr::Or(lhs, rhs) => {
                Self::describe_operand(lhs, out);
                out.push_str(" or ");
                Self::describe_operand(rhs, out);
            }
            Expr::Not(operand) => {
                out.push_str("not ");
                Self::describe_operand(operand, out);
            }
            Expr::Cond {
                test,
                then,
                otherwise,
            } => {
                Self::describe_operand(then, out);
                out.push_str(" when ");
                Self::describe_operand(test, out);
                out.push_str(", otherwise ");
                Self::describe_operand(otherwise, out);
            }
        }
    }

    /// Compound operands are parenthesised so the rendering stays
    /// unambiguous without precedence rules.
    fn describe_operand(operand: &Expr, out: &mut String) {
        let atomic = matches!(
            operand,
            Expr::Integer(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Reference(_)
        );
        if atomic {
            operand.describe_into(out);
        } else {
            out.push('(');
            operand.describe_into(out);
            out.push(')');
        }
    }

    fn logical(
        op: &'static str,
        lhs: Expr,
        rhs: Expr,
        at: Span,
    ) -> Result<(Box<Expr>, Box<Expr>), BindingError> {
        for operand in [&lhs, &rhs] {
            if operand.ty() != StaticType::Boolean {
                return Err(BindingError::OperandType {
                    op,
                    expected: StaticType::Boolean,
                    found: operand.ty(),
                    at,
                });
            }
        }
        Ok((Box::new(lhs), Box::new(rhs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, ReferenceContext, Span, StaticContext};
    use quickcheck_macros::quickcheck;
    use rstest::rstest;
    use std::sync::Arc;

    fn empty() -> Arc<dyn ReferenceContext> {
        Arc::new(StaticContext::new("t"))
    }

    #[quickcheck]
    fn addition_wraps_like_i64(a: i32, b: i32) -> bool {
        let expr = parse(&format!("{a} + {b}"), &empty()).unwrap();
        expr.eval_integer(&EmptyResolver).unwrap() == (a as i64).wrapping_add(b as i64)
    }

    #[quickcheck]
    fn multiplication_wraps_like_i64(a: i32, b: i32) -> bool {
        let expr = parse(&format!("{a} * {b}"), &empty()).unwrap();
        expr.eval_integer(&EmptyResolver).unwrap() == (a as i64).wrapping_mul(b as i64)
    }

    #[quickcheck]
    fn folding_preserves_the_value(a: i32, b: i32, c: i32) -> bool {
        let lhs = Expr::arith(
            ArithOp::Add,
            Expr::Integer(a as i64),
            Expr::Integer(b as i64),
            Span::default(),
        )
        .unwrap();
        let expr = Expr::arith(ArithOp::Mul, lhs, Expr::Integer(c as i64), Span::default()).unwrap();
        let folded = expr.clone().fold();
        matches!(folded, Expr::Integer(_))
            && folded.eval(&EmptyResolver).unwrap() == expr.eval(&EmptyResolver).unwrap()
    }

    #[rstest]
    #[case("2 ^ 62", 1 << 62)]
    #[case("2 ^ 64", 0)] // wraps
    #[case("(-2) ^ 3", -8)]
    #[case("2 ^ (0 - 1)", 0)] // negative exponent
    #[case("7 % 3", 1)]
    #[case("(0 - 7) / 2", -3)] // truncating division
    fn power_and_division_edges(#[case] source: &str, #[case] expected: i64) {
        let expr = parse(source, &empty()).unwrap();
        assert_eq!(expr.eval_integer(&EmptyResolver).unwrap(), expected);
    }

    #[test]
    fn negation_wraps_at_the_boundary() {
        let expr = Expr::negate(Expr::Integer(i64::MIN), Span::default()).unwrap();
        assert_eq!(expr.eval_integer(&EmptyResolver).unwrap(), i64::MIN);
    }

    #[test]
    fn conditional_nodes_select_by_test() {
        let cond = Expr::cond(
            Expr::Bool(true),
            Expr::Integer(16),
            Expr::Integer(0),
            Span::default(),
        )
        .unwrap();
        assert_eq!(cond.ty(), StaticType::Integer);
        assert_eq!(cond.eval_integer(&EmptyResolver).unwrap(), 16);
        assert_eq!(
            cond.describe(),
            "16 when true, otherwise 0"
        );
    }

    #[test]
    fn conditional_branches_must_agree() {
        assert!(matches!(
            Expr::cond(
                Expr::Bool(true),
                Expr::Integer(1),
                Expr::Str("x".into()),
                Span::default(),
            ),
            Err(BindingError::BranchMismatch { .. })
        ));
    }
}

fn compare_values(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Integer(lhs), Value::Integer(rhs)) => lhs.cmp(rhs),
        (Value::String(lhs), Value::String(rhs)) => lhs.cmp(rhs),
        (Value::Bool(lhs), Value::Bool(rhs)) if !op.is_ordering() => lhs.cmp(rhs),
        // Enumerators compare through their names, so guards can test a
        // decoded enum field against a string literal.
        (Value::Enum(lhs), Value::String(rhs)) => lhs.name.as_str().cmp(rhs.as_str()),
        (Value::String(lhs), Value::Enum(rhs)) => lhs.as_str().cmp(rhs.name.as_str()),
        (Value::Enum(lhs), Value::Enum(rhs)) if !op.is_ordering() => lhs.name.cmp(&rhs.name),
        (lhs, rhs) => {
            return Err(EvalError::OperandMismatch {
                op: op.symbol(),
                expected: lhs.type_name(),
                found: rhs.type_name(),
            });
        }
    };
    Ok(op.decide(ordering))
}

impl fmt::Display for Expr {
    /// Canonical source form, fully parenthesised.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(value) => write!(f, "{value}"),
            Expr::Bool(value) => write!(f, "{value}"),
            Expr::Str(value) => write!(f, "{value:?}"),
            Expr::Reference(reference) => write!(f, "{reference}"),
            Expr::Arith { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Negate(operand) => write!(f, "(-{operand})"),
            Expr::Compare { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            Expr::Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
            Expr::Not(operand) => write!(f, "(not {operand})"),
            Expr::Cond {
                test,
                then,
                otherwise,
            } => write!(f, "(if {test} then {then} else {otherwise})"),
        }
    }
}
