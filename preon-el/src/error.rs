use crate::context::StaticType;
use core::fmt;
use thiserror::Error;

/// Source location of a token, 1-based. A defaulted span (line 0) marks an
/// expression assembled programmatically rather than parsed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// 1-based source line.
    pub line: u32,
    /// 1-based column, counted in characters.
    pub column: u32,
}

impl Span {
    /// Span of a parsed token.
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Lexical and syntactic failures of expression parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A character outside the expression grammar.
    #[error("unexpected character {found:?} at {at}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Where it occurred.
        at: Span,
    },
    /// A string literal without a closing quote.
    #[error("unterminated string literal starting at {at}")]
    UnterminatedString {
        /// Where the literal started.
        at: Span,
    },
    /// An escape sequence the grammar does not define.
    #[error("invalid escape sequence `\\{escape}` at {at}")]
    InvalidEscape {
        /// The character following the backslash.
        escape: char,
        /// Where it occurred.
        at: Span,
    },
    /// An integer literal beyond 64 bits.
    #[error("integer literal does not fit in 64 bits at {at}")]
    IntegerOverflow {
        /// Where the literal started.
        at: Span,
    },
    /// A number the grammar cannot interpret, such as a bare `0x`.
    #[error("malformed number at {at}")]
    MalformedNumber {
        /// Where the literal started.
        at: Span,
    },
    /// A structurally misplaced token.
    #[error("unexpected {found} at {at}, expected {expected}")]
    UnexpectedToken {
        /// Display form of the token found.
        found: String,
        /// What the parser was looking for.
        expected: &'static str,
        /// Where it occurred.
        at: Span,
    },
    /// Input ended in the middle of an expression.
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for.
        expected: &'static str,
    },
}

/// Static binding and typing failures, raised while an expression is built
/// against a [`ReferenceContext`](crate::ReferenceContext).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The expression source did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A path segment names an attribute the context does not declare.
    #[error("`{context}` has no attribute `{name}` ({at})")]
    UnknownAttribute {
        /// The attribute that failed to resolve.
        name: String,
        /// Diagnostic name of the context searched.
        context: String,
        /// Where the segment occurred.
        at: Span,
    },
    /// Indexing applied to a non-list path segment.
    #[error("`{context}` cannot be indexed ({at})")]
    NotIndexable {
        /// Diagnostic name of the context indexed.
        context: String,
        /// Where the index occurred.
        at: Span,
    },
    /// Navigation applied to a scalar path segment.
    #[error("`{path}` is a scalar and cannot be navigated further ({at})")]
    NotNavigable {
        /// The path up to the scalar.
        path: String,
        /// Where the navigation occurred.
        at: Span,
    },
    /// `outer` used where no enclosing scope exists.
    #[error("no enclosing scope to resolve `outer` ({at})")]
    NoOuterScope {
        /// Where `outer` occurred.
        at: Span,
    },
    /// An operand whose static type the operator rejects.
    #[error("operator `{op}` expects a {expected} operand, found {found} ({at})")]
    OperandType {
        /// The operator.
        op: &'static str,
        /// The type the operator requires.
        expected: StaticType,
        /// The type actually supplied.
        found: StaticType,
        /// Where the operator occurred.
        at: Span,
    },
    /// Comparison between operands of two different static types.
    #[error("cannot compare {lhs} with {rhs} ({at})")]
    ComparisonMismatch {
        /// Static type of the left operand.
        lhs: StaticType,
        /// Static type of the right operand.
        rhs: StaticType,
        /// Where the comparison occurred.
        at: Span,
    },
    /// An ordering comparison on a type without a defined order.
    #[error("{found} values have no defined ordering ({at})")]
    Unordered {
        /// The offending operand type.
        found: StaticType,
        /// Where the comparison occurred.
        at: Span,
    },
    /// An index expression that is not of Integer type.
    #[error("index expressions must be integers, found {found} ({at})")]
    IndexType {
        /// The type of the index expression.
        found: StaticType,
        /// Where the index occurred.
        at: Span,
    },
    /// Conditional whose branches disagree on their static type.
    #[error("conditional branches disagree: {then} versus {otherwise} ({at})")]
    BranchMismatch {
        /// Static type of the first branch.
        then: StaticType,
        /// Static type of the second branch.
        otherwise: StaticType,
        /// Where the conditional was formed.
        at: Span,
    },
}

/// Runtime failures of expression evaluation against a live resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A reference whose value the resolver chain does not hold yet.
    #[error("reference `{path}` cannot be resolved in the current scope")]
    Unresolved {
        /// Rendered reference path.
        path: String,
    },
    /// A reference that resolved to a value of an unexpected shape.
    #[error("reference `{path}` resolved to {found} where {expected} was expected")]
    WrongType {
        /// Rendered reference path.
        path: String,
        /// Shape the expression needed.
        expected: &'static str,
        /// Shape actually found.
        found: &'static str,
    },
    /// A list index outside the decoded list.
    #[error("index {index} is out of bounds for the {len} items of `{path}`")]
    IndexOutOfBounds {
        /// Rendered reference path.
        path: String,
        /// The evaluated index.
        index: i64,
        /// Length of the list.
        len: usize,
    },
    /// An operand of the wrong runtime shape.
    #[error("`{op}` applied to {found} where {expected} was expected")]
    OperandMismatch {
        /// The operator.
        op: &'static str,
        /// Shape the operator needed.
        expected: &'static str,
        /// Shape actually found.
        found: &'static str,
    },
    /// The whole expression produced a value of an unexpected shape.
    #[error("expected the expression to yield {expected}, found {found}")]
    ResultType {
        /// Shape the caller needed.
        expected: &'static str,
        /// Shape actually produced.
        found: &'static str,
    },
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
}
