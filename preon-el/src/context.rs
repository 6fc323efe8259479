use core::fmt;
use std::sync::Arc;

/// Static type of a reference target or expression, known at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StaticType {
    /// 64-bit two's complement integer.
    Integer,
    /// Boolean.
    Boolean,
    /// IEEE-754 float.
    Float,
    /// Character string.
    String,
    /// Raw byte array.
    Bytes,
    /// Homogeneous sequence; navigable by index.
    List,
    /// Composite scope; navigable by attribute.
    Object,
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StaticType::Integer => "integer",
            StaticType::Boolean => "boolean",
            StaticType::Float => "float",
            StaticType::String => "string",
            StaticType::Bytes => "byte array",
            StaticType::List => "list",
            StaticType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Build-time schema-of-names.
///
/// A context answers what a scope contains: the typed sub-context behind a
/// named attribute, behind item indexing, and behind `outer`. It is
/// consulted only while expressions are parsed and codecs are assembled;
/// at runtime the [`Resolver`](crate::Resolver) chain takes over.
pub trait ReferenceContext: fmt::Debug + Send + Sync {
    /// Diagnostic name of this scope.
    fn name(&self) -> String;

    /// The typed node behind attribute `name`, if declared.
    fn attribute(&self, name: &str) -> Option<ContextNode>;

    /// The typed node behind item indexing, if this scope is indexable.
    fn item(&self) -> Option<ContextNode>;

    /// The enclosing scope, if any.
    fn outer(&self) -> Option<ContextNode>;
}

/// A typed position inside a [`ReferenceContext`] tree.
#[derive(Debug, Clone)]
pub struct ContextNode {
    /// Static type of the value at this position.
    pub ty: StaticType,
    /// Present when the position can be navigated further.
    pub ctx: Option<Arc<dyn ReferenceContext>>,
}

impl ContextNode {
    /// A scalar integer position.
    pub fn integer() -> Self {
        Self::scalar(StaticType::Integer)
    }

    /// A scalar boolean position.
    pub fn boolean() -> Self {
        Self::scalar(StaticType::Boolean)
    }

    /// A scalar float position.
    pub fn float() -> Self {
        Self::scalar(StaticType::Float)
    }

    /// A scalar string position.
    pub fn string() -> Self {
        Self::scalar(StaticType::String)
    }

    /// A scalar byte-array position.
    pub fn bytes() -> Self {
        Self::scalar(StaticType::Bytes)
    }

    /// A navigable composite position.
    pub fn object(ctx: Arc<dyn ReferenceContext>) -> Self {
        Self {
            ty: StaticType::Object,
            ctx: Some(ctx),
        }
    }

    /// An indexable list position whose items look like `element`.
    pub fn list(element: ContextNode) -> Self {
        Self {
            ty: StaticType::List,
            ctx: Some(Arc::new(ListContext { element })),
        }
    }

    fn scalar(ty: StaticType) -> Self {
        Self { ty, ctx: None }
    }
}

/// Context of a list position; only item navigation is defined.
#[derive(Debug)]
struct ListContext {
    element: ContextNode,
}

impl ReferenceContext for ListContext {
    fn name(&self) -> String {
        "list".into()
    }

    fn attribute(&self, _name: &str) -> Option<ContextNode> {
        None
    }

    fn item(&self) -> Option<ContextNode> {
        Some(self.element.clone())
    }

    fn outer(&self) -> Option<ContextNode> {
        None
    }
}

/// A programmatic [`ReferenceContext`] assembled field by field.
///
/// The codec layer derives its contexts from the schema; this one serves
/// standalone expression use and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticContext {
    name: String,
    attributes: Vec<(String, ContextNode)>,
    outer: Option<Arc<StaticContext>>,
}

impl StaticContext {
    /// An empty scope called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            outer: None,
        }
    }

    /// Declare an attribute with an explicit node.
    pub fn with_attribute(mut self, name: impl Into<String>, node: ContextNode) -> Self {
        self.attributes.push((name.into(), node));
        self
    }

    /// Declare an integer attribute.
    pub fn with_integer(self, name: impl Into<String>) -> Self {
        self.with_attribute(name, ContextNode::integer())
    }

    /// Declare a boolean attribute.
    pub fn with_boolean(self, name: impl Into<String>) -> Self {
        self.with_attribute(name, ContextNode::boolean())
    }

    /// Declare a string attribute.
    pub fn with_string(self, name: impl Into<String>) -> Self {
        self.with_attribute(name, ContextNode::string())
    }

    /// Declare a nested composite attribute.
    pub fn with_object(self, name: impl Into<String>, inner: StaticContext) -> Self {
        self.with_attribute(name, ContextNode::object(Arc::new(inner)))
    }

    /// Declare a list attribute with `element`-shaped items.
    pub fn with_list(self, name: impl Into<String>, element: ContextNode) -> Self {
        self.with_attribute(name, ContextNode::list(element))
    }

    /// Link an enclosing scope reachable through `outer`.
    pub fn with_outer(mut self, outer: StaticContext) -> Self {
        self.outer = Some(Arc::new(outer));
        self
    }
}

impl ReferenceContext for StaticContext {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn attribute(&self, name: &str) -> Option<ContextNode> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, node)| node.clone())
    }

    fn item(&self) -> Option<ContextNode> {
        None
    }

    fn outer(&self) -> Option<ContextNode> {
        self.outer
            .clone()
            .map(|ctx| ContextNode::object(ctx as Arc<dyn ReferenceContext>))
    }
}
