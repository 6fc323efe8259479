use crate::schema::{FieldDecl, Schema, TypeRef};
use preon_el::{ContextNode, ReferenceContext};
use std::sync::Arc;

/// [`ReferenceContext`] over a composite declaration of a [`Schema`].
///
/// The factory pipeline parses every binding expression against one of
/// these, so references type-check against the declared fields; `outer`
/// walks the chain of enclosing composites the pipeline threaded through
/// while descending.
#[derive(Debug)]
pub struct SchemaContext {
    schema: Arc<Schema>,
    type_name: String,
    outer: Option<Arc<SchemaContext>>,
}

impl SchemaContext {
    /// Scope of the root declaration of a build.
    pub fn root(schema: Arc<Schema>, type_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            schema,
            type_name: type_name.into(),
            outer: None,
        })
    }

    /// Scope of a composite nested inside `outer`.
    pub fn nested(
        schema: Arc<Schema>,
        type_name: impl Into<String>,
        outer: Option<Arc<SchemaContext>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            schema,
            type_name: type_name.into(),
            outer,
        })
    }
}

impl ReferenceContext for SchemaContext {
    fn name(&self) -> String {
        self.type_name.clone()
    }

    fn attribute(&self, name: &str) -> Option<ContextNode> {
        let decl = self.schema.get(&self.type_name)?;
        let field = decl.field_named(name)?;
        Some(node_for_field(&self.schema, field))
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

fn node_for_field(schema: &Arc<Schema>, field: &FieldDecl) -> ContextNode {
    // An integer field with a variant mapping decodes to its enumerator,
    // so references to it read as strings: `kind == "Ping"`.
    if !field.options.variants.is_empty() && field.ty.is_integer() {
        return ContextNode::string();
    }
    node_for_type(schema, &field.ty)
}

pub(crate) fn node_for_type(schema: &Arc<Schema>, ty: &TypeRef) -> ContextNode {
    match ty {
        TypeRef::U8
        | TypeRef::U16
        | TypeRef::U32
        | TypeRef::U64
        | TypeRef::I8
        | TypeRef::I16
        | TypeRef::I32
        | TypeRef::I64 => ContextNode::integer(),
        TypeRef::Bool => ContextNode::boolean(),
        TypeRef::F32 | TypeRef::F64 => ContextNode::float(),
        TypeRef::Bytes => ContextNode::bytes(),
        TypeRef::Str => ContextNode::string(),
        TypeRef::List(element) => ContextNode::list(node_for_type(schema, element)),
        TypeRef::Named(name) => ContextNode::object(Arc::new(SchemaContext {
            schema: Arc::clone(schema),
            type_name: name.clone(),
            outer: None,
        }) as Arc<dyn ReferenceContext>),
    }
}
