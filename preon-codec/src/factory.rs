use crate::choice::ChoiceCodec;
use crate::codec::{Builder, Codec, CodecHandle};
use crate::context::SchemaContext;
use crate::enumeration::EnumCodec;
use crate::error::{BindingError, BindingErrorKind, DecodingError, EncodingError, FieldPath};
use crate::list::{ListCodec, ListExtent};
use crate::object::{Binding, ObjectCodec};
use crate::primitive::{BooleanCodec, ByteArrayCodec, FloatCodec, NumericCodec};
use crate::schema::{FieldOptions, Schema, StringTermination, TypeRef};
use crate::slice::SliceCodec;
use crate::string::{StringCodec, StringDiscipline};
use core::fmt;
use itertools::Itertools;
use preon_bits::{BitBuffer, BitChannel};
use preon_el::{
    parse, ArithOp, Expr, ReferenceContext, Resolver, StaticContext, StaticType, Value,
};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use tracing::trace;

/// A sub-factory of the pipeline: asked, in priority order, whether it can
/// build a codec for a type and its metadata. Returning `Ok(None)` passes
/// the request to the next factory.
pub trait CodecFactory: fmt::Debug + Send + Sync {
    /// Attempt to build a codec for `ty` carrying `options`.
    fn build(
        &self,
        pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError>;
}

/// Wraps freshly built codecs; decorators run in registration order.
pub trait CodecDecorator: fmt::Debug + Send + Sync {
    /// Wrap `codec`, or return it unchanged.
    fn decorate(
        &self,
        codec: Arc<dyn Codec>,
        ty: &TypeRef,
        options: &FieldOptions,
    ) -> Arc<dyn Codec>;
}

/// Wraps freshly built bindings; decorators run in registration order.
pub trait BindingDecorator: fmt::Debug + Send + Sync {
    /// Rewrite `binding`, or return it unchanged.
    fn decorate(&self, binding: Binding) -> Binding;
}

/// Mutable state of a single build: the schema under construction, the
/// field path for diagnostics and the forward-reference registry that
/// breaks type cycles. Operation-local; nothing survives the build call.
#[derive(Debug)]
pub struct BuildState {
    schema: Arc<Schema>,
    path: FieldPath,
    pending: HashMap<String, Arc<LazyCodec>>,
}

impl BuildState {
    fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            path: FieldPath::root(),
            pending: HashMap::new(),
        }
    }

    /// The schema this build walks.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// A binding error anchored at the current field path.
    pub fn error(&self, kind: impl Into<BindingErrorKind>) -> BindingError {
        BindingError {
            path: self.path.clone(),
            kind: kind.into(),
        }
    }

    /// Parse an expression source against the current scope, requiring a
    /// static type.
    pub fn parse_typed(
        &self,
        source: &str,
        scope: Option<&Arc<SchemaContext>>,
        expected: StaticType,
    ) -> Result<Expr, BindingError> {
        let expr = self.parse_any(source, scope)?;
        if expr.ty() != expected {
            return Err(self.error(BindingErrorKind::IncompatibleMetadata(format!(
                "expression `{source}` has type {}, expected {expected}",
                expr.ty()
            ))));
        }
        Ok(expr)
    }

    /// Parse an expression source against the current scope.
    pub fn parse_any(
        &self,
        source: &str,
        scope: Option<&Arc<SchemaContext>>,
    ) -> Result<Expr, BindingError> {
        let ctx: Arc<dyn ReferenceContext> = match scope {
            Some(scope) => Arc::clone(scope) as Arc<dyn ReferenceContext>,
            None => Arc::new(StaticContext::new("<root>")),
        };
        parse(source, &ctx).map_err(|e| self.error(e))
    }
}

/// The codec factory pipeline: an ordered run of sub-factories, codec
/// decorators and binding decorators, immutable once configured and
/// reusable across builds.
#[derive(Debug)]
pub struct Pipeline {
    factories: Vec<Arc<dyn CodecFactory>>,
    codec_decorators: Vec<Arc<dyn CodecDecorator>>,
    binding_decorators: Vec<Arc<dyn BindingDecorator>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            factories: vec![
                Arc::new(ChoiceFactory),
                Arc::new(EnumFactory),
                Arc::new(SliceFactory),
                Arc::new(ListFactory),
                Arc::new(ByteArrayFactory),
                Arc::new(StringFactory),
                Arc::new(PrimitiveFactory),
                Arc::new(ObjectFactory),
            ],
            codec_decorators: Vec::new(),
            binding_decorators: Vec::new(),
        }
    }
}

impl Pipeline {
    /// The pipeline with the built-in sub-factories registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sub-factory ahead of the built-in ones.
    pub fn with_factory(mut self, factory: Arc<dyn CodecFactory>) -> Self {
        self.factories.insert(0, factory);
        self
    }

    /// Register a codec decorator; decorators run in registration order.
    pub fn with_codec_decorator(mut self, decorator: Arc<dyn CodecDecorator>) -> Self {
        self.codec_decorators.push(decorator);
        self
    }

    /// Register a binding decorator; decorators run in registration order.
    pub fn with_binding_decorator(mut self, decorator: Arc<dyn BindingDecorator>) -> Self {
        self.binding_decorators.push(decorator);
        self
    }

    /// Build the codec of a declared composite and bind it to the schema.
    pub fn codec_for(
        &self,
        schema: &Arc<Schema>,
        type_name: &str,
    ) -> Result<CodecHandle, BindingError> {
        if schema.get(type_name).is_none() {
            return Err(BindingError::new(BindingErrorKind::UnknownType {
                name: type_name.into(),
            }));
        }
        let mut state = BuildState::new(Arc::clone(schema));
        let codec = self.build(
            &TypeRef::Named(type_name.into()),
            &FieldOptions::default(),
            None,
            &mut state,
        )?;
        Ok(CodecHandle::new(codec, Arc::clone(schema)))
    }

    /// Build a codec for a type and its metadata; the entry point
    /// sub-factories recurse through.
    pub fn build(
        &self,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Arc<dyn Codec>, BindingError> {
        for factory in &self.factories {
            if let Some(codec) = factory.build(self, ty, options, scope, state)? {
                let codec = self
                    .codec_decorators
                    .iter()
                    .fold(codec, |codec, decorator| {
                        decorator.decorate(codec, ty, options)
                    });
                return Ok(codec);
            }
        }
        Err(state.error(BindingErrorKind::Unsupported { ty: ty.clone() }))
    }

    fn finish_binding(&self, binding: Binding) -> Binding {
        self.binding_decorators
            .iter()
            .fold(binding, |binding, decorator| decorator.decorate(binding))
    }
}

/// Builds integer, boolean and float codecs.
#[derive(Debug, Default)]
pub struct PrimitiveFactory;

impl CodecFactory for PrimitiveFactory {
    fn build(
        &self,
        _pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        let endian = options.endian.unwrap_or_default();
        if ty.is_integer() {
            let width = match &options.bits {
                Some(source) => state.parse_typed(source, scope, StaticType::Integer)?,
                None => {
                    let natural = ty.natural_width().expect("integer types have natural widths");
                    Expr::Integer(natural as i64)
                }
            };
            return Ok(Some(Arc::new(NumericCodec::new(ty.clone(), width, endian))));
        }
        match ty {
            TypeRef::Bool => Ok(Some(Arc::new(BooleanCodec::new()))),
            TypeRef::F32 | TypeRef::F64 => {
                Ok(Some(Arc::new(FloatCodec::new(ty.clone(), endian))))
            }
            _ => Ok(None),
        }
    }
}

/// Builds byte-array codecs; a `length` expression is mandatory.
#[derive(Debug, Default)]
pub struct ByteArrayFactory;

impl CodecFactory for ByteArrayFactory {
    fn build(
        &self,
        _pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        if *ty != TypeRef::Bytes {
            return Ok(None);
        }
        let Some(length) = &options.length else {
            return Err(state.error(BindingErrorKind::IncompatibleMetadata(
                "byte arrays require a `length` expression".into(),
            )));
        };
        let length = state.parse_typed(length, scope, StaticType::Integer)?;
        Ok(Some(Arc::new(ByteArrayCodec::new(length))))
    }
}

/// Builds string codecs from the charset and termination metadata.
#[derive(Debug, Default)]
pub struct StringFactory;

impl CodecFactory for StringFactory {
    fn build(
        &self,
        _pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        if *ty != TypeRef::Str {
            return Ok(None);
        }
        let charset = options.charset.unwrap_or_default();
        let discipline = match (&options.termination, &options.length) {
            (Some(StringTermination::ZeroByte), _) => StringDiscipline::ZeroByte,
            (Some(StringTermination::LengthPrefixed { prefix_bits }), _) => {
                if !(1..=64).contains(prefix_bits) {
                    return Err(state.error(BindingErrorKind::IncompatibleMetadata(format!(
                        "length prefix of {prefix_bits} bits is outside 1..=64"
                    ))));
                }
                StringDiscipline::LengthPrefixed {
                    prefix_bits: *prefix_bits,
                    endian: options.endian.unwrap_or_default(),
                }
            }
            (None, Some(length)) => {
                StringDiscipline::Fixed(state.parse_typed(length, scope, StaticType::Integer)?)
            }
            (None, None) => StringDiscipline::ZeroByte,
        };
        Ok(Some(Arc::new(StringCodec::new(charset, discipline))))
    }
}

/// Builds enumeration codecs for integer fields with a variant mapping.
#[derive(Debug, Default)]
pub struct EnumFactory;

impl CodecFactory for EnumFactory {
    fn build(
        &self,
        _pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        if options.variants.is_empty() {
            return Ok(None);
        }
        if !ty.is_integer() {
            return Err(state.error(BindingErrorKind::IncompatibleMetadata(format!(
                "variant mappings require an integer type, got {ty:?}"
            ))));
        }
        if let Some(default) = &options.variant_default {
            if !options.variants.iter().any(|(_, name)| name == default) {
                return Err(state.error(BindingErrorKind::IncompatibleMetadata(format!(
                    "default enumerator `{default}` is not one of: {}",
                    options.variants.iter().map(|(_, name)| name).join(", ")
                ))));
            }
        }
        let width = match &options.bits {
            Some(source) => state.parse_typed(source, scope, StaticType::Integer)?,
            None => {
                let natural = ty.natural_width().expect("integer types have natural widths");
                Expr::Integer(natural as i64)
            }
        };
        let underlying = NumericCodec::new(ty.clone(), width, options.endian.unwrap_or_default());
        Ok(Some(Arc::new(EnumCodec::new(
            underlying,
            options.variants.clone(),
            options.variant_default.clone(),
        ))))
    }
}

/// Builds choice codecs for fields with guarded branches.
#[derive(Debug, Default)]
pub struct ChoiceFactory;

impl CodecFactory for ChoiceFactory {
    fn build(
        &self,
        pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        if options.choices.is_empty() {
            return Ok(None);
        }
        let mut branches = Vec::with_capacity(options.choices.len());
        for (guard, branch_ty) in &options.choices {
            let guard = state.parse_typed(guard, scope, StaticType::Boolean)?;
            let codec = pipeline.build(branch_ty, &FieldOptions::default(), scope, state)?;
            branches.push((guard, codec));
        }
        let default = options
            .choice_default
            .as_ref()
            .map(|default_ty| pipeline.build(default_ty, &FieldOptions::default(), scope, state))
            .transpose()?;
        Ok(Some(Arc::new(ChoiceCodec::new(ty.clone(), branches, default))))
    }
}

/// Builds slice codecs for composites confined to a byte extent.
#[derive(Debug, Default)]
pub struct SliceFactory;

impl CodecFactory for SliceFactory {
    fn build(
        &self,
        pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        let Some(extent) = options.extent.as_deref() else {
            return Ok(None);
        };
        if !matches!(ty, TypeRef::Named(_)) {
            return Ok(None);
        }
        let extent = state.parse_typed(extent, scope, StaticType::Integer)?;
        let mut inner_options = options.clone();
        inner_options.extent = None;
        let inner = pipeline.build(ty, &inner_options, scope, state)?;
        Ok(Some(Arc::new(SliceCodec::new(inner, extent))))
    }
}

/// Builds list codecs; discipline precedence is terminator, byte extent,
/// then item count.
#[derive(Debug, Default)]
pub struct ListFactory;

impl CodecFactory for ListFactory {
    fn build(
        &self,
        pipeline: &Pipeline,
        ty: &TypeRef,
        options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        let TypeRef::List(element_ty) = ty else {
            return Ok(None);
        };
        let element = pipeline.build(element_ty, &FieldOptions::default(), scope, state)?;
        let extent = if let Some(terminator) = &options.terminator {
            ListExtent::Terminated(terminator.clone())
        } else if let Some(source) = &options.extent {
            ListExtent::Bytes(state.parse_typed(source, scope, StaticType::Integer)?)
        } else if let Some(source) = &options.length {
            ListExtent::Count(state.parse_typed(source, scope, StaticType::Integer)?)
        } else {
            return Err(state.error(BindingErrorKind::IncompatibleMetadata(
                "lists require `length`, `extent`, or `terminator` metadata".into(),
            )));
        };
        Ok(Some(Arc::new(ListCodec::new(element, extent))))
    }
}

/// Builds object codecs for declared composites; the fallback for named
/// types and the place type cycles are broken.
#[derive(Debug, Default)]
pub struct ObjectFactory;

impl CodecFactory for ObjectFactory {
    fn build(
        &self,
        pipeline: &Pipeline,
        ty: &TypeRef,
        _options: &FieldOptions,
        scope: Option<&Arc<SchemaContext>>,
        state: &mut BuildState,
    ) -> Result<Option<Arc<dyn Codec>>, BindingError> {
        let TypeRef::Named(name) = ty else {
            return Ok(None);
        };
        if let Some(pending) = state.pending.get(name) {
            trace!(ty = %name, "forward reference to a type under construction");
            return Ok(Some(Arc::clone(pending) as Arc<dyn Codec>));
        }

        let schema = Arc::clone(&state.schema);
        let Some(decl) = schema.get(name) else {
            return Err(state.error(BindingErrorKind::UnknownType { name: name.clone() }));
        };

        let lazy = Arc::new(LazyCodec::new(ty.clone()));
        state.pending.insert(name.clone(), Arc::clone(&lazy));
        let scope_ctx = SchemaContext::nested(Arc::clone(&schema), name, scope.cloned());

        let mut bindings = Vec::with_capacity(decl.fields().len());
        for field in decl.fields() {
            state.path.push(&field.name);
            let codec = pipeline.build(&field.ty, &field.options, Some(&scope_ctx), state)?;
            let mut binding = Binding::new(&field.name, codec);
            if let Some(source) = &field.options.when {
                binding = binding
                    .with_guard(state.parse_typed(source, Some(&scope_ctx), StaticType::Boolean)?);
            }
            if let Some(source) = &field.options.offset {
                binding = binding
                    .with_offset(state.parse_typed(source, Some(&scope_ctx), StaticType::Integer)?);
            }
            if let Some(source) = &field.options.init {
                binding = binding.with_init(state.parse_any(source, Some(&scope_ctx))?);
            }
            bindings.push(pipeline.finish_binding(binding));
            state.path.pop();
        }

        let size = object_size(&bindings);
        let codec: Arc<dyn Codec> = Arc::new(ObjectCodec::new(
            ty.clone(),
            Arc::clone(&schema),
            bindings,
            size,
        ));
        lazy.resolve(&codec);
        state.pending.remove(name);
        Ok(Some(codec))
    }
}

/// Guarded sum of the bindings' sizes: a conditional binding contributes
/// its child size when the guard holds and zero otherwise; offset bindings
/// contribute nothing because their cursor movement is restored.
fn object_size(bindings: &[Binding]) -> Option<Expr> {
    let mut total = Expr::Integer(0);
    for binding in bindings {
        if binding.offset().is_some() {
            continue;
        }
        let child = binding.codec().size()?.clone();
        let contribution = match binding.guard() {
            Some(guard) => Expr::Cond {
                test: Box::new(guard.clone()),
                then: Box::new(child),
                otherwise: Box::new(Expr::Integer(0)),
            },
            None => child,
        };
        total = Expr::Arith {
            op: ArithOp::Add,
            lhs: Box::new(total),
            rhs: Box::new(contribution),
        };
    }
    Some(total.fold())
}

/// Handle standing in for a codec of a type still under construction;
/// recursive mentions of a composite dereference to the finished codec on
/// first use. Kept weak so a cyclic codec tree still drops.
struct LazyCodec {
    ty: TypeRef,
    slot: OnceLock<Weak<dyn Codec>>,
}

impl LazyCodec {
    fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            slot: OnceLock::new(),
        }
    }

    fn resolve(&self, codec: &Arc<dyn Codec>) {
        let _ = self.slot.set(Arc::downgrade(codec));
    }

    fn target(&self) -> Arc<dyn Codec> {
        self.slot
            .get()
            .and_then(Weak::upgrade)
            .expect("forward reference resolved while the codec tree is alive")
    }
}

impl fmt::Debug for LazyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCodec").field("ty", &self.ty).finish()
    }
}

impl Codec for LazyCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        self.target().decode(buffer, resolver, builder)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        self.target().encode(value, channel, resolver)
    }

    fn size(&self) -> Option<&Expr> {
        // A type that mentions itself can never have a static size.
        None
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}

/// Codec decorator emitting `tracing` events around every decode and
/// encode of the codecs it wraps.
#[derive(Debug, Default, Clone)]
pub struct TraceDecorator;

impl CodecDecorator for TraceDecorator {
    fn decorate(
        &self,
        codec: Arc<dyn Codec>,
        _ty: &TypeRef,
        _options: &FieldOptions,
    ) -> Arc<dyn Codec> {
        Arc::new(TraceCodec { inner: codec })
    }
}

#[derive(Debug)]
struct TraceCodec {
    inner: Arc<dyn Codec>,
}

impl Codec for TraceCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let start = buffer.position();
        let value = self.inner.decode(buffer, resolver, builder)?;
        trace!(ty = ?self.inner.type_ref(), start, end = buffer.position(), "decoded");
        Ok(value)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let start = channel.position();
        self.inner.encode(value, channel, resolver)?;
        trace!(ty = ?self.inner.type_ref(), start, end = channel.position(), "encoded");
        Ok(())
    }

    fn size(&self) -> Option<&Expr> {
        self.inner.size()
    }

    fn type_ref(&self) -> &TypeRef {
        self.inner.type_ref()
    }
}
