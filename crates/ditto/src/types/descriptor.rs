//! Type descriptors: the introspection data the copy engine reasons over.
//!
//! A [`TypeDescriptor`] answers, for one concrete type, the questions the
//! policy classifier and copier factory ask: what kind of type is it, which
//! instance fields does it carry (own and inherited, in a deterministic
//! order), which of those are copyable, is there a no-arg constructor, does
//! it bear the immutable marker, and is it a generic instantiation.

use std::{fmt, sync::Arc};

use crate::value::Value;

/// Index of a registered type.
///
/// Uses `u32` to save space, mirroring the interner-id layout: builtin types
/// occupy the low indices, user registrations follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{id}", id = self.0)
    }
}

/// Structural kind of a registered type.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum TypeKind {
    /// Numeric and boolean scalars plus the null unit type.
    Primitive,
    /// The canonical string type.
    Str,
    /// Immutable byte string.
    Bytes,
    /// Seeded value types with immutable semantics: decimal, timestamps,
    /// span, uuid, version, uri.
    WellKnown,
    /// Enumeration type; instances are plain discriminant values.
    Enum,
    /// Raw pointer-like opaque handle. Never dereferenced, never copied
    /// structurally.
    Pointer,
    /// Opaque function reference.
    FunctionRef,
    /// By-reference type. Fields of this kind are excluded from copying and
    /// a root value of this kind cannot be copied at all.
    ByRef,
    /// The type-descriptor meta-type. Meta handles are process-global and
    /// aliased unconditionally.
    Meta,
    /// Fixed-shape multidimensional array over one element type.
    Array {
        /// Declared element type.
        elem: TypeId,
        /// Number of dimensions, at least 1.
        rank: usize,
    },
    /// Composite with by-value semantics: assignment duplicates, instances
    /// cannot be shared.
    ValueStruct,
    /// Composite with reference semantics: instances have identity and may
    /// be shared or form cycles.
    RefStruct,
}

impl TypeKind {
    /// Returns `true` for the kinds whose fields are excluded from the
    /// copyable-field list and whose values the engine refuses to descend
    /// into.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Pointer | Self::FunctionRef | Self::ByRef)
    }
}

/// One instance field of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, unique within the declaration chain.
    pub name: String,
    /// Declared type of the field. The runtime value may be more derived.
    pub declared: TypeId,
    /// Read-only label. Does not exclude the field from copying; the engine
    /// writes through it during reconstruction.
    pub read_only: bool,
}

/// No-arg constructor registered for a composite type.
///
/// Returns one value per layout slot, in layout order. Constructors supply
/// immediate defaults only; heap-valued fields are populated by the copier
/// afterwards, so `Value::Null` placeholders are the norm for them.
pub type CtorFn = Arc<dyn Fn() -> Result<Vec<Value>, String> + Send + Sync>;

/// Everything the engine knows about one registered type.
///
/// `layout` is the full field list gathered over the declaration chain
/// (most-derived first, universal root contributing nothing), sorted by
/// ordinal field-name comparison. Object instances store their slots in
/// layout order. `copyable` indexes the layout entries that survive the
/// opaque-kind exclusion.
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) base: Option<TypeId>,
    pub(crate) declared_fields: Vec<FieldDescriptor>,
    pub(crate) layout: Vec<FieldDescriptor>,
    pub(crate) copyable: Vec<usize>,
    pub(crate) ctor: Option<CtorFn>,
    pub(crate) immutable_marker: bool,
    pub(crate) template: Option<TypeId>,
    pub(crate) type_args: Vec<TypeId>,
    pub(crate) defined: bool,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("layout", &self.layout)
            .field("copyable", &self.copyable)
            .field("has_ctor", &self.ctor.is_some())
            .field("immutable_marker", &self.immutable_marker)
            .field("template", &self.template)
            .field("type_args", &self.type_args)
            .finish()
    }
}

impl TypeDescriptor {
    /// Registered type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structural kind.
    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Base type in the declaration chain, if any.
    #[must_use]
    pub fn base(&self) -> Option<TypeId> {
        self.base
    }

    /// Full field layout: own and inherited fields, sorted by name.
    #[must_use]
    pub fn layout(&self) -> &[FieldDescriptor] {
        &self.layout
    }

    /// Layout indices of the copyable fields (opaque-kind fields excluded).
    #[must_use]
    pub fn copyable_slots(&self) -> &[usize] {
        &self.copyable
    }

    /// Whether the type bears the user-supplied immutable marker.
    #[must_use]
    pub fn is_marked_immutable(&self) -> bool {
        self.immutable_marker
    }

    /// Generic template this type instantiates, if any.
    #[must_use]
    pub fn template(&self) -> Option<TypeId> {
        self.template
    }

    /// Type arguments of the instantiation. Empty for non-generic types.
    #[must_use]
    pub fn type_args(&self) -> &[TypeId] {
        &self.type_args
    }

    /// Layout slot index of a field by name, if present.
    #[must_use]
    pub fn slot_of(&self, field_name: &str) -> Option<usize> {
        self.layout.iter().position(|f| f.name == field_name)
    }
}

/// Builder for the definition of a composite type.
///
/// Passed to [`TypeRegistry::define`](crate::types::TypeRegistry::define)
/// after the type has been declared, so self-referential field types can
/// name the declared id.
#[derive(Default)]
pub struct StructDef {
    pub(crate) base: Option<TypeId>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) ctor: Option<CtorFn>,
    pub(crate) immutable: bool,
    pub(crate) template: Option<TypeId>,
    pub(crate) type_args: Vec<TypeId>,
}

impl StructDef {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base type. Only reference-like types may have one.
    #[must_use]
    pub fn base(mut self, base: impl Into<TypeId>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Adds a writable instance field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, declared: impl Into<TypeId>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            declared: declared.into(),
            read_only: false,
        });
        self
    }

    /// Adds a read-only instance field. Read-only fields are still copied;
    /// the engine writes through the label during reconstruction.
    #[must_use]
    pub fn read_only_field(mut self, name: impl Into<String>, declared: impl Into<TypeId>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            declared: declared.into(),
            read_only: true,
        });
        self
    }

    /// Registers a no-arg constructor invoked when the copier allocates a
    /// fresh instance, instead of the uninitialized-instance factory.
    #[must_use]
    pub fn ctor(mut self, ctor: impl Fn() -> Result<Vec<Value>, String> + Send + Sync + 'static) -> Self {
        self.ctor = Some(Arc::new(ctor));
        self
    }

    /// Applies the immutable marker: instances are aliased, never copied.
    #[must_use]
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}
