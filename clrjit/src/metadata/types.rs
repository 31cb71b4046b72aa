use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use derivative::Derivative;

/// Coarse classification of a [`RuntimeTypeInfo`], enough to answer the
/// `is_valuetype`/`is_referencetype` predicates spec.md's Data Model section
/// requires without threading a full type-system through this crate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TypeKind {
	Primitive,
	ValueType,
	Enum,
	ReferenceType,
}

/// A type descriptor, as consumed by the classifier and translator.
///
/// Identity is by pointer (spec.md §3: "identity (equality by pointer/handle
/// suffices)"), matching how `cilium::schema::type::Type` compares itself —
/// two `RuntimeTypeInfo` values describing the same nominal type are only
/// ever the same value if they came from the same arena slot.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RuntimeTypeInfo<'l> {
	pub name: &'l str,
	pub namespace: &'l str,
	pub kind: TypeKind,
	#[derivative(Debug(format_with = "fmt_base_type"))]
	pub base_type: Option<&'l RuntimeTypeInfo<'l>>,
	#[derivative(Debug(format_with = "fmt_base_type"))]
	pub enum_underlying_type: Option<&'l RuntimeTypeInfo<'l>>,
	pub stack_size: u32,
	pub stack_alignment: u32,
	pub is_by_ref: bool,
}

fn fmt_base_type(ty: &Option<&RuntimeTypeInfo>, f: &mut Formatter<'_>) -> std::fmt::Result {
	match ty {
		Some(ty) => write!(f, "{ty}"),
		None => write!(f, "<none>"),
	}
}

impl<'l> RuntimeTypeInfo<'l> {
	pub fn is_valuetype(&self) -> bool {
		matches!(self.kind, TypeKind::ValueType | TypeKind::Enum)
	}

	pub fn is_referencetype(&self) -> bool {
		matches!(self.kind, TypeKind::ReferenceType)
	}
}

impl Display for RuntimeTypeInfo<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self.namespace.is_empty() {
			true => write!(f, "{}", self.name),
			false => write!(f, "{}.{}", self.namespace, self.name),
		}
	}
}

impl Eq for RuntimeTypeInfo<'_> {}

impl PartialEq for RuntimeTypeInfo<'_> {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(self, other)
	}
}

impl Hash for RuntimeTypeInfo<'_> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(self as *const RuntimeTypeInfo).hash(state)
	}
}

/// The canonical primitive singletons spec.md §3 names, allocated once per
/// arena and handed out by reference for the lifetime of a [`crate::context::JitContext`].
///
/// A real assembly loader interns these the same way on first load of
/// `System.Private.CoreLib`; here they are built directly rather than
/// resolved through a `Resolver`, since every translation needs them and
/// none of them can differ between runs. Every field is itself just an
/// arena pointer, so the table as a whole is cheap to copy around rather
/// than thread behind a borrow of whatever owns it.
#[derive(Copy, Clone)]
pub struct Primitives<'l> {
	pub sbyte: &'l RuntimeTypeInfo<'l>,
	pub byte: &'l RuntimeTypeInfo<'l>,
	pub int16: &'l RuntimeTypeInfo<'l>,
	pub uint16: &'l RuntimeTypeInfo<'l>,
	pub int32: &'l RuntimeTypeInfo<'l>,
	pub uint32: &'l RuntimeTypeInfo<'l>,
	pub int64: &'l RuntimeTypeInfo<'l>,
	pub uint64: &'l RuntimeTypeInfo<'l>,
	pub intptr: &'l RuntimeTypeInfo<'l>,
	pub uintptr: &'l RuntimeTypeInfo<'l>,
	pub boolean: &'l RuntimeTypeInfo<'l>,
	pub void: &'l RuntimeTypeInfo<'l>,
	pub string: &'l RuntimeTypeInfo<'l>,
}

impl<'l> Primitives<'l> {
	pub fn new(bump: &'l bumpalo::Bump) -> Self {
		let prim = |name: &'static str, size: u32| -> &'l RuntimeTypeInfo<'l> {
			bump.alloc(RuntimeTypeInfo {
				name,
				namespace: "System",
				kind: TypeKind::Primitive,
				base_type: None,
				enum_underlying_type: None,
				stack_size: size,
				stack_alignment: size,
				is_by_ref: false,
			})
		};

		let ptr_size = std::mem::size_of::<usize>() as u32;
		Self {
			sbyte: prim("SByte", 1),
			byte: prim("Byte", 1),
			int16: prim("Int16", 2),
			uint16: prim("UInt16", 2),
			int32: prim("Int32", 4),
			uint32: prim("UInt32", 4),
			int64: prim("Int64", 8),
			uint64: prim("UInt64", 8),
			intptr: prim("IntPtr", ptr_size),
			uintptr: prim("UIntPtr", ptr_size),
			boolean: prim("Boolean", 1),
			void: prim("Void", 0),
			string: bump.alloc(RuntimeTypeInfo {
				name: "String",
				namespace: "System",
				kind: TypeKind::ReferenceType,
				base_type: None,
				enum_underlying_type: None,
				stack_size: ptr_size,
				stack_alignment: ptr_size,
				is_by_ref: false,
			}),
		}
	}
}

/// `intermediate_type(T)` from spec.md §3: sub-integers widen to `Int32`,
/// enums normalize to their underlying type, everything else is unchanged.
pub fn intermediate_type<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> &'l RuntimeTypeInfo<'l> {
	if ty.kind == TypeKind::Enum {
		return intermediate_type(primitives, ty.enum_underlying_type.expect("enum type without underlying type"));
	}

	if std::ptr::eq(ty, primitives.sbyte)
		|| std::ptr::eq(ty, primitives.byte)
		|| std::ptr::eq(ty, primitives.int16)
		|| std::ptr::eq(ty, primitives.uint16)
		|| std::ptr::eq(ty, primitives.uint32)
		|| std::ptr::eq(ty, primitives.boolean)
	{
		return primitives.int32;
	}

	ty
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sub_integers_widen_to_int32() {
		let bump = bumpalo::Bump::new();
		let primitives = Primitives::new(&bump);
		assert!(std::ptr::eq(intermediate_type(&primitives, primitives.sbyte), primitives.int32));
		assert!(std::ptr::eq(intermediate_type(&primitives, primitives.boolean), primitives.int32));
		assert!(std::ptr::eq(intermediate_type(&primitives, primitives.int64), primitives.int64));
	}

	#[test]
	fn enum_normalizes_to_underlying() {
		let bump = bumpalo::Bump::new();
		let primitives = Primitives::new(&bump);
		let day_of_week = bump.alloc(RuntimeTypeInfo {
			name: "DayOfWeek",
			namespace: "System",
			kind: TypeKind::Enum,
			base_type: None,
			enum_underlying_type: Some(primitives.int32),
			stack_size: 4,
			stack_alignment: 4,
			is_by_ref: false,
		});
		assert!(std::ptr::eq(intermediate_type(&primitives, day_of_week), primitives.int32));
	}

	#[test]
	fn identity_is_by_pointer() {
		let bump = bumpalo::Bump::new();
		let primitives = Primitives::new(&bump);
		assert_eq!(primitives.int32, primitives.int32);
		assert_ne!(primitives.int32, primitives.int64);
	}
}
