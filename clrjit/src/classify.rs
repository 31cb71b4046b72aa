//! Type classifier (spec.md §4.1). Pure functions, no state beyond the
//! [`Primitives`] table passed in by the caller — there is nothing here to
//! construct, matching spec.md's framing of this component as "pure
//! functions" rather than an object.

use crate::metadata::{intermediate_type, Primitives, RuntimeTypeInfo, TypeKind};

/// IR calling-convention slot kind a value occupies as an argument or return.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SlotKind {
	I32,
	I64,
	Ptr,
	/// Illegal for an argument; valid as a return sentinel (`void`, or a
	/// struct return communicated entirely through the implicit out-pointer).
	None,
}

fn is_i32_class<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> bool {
	std::ptr::eq(ty, primitives.sbyte)
		|| std::ptr::eq(ty, primitives.byte)
		|| std::ptr::eq(ty, primitives.int16)
		|| std::ptr::eq(ty, primitives.uint16)
		|| std::ptr::eq(ty, primitives.int32)
		|| std::ptr::eq(ty, primitives.uint32)
		|| std::ptr::eq(ty, primitives.boolean)
}

fn is_i64_class<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> bool {
	std::ptr::eq(ty, primitives.int64)
		|| std::ptr::eq(ty, primitives.uint64)
		|| std::ptr::eq(ty, primitives.intptr)
		|| std::ptr::eq(ty, primitives.uintptr)
}

/// How the callee receives a parameter of type `ty` (spec.md §4.1, "Argument kind").
pub fn argument_kind<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> SlotKind {
	if std::ptr::eq(ty, primitives.void) {
		return SlotKind::None;
	}
	if ty.kind == TypeKind::Enum {
		return argument_kind(primitives, ty.enum_underlying_type.expect("enum type without underlying type"));
	}
	if is_i32_class(primitives, ty) {
		return SlotKind::I32;
	}
	if is_i64_class(primitives, ty) {
		return SlotKind::I64;
	}
	// any other value type, or any reference type
	SlotKind::Ptr
}

/// How a value of type `ty` is returned (spec.md §4.1, "Return kind") — the
/// same mapping as `argument_kind`, except a value type that would otherwise
/// classify as `Ptr` returns as `None`: the IR signature instead gets an
/// implicit leading pointer parameter the callee writes its result into.
pub fn return_kind<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> SlotKind {
	match argument_kind(primitives, ty) {
		SlotKind::Ptr if ty.is_valuetype() => SlotKind::None,
		kind => kind,
	}
}

/// `is_struct_type(T)`: true iff `intermediate_type(T)` is a value type other
/// than `Int32`, `Int64`, `IntPtr` — i.e. it needs memcpy semantics rather
/// than fitting in a single IR register.
pub fn is_struct_type<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> bool {
	let t = intermediate_type(primitives, ty);
	t.is_valuetype() && !std::ptr::eq(t, primitives.int32) && !std::ptr::eq(t, primitives.int64) && !std::ptr::eq(t, primitives.intptr)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::TypeKind;

	#[test]
	fn primitives_classify_by_width() {
		let bump = bumpalo::Bump::new();
		let primitives = Primitives::new(&bump);
		assert_eq!(argument_kind(&primitives, primitives.byte), SlotKind::I32);
		assert_eq!(argument_kind(&primitives, primitives.int64), SlotKind::I64);
		assert_eq!(argument_kind(&primitives, primitives.intptr), SlotKind::I64);
		assert_eq!(argument_kind(&primitives, primitives.void), SlotKind::None);
	}

	#[test]
	fn reference_and_struct_types_pass_by_pointer() {
		let bump = bumpalo::Bump::new();
		let primitives = Primitives::new(&bump);
		assert_eq!(argument_kind(&primitives, primitives.string), SlotKind::Ptr);

		let point = bump.alloc(RuntimeTypeInfo {
			name: "Point",
			namespace: "System.Drawing",
			kind: TypeKind::ValueType,
			base_type: None,
			enum_underlying_type: None,
			stack_size: 8,
			stack_alignment: 4,
			is_by_ref: false,
		});
		assert_eq!(argument_kind(&primitives, point), SlotKind::Ptr);
		assert!(is_struct_type(&primitives, point));
	}

	#[test]
	fn struct_return_uses_implicit_out_pointer() {
		let bump = bumpalo::Bump::new();
		let primitives = Primitives::new(&bump);
		let point = bump.alloc(RuntimeTypeInfo {
			name: "Point",
			namespace: "System.Drawing",
			kind: TypeKind::ValueType,
			base_type: None,
			enum_underlying_type: None,
			stack_size: 8,
			stack_alignment: 4,
			is_by_ref: false,
		});
		assert_eq!(return_kind(&primitives, point), SlotKind::None);
		assert_eq!(return_kind(&primitives, primitives.int32), SlotKind::I32);
	}

	#[test]
	fn enum_recurses_on_underlying_type() {
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
		assert_eq!(argument_kind(&primitives, day_of_week), SlotKind::I32);
		assert!(!is_struct_type(&primitives, day_of_week));
	}
}
