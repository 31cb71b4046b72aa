//! Builds the IR function signature and the `args[]` table from a method's
//! metadata (spec.md §4.3 Preamble).

use crate::classify::{self, SlotKind};
use crate::ir::IrType;
use crate::metadata::{Primitives, RuntimeMethodBase, RuntimeTypeInfo};

fn slot_kind_to_ir(kind: SlotKind) -> IrType {
	match kind {
		SlotKind::I32 => IrType::I32,
		SlotKind::I64 => IrType::I64,
		SlotKind::Ptr => IrType::Ptr,
		SlotKind::None => IrType::None,
	}
}

/// The IR-level shape of a method: its parameter list (with an optional
/// leading struct-return pointer folded in), its return type, and the
/// logical-to-IR parameter index shift that leading pointer introduces.
pub struct Signature {
	pub params: Vec<IrType>,
	pub ret: IrType,
	/// 1 iff an implicit struct-return pointer occupies IR parameter 0,
	/// else 0. `ir_param_index(i) = args_offset + i`.
	pub args_offset: u32,
	pub struct_return: bool,
}

pub fn build_signature<'l>(primitives: &Primitives<'l>, method: &'l RuntimeMethodBase<'l>) -> Signature {
	let struct_return = classify::is_struct_type(primitives, method.return_parameter_type);
	let mut params = Vec::with_capacity(method.argument_count() + 1);
	if struct_return {
		params.push(IrType::Ptr);
	}
	if !method.is_static() {
		params.push(IrType::Ptr);
	}
	for parameter in method.parameters {
		params.push(slot_kind_to_ir(classify::argument_kind(primitives, parameter.parameter_type)));
	}
	let ret = if struct_return { IrType::None } else { slot_kind_to_ir(classify::return_kind(primitives, method.return_parameter_type)) };
	Signature { params, ret, args_offset: struct_return as u32, struct_return }
}

/// One entry of the `args[]` table spec.md §3 describes: "per parameter
/// slot, plus implicit `this` at index 0 for instance methods".
#[derive(Debug, Copy, Clone)]
pub enum ArgState<V> {
	/// Read straight off the IR parameter list on every use.
	Direct,
	/// Spilled to a stack slot the first time `ldarga`/`starg` touched it;
	/// every later `ldarg`/`ldarga`/`starg` goes through the slot instead.
	Spilled(V),
}

#[derive(Debug)]
pub struct ArgSlot<'l, V> {
	pub ty: &'l RuntimeTypeInfo<'l>,
	/// `this` is always addressed as a pointer regardless of whether
	/// `declaring_type` is itself a value type (spec.md §4.3 Preamble: "a
	/// by-reference to the declaring type if it is a value type; otherwise
	/// the declaring type itself") — so unlike every other slot, its
	/// struct-ness is never consulted when deciding whether a push or spill
	/// needs a memcpy.
	pub is_this_pointer: bool,
	pub state: ArgState<V>,
}

/// Builds the args[] table: `this` (if an instance method) followed by the
/// declared parameters, in the same order the signature's IR parameters
/// appear after any leading struct-return pointer.
pub fn build_args_table<'l, V: Copy>(method: &'l RuntimeMethodBase<'l>) -> Vec<ArgSlot<'l, V>> {
	let mut args = Vec::with_capacity(method.argument_count());
	if !method.is_static() {
		args.push(ArgSlot { ty: method.declaring_type, is_this_pointer: true, state: ArgState::Direct });
	}
	for parameter in method.parameters {
		args.push(ArgSlot { ty: parameter.parameter_type, is_this_pointer: false, state: ArgState::Direct });
	}
	args
}
