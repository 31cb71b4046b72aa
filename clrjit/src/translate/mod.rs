//! The method translator (spec.md §4.3): the two-pass CIL-to-IR lowering
//! that is this crate's core, consuming every other module.
//!
//! Grounded in `original_source/src/dotnet/jit/jit.c`'s `jit_method` (the
//! pass-one/pass-two split, the label table, the spill-on-first-ldarga
//! policy) and `jit_method_callback` (the opcode dispatch switch), expressed
//! against the abstract [`crate::ir::Builder`] instead of a concrete spidir
//! module handle.

mod label;
mod signature;

use crate::classify::{self, SlotKind};
use crate::context::JitContext;
use crate::disasm::{self, ControlFlow, Instruction, OpKind, Operand};
use crate::error::{JitError, JitResult};
use crate::ir::{Builder, IntCC, IrType};
use crate::metadata::{intermediate_type, Primitives, Resolver, RuntimeMethodBase, RuntimeTypeInfo, TypeKind};

use label::LabelTable;
use signature::{build_args_table, build_signature, ArgSlot, ArgState, Signature};

/// Tuning knobs for one translation (spec.md §7 Configuration): currently
/// just an optional per-instruction trace hook, the way
/// `cilium::structured::context::Context` takes an optional tracing span
/// rather than a full logging framework.
#[derive(Default)]
pub struct Options {
	pub on_instruction: Option<Box<dyn FnMut(u32, &Instruction)>>,
}

/// Translates `method`'s body into an IR function named (after mangling)
/// from `name`, registering it with `ctx`'s builder.
pub fn translate_method<'l, B: Builder, R: Resolver<'l>>(
	ctx: &mut JitContext<'l, B>,
	resolver: &R,
	method: &'l RuntimeMethodBase<'l>,
	name: &str,
	options: &mut Options,
) -> JitResult<B::Func> {
	let mangled = ctx.mangle(method, name);
	let memcpy_func = ctx.memcpy_func();
	let memset_func = ctx.memset_func();
	let JitContext { ref primitives, ref mut builder, .. } = *ctx;

	let sig = build_signature(primitives, method);
	let func = builder.create_function(&mangled, &sig.params, sig.ret);
	builder.build_function(func, |builder| translate_body(builder, primitives, memcpy_func, memset_func, resolver, method, &sig, options))?;
	Ok(func)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ScalarKind {
	I32,
	I64,
	NativeInt,
}

fn scalar_kind<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>) -> Option<ScalarKind> {
	if std::ptr::eq(ty, primitives.int32) {
		Some(ScalarKind::I32)
	} else if std::ptr::eq(ty, primitives.int64) {
		Some(ScalarKind::I64)
	} else if std::ptr::eq(ty, primitives.intptr) || std::ptr::eq(ty, primitives.uintptr) {
		Some(ScalarKind::NativeInt)
	} else {
		None
	}
}

fn scalar_ir_type(kind: ScalarKind) -> IrType {
	match kind {
		ScalarKind::I32 => IrType::I32,
		ScalarKind::I64 | ScalarKind::NativeInt => IrType::I64,
	}
}

/// Binary-arithmetic type rule (spec.md §4.3): both `Int32` stay `Int32`,
/// both `Int64` stay `Int64`, any mix of `Int32`/native-int widens to native
/// int; anything else (a reference, a struct, a float) is a verification
/// failure the translator cannot recover from.
fn arithmetic_result_type<'l>(primitives: &Primitives<'l>, a: &'l RuntimeTypeInfo<'l>, b: &'l RuntimeTypeInfo<'l>) -> JitResult<(&'l RuntimeTypeInfo<'l>, IrType)> {
	match (scalar_kind(primitives, a), scalar_kind(primitives, b)) {
		(Some(ScalarKind::I32), Some(ScalarKind::I32)) => Ok((primitives.int32, IrType::I32)),
		(Some(ScalarKind::I64), Some(ScalarKind::I64)) => Ok((primitives.int64, IrType::I64)),
		(Some(ScalarKind::I32), Some(ScalarKind::NativeInt)) | (Some(ScalarKind::NativeInt), Some(ScalarKind::I32)) | (Some(ScalarKind::NativeInt), Some(ScalarKind::NativeInt)) => {
			Ok((primitives.intptr, IrType::I64))
		}
		_ => Err(JitError::InvalidOperand { opcode: "binary arithmetic", reason: "operand types are not compatible scalar kinds" }),
	}
}

fn is_ref_like(ty: &RuntimeTypeInfo<'_>) -> bool {
	ty.is_by_ref || ty.kind == TypeKind::ReferenceType
}

/// Whether a value typed `actual` may flow into a `declared`-typed slot —
/// used by `ret` to check the popped value against the method's declared
/// return type (spec.md §4.3: "verify assignability to the declared return
/// type"). Exact match and reference/by-ref covariance are always allowed;
/// `Int32` may widen into a native int return, matching the same widening
/// `arithmetic_result_type` already permits for binary operators.
fn is_assignable<'l>(primitives: &Primitives<'l>, actual: &'l RuntimeTypeInfo<'l>, declared: &'l RuntimeTypeInfo<'l>) -> bool {
	let actual = intermediate_type(primitives, actual);
	let declared = intermediate_type(primitives, declared);
	if std::ptr::eq(actual, declared) {
		return true;
	}
	if is_ref_like(actual) && is_ref_like(declared) {
		return true;
	}
	matches!(
		(scalar_kind(primitives, actual), scalar_kind(primitives, declared)),
		(Some(ScalarKind::I32), Some(ScalarKind::NativeInt)) | (Some(ScalarKind::NativeInt), Some(ScalarKind::I32))
	)
}

/// Resolves a compare/conditional-branch opcode to an `icmp` kind plus
/// whether operands must be swapped, since the IR only exposes `LT`/`LE`
/// forms (spec.md §6). Also validates operand compatibility: reference and
/// by-reference values only support identity-style comparisons
/// (`eq`/`ne`/`cgt.un`, the `x != null` idiom), matching spec.md §4.3's
/// comparisons note.
fn compare_spec<'l>(op: OpKind, primitives: &Primitives<'l>, a: &'l RuntimeTypeInfo<'l>, b: &'l RuntimeTypeInfo<'l>) -> JitResult<(IntCC, bool)> {
	let ref_allowed = matches!(op, OpKind::Ceq | OpKind::Beq | OpKind::BneUn | OpKind::CgtUn);
	if is_ref_like(a) && is_ref_like(b) {
		if !ref_allowed {
			return Err(JitError::InvalidOperand { opcode: "compare", reason: "reference/by-ref operands only support eq, ne, and cgt.un comparisons" });
		}
		if (a.is_by_ref || b.is_by_ref) && !std::ptr::eq(a, b) {
			return Err(JitError::InvalidOperand { opcode: "compare", reason: "by-reference operands must share the same type" });
		}
	} else {
		arithmetic_result_type(primitives, a, b)?;
	}
	Ok(match op {
		OpKind::Beq | OpKind::Ceq => (IntCC::Eq, false),
		OpKind::BneUn => (IntCC::Ne, false),
		OpKind::Blt | OpKind::Clt => (IntCC::Slt, false),
		OpKind::BltUn | OpKind::CltUn => (IntCC::Ult, false),
		OpKind::Ble => (IntCC::Sle, false),
		OpKind::BleUn => (IntCC::Ule, false),
		OpKind::Bgt | OpKind::Cgt => (IntCC::Slt, true),
		OpKind::BgtUn | OpKind::CgtUn => (IntCC::Ult, true),
		OpKind::Bge => (IntCC::Sle, true),
		OpKind::BgeUn => (IntCC::Ule, true),
		_ => unreachable!("compare_spec called with a non-comparison opcode"),
	})
}

fn ir_type_of<'l>(primitives: &Primitives<'l>, ty: &'l RuntimeTypeInfo<'l>, force_ptr: bool) -> IrType {
	if force_ptr {
		return IrType::Ptr;
	}
	match classify::argument_kind(primitives, ty) {
		SlotKind::I32 => IrType::I32,
		SlotKind::I64 => IrType::I64,
		SlotKind::Ptr | SlotKind::None => IrType::Ptr,
	}
}

fn variable_index(instr: &Instruction) -> JitResult<usize> {
	match instr.operand {
		Operand::Variable(n) => Ok(n as usize),
		_ => Err(JitError::InvalidOperand { opcode: "argument/local", reason: "expected a variable index operand" }),
	}
}

fn branch_target(instr: &Instruction) -> JitResult<u32> {
	match instr.operand {
		Operand::BranchTarget(target) => Ok(target),
		_ => Err(JitError::InvalidOperand { opcode: "branch", reason: "missing branch target operand" }),
	}
}

fn fallthrough_address(instr: &Instruction) -> u32 {
	instr.offset + instr.length as u32
}

/// Emits the stack-slot prologue for one argument the first time it is
/// addressed (`ldarga`/`starg`): allocate a slot sized for the arg's type,
/// copy (or memcpy) the incoming parameter into it, and mark the slot so
/// every later reference goes through it instead of `param_ref` (spec.md
/// §4.3 Preamble / pass one, "spill on first use").
fn mark_spill<'l, B: Builder>(builder: &mut B, primitives: &Primitives<'l>, memcpy_func: B::Func, sig: &Signature, args: &mut [ArgSlot<'l, B::Value>], index: usize) {
	if let ArgState::Direct = args[index].state {
		let ir_index = sig.args_offset + index as u32;
		let incoming = builder.param_ref(ir_index);
		let ty = args[index].ty;
		let slot = builder.stackslot(ty.stack_size.max(1), ty.stack_alignment.max(1));
		if !args[index].is_this_pointer && classify::is_struct_type(primitives, ty) {
			let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
			builder.call(IrType::Ptr, memcpy_func, &[slot, incoming, size]);
		} else {
			builder.store(incoming, slot);
		}
		args[index].state = ArgState::Spilled(slot);
	}
}

fn zero_local<'l, B: Builder>(builder: &mut B, primitives: &Primitives<'l>, memset_func: B::Func, ty: &'l RuntimeTypeInfo<'l>, slot: B::Value) {
	if classify::is_struct_type(primitives, ty) {
		let zero_byte = builder.iconst(IrType::I32, 0);
		let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
		builder.call(IrType::Ptr, memset_func, &[slot, zero_byte, size]);
	} else {
		let ir_ty = ir_type_of(primitives, ty, false);
		let zero = builder.iconst(ir_ty, 0);
		builder.store(zero, slot);
	}
}

fn translate_body<'l, B: Builder, R: Resolver<'l>>(
	builder: &mut B,
	primitives: &Primitives<'l>,
	memcpy_func: B::Func,
	memset_func: B::Func,
	resolver: &R,
	method: &'l RuntimeMethodBase<'l>,
	sig: &Signature,
	options: &mut Options,
) -> JitResult<()> {
	let entry_block = builder.create_block();
	builder.set_entry_block(entry_block);
	builder.set_block(entry_block);

	let mut args: Vec<ArgSlot<B::Value>> = build_args_table(method);

	let local_slots: Vec<B::Value> = method.body.locals.iter().map(|ty| builder.stackslot(ty.stack_size.max(1), ty.stack_alignment.max(1))).collect();
	if method.body.init_locals {
		for (ty, slot) in method.body.locals.iter().zip(local_slots.iter()) {
			zero_local(builder, primitives, memset_func, ty, *slot);
		}
	}

	let instructions = disasm::decode_method(method.body.instructions)?;
	let mut labels = LabelTable::new(entry_block);

	// Pass one: discover block boundaries and force argument spills.
	let mut prev_flow = ControlFlow::Next;
	for instr in &instructions {
		match instr.opcode {
			OpKind::Ldarga | OpKind::Starg => {
				let idx = variable_index(instr)?;
				if idx >= args.len() {
					return Err(JitError::InvalidOperand { opcode: "ldarga/starg", reason: "argument index out of range" });
				}
				mark_spill(builder, primitives, memcpy_func, sig, &mut args, idx);
			}
			_ => {}
		}
		if let Operand::BranchTarget(target) = instr.operand {
			labels.get_or_create(target, || builder.create_block());
		}
		if instr.opcode == OpKind::Switch {
			return Err(JitError::FeatureNotImplemented("switch"));
		}
		if matches!(prev_flow, ControlFlow::Return | ControlFlow::Branch | ControlFlow::CondBranch | ControlFlow::Throw) {
			labels.get_or_create(instr.offset, || builder.create_block());
		}
		prev_flow = instr.control_flow;
	}

	if args.iter().any(|a| matches!(a.state, ArgState::Spilled(_))) {
		let real_entry = builder.create_block();
		builder.branch(real_entry);
		builder.set_block(real_entry);
		labels.retarget_entry(real_entry);
	}

	// Pass two: emit IR for every instruction, crossing block boundaries
	// through the evaluation stack's slot protocol instead of SSA phis.
	let mut stack: crate::evalstack::EvalStack<B> = crate::evalstack::EvalStack::new(*primitives, method.body.max_stack_size as usize);
	let mut prev_flow = ControlFlow::Next;
	let mut label_idx = 1usize;

	for instr in &instructions {
		if let Some(hook) = options.on_instruction.as_mut() {
			hook(instr.offset, instr);
		}

		if matches!(prev_flow, ControlFlow::Return | ControlFlow::Branch | ControlFlow::Throw) {
			stack.clear();
		}

		if label_idx < labels.len() && labels.at(label_idx).0 == instr.offset {
			let (_, block) = labels.at(label_idx);
			if matches!(prev_flow, ControlFlow::Next | ControlFlow::Break | ControlFlow::Call) {
				stack.move_to_slots(builder)?;
				builder.branch(block);
			}
			builder.set_block(block);
			label_idx += 1;
		}

		dispatch(builder, primitives, memcpy_func, resolver, method, sig, &mut args, &local_slots, &mut stack, &labels, instr)?;
		prev_flow = instr.control_flow;
	}

	Ok(())
}

#[allow(clippy::too_many_arguments)]
fn dispatch<'l, B: Builder, R: Resolver<'l>>(
	builder: &mut B,
	primitives: &Primitives<'l>,
	memcpy_func: B::Func,
	resolver: &R,
	method: &'l RuntimeMethodBase<'l>,
	sig: &Signature,
	args: &mut [ArgSlot<'l, B::Value>],
	local_slots: &[B::Value],
	stack: &mut crate::evalstack::EvalStack<'l, B>,
	labels: &LabelTable<B::Block>,
	instr: &Instruction,
) -> JitResult<()> {
	match instr.opcode {
		OpKind::Nop | OpKind::DbgBreak => {}

		OpKind::Ldarg => {
			let idx = variable_index(instr)?;
			let slot = args.get(idx).ok_or(JitError::InvalidOperand { opcode: "ldarg", reason: "argument index out of range" })?;
			let ty = slot.ty;
			let is_struct = !slot.is_this_pointer && classify::is_struct_type(primitives, ty);
			// `this` is always pushed as a pointer type, even when `declaring_type`
			// is itself a value type (spec.md §4.3 Preamble) — `ty` alone would
			// make `EvalStack::push` reject it as a bare value type.
			let stack_ty = if slot.is_this_pointer { primitives.intptr } else { ty };
			match slot.state {
				ArgState::Direct => {
					let ir_index = sig.args_offset + idx as u32;
					let incoming = builder.param_ref(ir_index);
					if is_struct {
						let dest = stack.alloc(builder, ty)?;
						let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
						builder.call(IrType::Ptr, memcpy_func, &[dest, incoming, size]);
					} else {
						stack.push(stack_ty, incoming)?;
					}
				}
				ArgState::Spilled(slot_ptr) => {
					if is_struct {
						let dest = stack.alloc(builder, ty)?;
						let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
						builder.call(IrType::Ptr, memcpy_func, &[dest, slot_ptr, size]);
					} else {
						let ir_ty = ir_type_of(primitives, ty, slot.is_this_pointer);
						let value = builder.load(ir_ty, slot_ptr);
						stack.push(stack_ty, value)?;
					}
				}
			}
		}

		OpKind::Ldarga => {
			let idx = variable_index(instr)?;
			let slot = args.get(idx).ok_or(JitError::InvalidOperand { opcode: "ldarga", reason: "argument index out of range" })?;
			match slot.state {
				ArgState::Spilled(slot_ptr) => stack.push(primitives.intptr, slot_ptr)?,
				ArgState::Direct => return Err(JitError::Backend("ldarga target was not spilled by pass one".to_string())),
			}
		}

		OpKind::Starg => {
			let idx = variable_index(instr)?;
			if idx >= args.len() {
				return Err(JitError::InvalidOperand { opcode: "starg", reason: "argument index out of range" });
			}
			let (_, value) = stack.pop(builder)?;
			let is_this_pointer = args[idx].is_this_pointer;
			let ty = args[idx].ty;
			match args[idx].state {
				ArgState::Spilled(slot_ptr) => {
					if !is_this_pointer && classify::is_struct_type(primitives, ty) {
						let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
						builder.call(IrType::Ptr, memcpy_func, &[slot_ptr, value, size]);
					} else {
						builder.store(value, slot_ptr);
					}
				}
				ArgState::Direct => return Err(JitError::Backend("starg target was not spilled by pass one".to_string())),
			}
		}

		OpKind::Ldloc => {
			let idx = variable_index(instr)?;
			let ty = *method.body.locals.get(idx).ok_or(JitError::InvalidOperand { opcode: "ldloc", reason: "local index out of range" })?;
			let slot = local_slots[idx];
			if classify::is_struct_type(primitives, ty) {
				let dest = stack.alloc(builder, ty)?;
				let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
				builder.call(IrType::Ptr, memcpy_func, &[dest, slot, size]);
			} else {
				let ir_ty = ir_type_of(primitives, ty, false);
				let value = builder.load(ir_ty, slot);
				stack.push(ty, value)?;
			}
		}

		OpKind::Ldloca => {
			let idx = variable_index(instr)?;
			if idx >= local_slots.len() {
				return Err(JitError::InvalidOperand { opcode: "ldloca", reason: "local index out of range" });
			}
			stack.push(primitives.intptr, local_slots[idx])?;
		}

		OpKind::Stloc => {
			let idx = variable_index(instr)?;
			let ty = *method.body.locals.get(idx).ok_or(JitError::InvalidOperand { opcode: "stloc", reason: "local index out of range" })?;
			let slot = local_slots[idx];
			let (_, value) = stack.pop(builder)?;
			if classify::is_struct_type(primitives, ty) {
				let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
				builder.call(IrType::Ptr, memcpy_func, &[slot, value, size]);
			} else {
				builder.store(value, slot);
			}
		}

		OpKind::LdcI4 => {
			let value = match instr.operand {
				Operand::Int32(value) => value,
				_ => return Err(JitError::InvalidOperand { opcode: "ldc.i4", reason: "missing int32 operand" }),
			};
			// Reinterpreted as unsigned 32-bit before widening, to avoid sign
			// extension (spec.md §4.3, `ldc.i4`).
			let v = builder.iconst(IrType::I32, value as u32 as i64);
			stack.push(primitives.int32, v)?;
		}

		OpKind::LdcI8 => {
			let value = match instr.operand {
				Operand::Int64(value) => value,
				_ => return Err(JitError::InvalidOperand { opcode: "ldc.i8", reason: "missing int64 operand" }),
			};
			let v = builder.iconst(IrType::I64, value);
			stack.push(primitives.int64, v)?;
		}

		OpKind::Dup => {
			let (ty, value) = stack.pop(builder)?;
			if classify::is_struct_type(primitives, ty) {
				// Simplification: two independent copies rather than a true
				// aliasing of one slot, so the pool's cursor accounting stays
				// simple (see DESIGN.md).
				let size = builder.iconst(IrType::Ptr, ty.stack_size as i64);
				let first = stack.alloc(builder, ty)?;
				builder.call(IrType::Ptr, memcpy_func, &[first, value, size]);
				let second = stack.alloc(builder, ty)?;
				builder.call(IrType::Ptr, memcpy_func, &[second, value, size]);
			} else {
				stack.push(ty, value)?;
				stack.push(ty, value)?;
			}
		}

		OpKind::Pop => {
			stack.pop(builder)?;
		}

		OpKind::Ldfld => {
			let token = match instr.operand {
				Operand::Field(token) => token,
				_ => return Err(JitError::InvalidOperand { opcode: "ldfld", reason: "missing field token" }),
			};
			let field = resolver.resolve_field(token)?;
			if field.is_static {
				return Err(JitError::FeatureNotImplemented("static field access"));
			}
			let (recv_ty, recv_val) = stack.pop(builder)?;
			if !(recv_ty.is_by_ref || recv_ty.kind == TypeKind::ReferenceType || classify::is_struct_type(primitives, recv_ty)) {
				return Err(JitError::InvalidOperand { opcode: "ldfld", reason: "receiver must be a reference, by-ref, or struct pointer" });
			}
			let field_ptr = if field.field_offset == 0 {
				recv_val
			} else {
				let offset = builder.iconst(IrType::Ptr, field.field_offset as i64);
				builder.ptroff(recv_val, offset)
			};
			if classify::is_struct_type(primitives, field.field_type) {
				let dest = stack.alloc(builder, field.field_type)?;
				let size = builder.iconst(IrType::Ptr, field.field_type.stack_size as i64);
				builder.call(IrType::Ptr, memcpy_func, &[dest, field_ptr, size]);
			} else {
				let ir_ty = ir_type_of(primitives, field.field_type, false);
				let value = builder.load(ir_ty, field_ptr);
				stack.push(field.field_type, value)?;
			}
		}

		OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div | OpKind::DivUn | OpKind::And | OpKind::Or | OpKind::Xor => {
			let (ty_b, b) = stack.pop(builder)?;
			let (ty_a, a) = stack.pop(builder)?;
			let (result_ty, _) = arithmetic_result_type(primitives, ty_a, ty_b)?;
			let result = match instr.opcode {
				OpKind::Add => builder.iadd(a, b),
				OpKind::Sub => builder.isub(a, b),
				OpKind::Mul => builder.imul(a, b),
				OpKind::Div => builder.sdiv(a, b),
				OpKind::DivUn => builder.udiv(a, b),
				OpKind::And => builder.and(a, b),
				OpKind::Or => builder.or(a, b),
				OpKind::Xor => builder.xor(a, b),
				_ => unreachable!(),
			};
			stack.push(result_ty, result)?;
		}

		OpKind::Shl | OpKind::Shr | OpKind::ShrUn => {
			let (ty_shift, shift_val) = stack.pop(builder)?;
			let (ty_val, val) = stack.pop(builder)?;
			let value_kind = scalar_kind(primitives, ty_val).ok_or(JitError::InvalidOperand { opcode: "shift", reason: "value operand must be a scalar integer" })?;
			scalar_kind(primitives, ty_shift).ok_or(JitError::InvalidOperand { opcode: "shift", reason: "shift amount must be a scalar integer" })?;
			let result_ty = match value_kind {
				ScalarKind::I32 => primitives.int32,
				ScalarKind::I64 => primitives.int64,
				ScalarKind::NativeInt => primitives.intptr,
			};
			let result = match instr.opcode {
				OpKind::Shl => builder.shl(val, shift_val),
				OpKind::Shr => builder.ashr(val, shift_val),
				OpKind::ShrUn => builder.lshr(val, shift_val),
				_ => unreachable!(),
			};
			stack.push(result_ty, result)?;
		}

		OpKind::Not | OpKind::Neg => {
			let (ty, val) = stack.pop(builder)?;
			let kind = scalar_kind(primitives, ty).ok_or(JitError::InvalidOperand { opcode: "not/neg", reason: "operand must be a scalar integer" })?;
			let ir_ty = scalar_ir_type(kind);
			let result_ty = match kind {
				ScalarKind::I32 => primitives.int32,
				ScalarKind::I64 => primitives.int64,
				ScalarKind::NativeInt => primitives.intptr,
			};
			let result = if instr.opcode == OpKind::Not {
				let minus_one = builder.iconst(ir_ty, -1);
				builder.xor(val, minus_one)
			} else {
				let zero = builder.iconst(ir_ty, 0);
				builder.isub(zero, val)
			};
			stack.push(result_ty, result)?;
		}

		OpKind::Ceq | OpKind::Cgt | OpKind::CgtUn | OpKind::Clt | OpKind::CltUn => {
			let (ty_b, b) = stack.pop(builder)?;
			let (ty_a, a) = stack.pop(builder)?;
			let (cc, swap) = compare_spec(instr.opcode, primitives, ty_a, ty_b)?;
			let result = if swap { builder.icmp(cc, IrType::I32, b, a) } else { builder.icmp(cc, IrType::I32, a, b) };
			stack.push(primitives.int32, result)?;
		}

		OpKind::Beq | OpKind::Bge | OpKind::Bgt | OpKind::Ble | OpKind::Blt | OpKind::BneUn | OpKind::BgeUn | OpKind::BgtUn | OpKind::BleUn | OpKind::BltUn => {
			let target = branch_target(instr)?;
			let (ty_b, b) = stack.pop(builder)?;
			let (ty_a, a) = stack.pop(builder)?;
			let (cc, swap) = compare_spec(instr.opcode, primitives, ty_a, ty_b)?;
			let cond = if swap { builder.icmp(cc, IrType::I32, b, a) } else { builder.icmp(cc, IrType::I32, a, b) };
			stack.move_to_slots(builder)?;
			let then_block = labels.get(target).ok_or(JitError::UnreachableBlock(target))?;
			let else_block = labels.get(fallthrough_address(instr)).ok_or(JitError::UnreachableBlock(fallthrough_address(instr)))?;
			builder.brcond(cond, then_block, else_block);
		}

		OpKind::Brtrue | OpKind::Brfalse => {
			let target = branch_target(instr)?;
			let (ty, val) = stack.pop(builder)?;
			if !(is_ref_like(ty) || scalar_kind(primitives, ty).is_some()) {
				return Err(JitError::InvalidOperand { opcode: "brtrue/brfalse", reason: "operand must be a scalar or reference type" });
			}
			let ir_ty = ir_type_of(primitives, ty, false);
			let zero = builder.iconst(ir_ty, 0);
			let cc = if instr.opcode == OpKind::Brtrue { IntCC::Ne } else { IntCC::Eq };
			let cond = builder.icmp(cc, IrType::I32, val, zero);
			stack.move_to_slots(builder)?;
			let then_block = labels.get(target).ok_or(JitError::UnreachableBlock(target))?;
			let else_block = labels.get(fallthrough_address(instr)).ok_or(JitError::UnreachableBlock(fallthrough_address(instr)))?;
			builder.brcond(cond, then_block, else_block);
		}

		OpKind::Br => {
			let target = branch_target(instr)?;
			stack.move_to_slots(builder)?;
			let block = labels.get(target).ok_or(JitError::UnreachableBlock(target))?;
			builder.branch(block);
		}

		OpKind::Ret => {
			if sig.struct_return {
				return Err(JitError::FeatureNotImplemented("struct return"));
			}
			if std::ptr::eq(method.return_parameter_type, primitives.void) {
				builder.ret(None);
			} else {
				let (ty, value) = stack.pop(builder)?;
				if !is_assignable(primitives, ty, method.return_parameter_type) {
					return Err(JitError::InvalidOperand { opcode: "ret", reason: "returned value is not assignable to the declared return type" });
				}
				builder.ret(Some(value));
			}
		}

		OpKind::ConvI4 | OpKind::ConvU4 => {
			let (ty, val) = stack.pop(builder)?;
			let kind = scalar_kind(primitives, ty).ok_or(JitError::InvalidOperand { opcode: "conv.i4/u4", reason: "source must be a scalar integer" })?;
			let result = match kind {
				ScalarKind::I32 => val,
				ScalarKind::I64 | ScalarKind::NativeInt => builder.itrunc(IrType::I32, val),
			};
			stack.push(primitives.int32, result)?;
		}

		OpKind::ConvI8 | OpKind::ConvU8 => {
			let (ty, val) = stack.pop(builder)?;
			let kind = scalar_kind(primitives, ty).ok_or(JitError::InvalidOperand { opcode: "conv.i8/u8", reason: "source must be a scalar integer" })?;
			let signed = instr.opcode == OpKind::ConvI8;
			let result = match kind {
				ScalarKind::I32 => builder.iext(IrType::I64, val, signed),
				ScalarKind::I64 | ScalarKind::NativeInt => val,
			};
			stack.push(primitives.int64, result)?;
		}

		OpKind::ConvI | OpKind::ConvU => {
			let (ty, val) = stack.pop(builder)?;
			let kind = scalar_kind(primitives, ty).ok_or(JitError::InvalidOperand { opcode: "conv.i/u", reason: "source must be a scalar integer" })?;
			let signed = instr.opcode == OpKind::ConvI;
			let result = match kind {
				ScalarKind::I32 => builder.iext(IrType::I64, val, signed),
				ScalarKind::I64 | ScalarKind::NativeInt => val,
			};
			stack.push(primitives.intptr, result)?;
		}

		OpKind::Switch => unreachable!("pass one aborts translation before pass two ever dispatches a switch"),

		OpKind::Unsupported(name) => return Err(JitError::FeatureNotImplemented(name)),
	}

	Ok(())
}
