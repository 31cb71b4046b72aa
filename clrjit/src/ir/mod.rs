//! Abstract backend IR builder (spec.md §6, "Backend IR builder interface
//! consumed by the core"). The translator only ever calls through the
//! [`Builder`] trait; this crate supplies one concrete implementation,
//! [`text`], as a dependency-free test double and demo backend standing in
//! for a real code generator (spidir, Cranelift, LLVM, ...) the way
//! `cilium::structured` keeps its parsing logic decoupled from any one
//! consumer behind a small trait.

pub mod text;

use std::fmt::Debug;

use crate::error::JitResult;

/// IR calling-convention/value type. Matches [`crate::classify::SlotKind`]
/// except it additionally names itself on values that are never arguments
/// or returns (e.g. comparison results are always `I32`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IrType {
	I32,
	I64,
	Ptr,
	None,
}

/// One-sided integer comparison kinds (spec.md §6): the IR only exposes
/// `LT`/`LE` forms, so the translator is responsible for swapping operands
/// to express `GT`/`GE` (see spec.md §4.3, comparisons and conditional
/// branches).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IntCC {
	Eq,
	Ne,
	Slt,
	Sle,
	Ult,
	Ule,
}

/// The primitive operations a backend must supply. Block management, typed
/// constants, arithmetic, comparisons, loads/stores, stack slots, branches,
/// returns and calls — exactly spec.md §6's list, generalized into a Rust
/// trait per spec.md §1 ("The core only *consumes* this as an abstract
/// builder").
pub trait Builder {
	type Block: Copy + Eq + Debug;
	type Value: Copy + Eq + Debug;
	type Func: Copy + Eq + Debug;

	fn create_extern_function(&mut self, name: &str, params: &[IrType], ret: IrType) -> Self::Func;
	fn create_function(&mut self, name: &str, params: &[IrType], ret: IrType) -> Self::Func;

	/// Builds the body of `func` by running `emit` with the builder's
	/// "current function" context set to it. Mirrors spec.md §6's
	/// `build_function(module, func, callback, ctx)`; the callback/ctx pair
	/// that lets C cross the FFI boundary is unnecessary in Rust, so `emit`
	/// is simply a closure.
	fn build_function(&mut self, func: Self::Func, emit: impl FnOnce(&mut Self) -> JitResult<()>) -> JitResult<()>;

	fn create_block(&mut self) -> Self::Block;
	fn set_entry_block(&mut self, block: Self::Block);
	fn set_block(&mut self, block: Self::Block);

	fn iconst(&mut self, ty: IrType, value: i64) -> Self::Value;
	fn param_ref(&mut self, index: u32) -> Self::Value;
	/// Allocates a stack slot and returns a pointer-typed value addressing
	/// it — spec.md's eval stack manager treats in-slot items as plain
	/// pointer values, so there is no separate "slot handle" type here.
	fn stackslot(&mut self, size: u32, align: u32) -> Self::Value;

	fn load(&mut self, ty: IrType, ptr: Self::Value) -> Self::Value;
	fn store(&mut self, value: Self::Value, ptr: Self::Value);
	fn ptroff(&mut self, base: Self::Value, offset: Self::Value) -> Self::Value;

	fn iadd(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn isub(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn imul(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn sdiv(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn udiv(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn and(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn or(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn xor(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn shl(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn ashr(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;
	fn lshr(&mut self, a: Self::Value, b: Self::Value) -> Self::Value;

	fn icmp(&mut self, kind: IntCC, result_type: IrType, a: Self::Value, b: Self::Value) -> Self::Value;

	/// Truncates `value` to `ty`, a narrower integer width. Used by the
	/// `conv_*` opcodes; spec.md §6 lists its backend interface as
	/// "indicative" rather than exhaustive, and integer truncation has no
	/// faithful expression purely in terms of the listed arithmetic ops.
	fn itrunc(&mut self, ty: IrType, value: Self::Value) -> Self::Value;

	/// Sign- or zero-extends `value` to `ty`, a wider integer width.
	fn iext(&mut self, ty: IrType, value: Self::Value, signed: bool) -> Self::Value;

	fn branch(&mut self, block: Self::Block);
	fn brcond(&mut self, cond: Self::Value, then_block: Self::Block, else_block: Self::Block);
	fn ret(&mut self, value: Option<Self::Value>);
	fn call(&mut self, result_type: IrType, func: Self::Func, args: &[Self::Value]) -> Self::Value;

	fn dump(&self, sink: &mut dyn std::fmt::Write) -> std::fmt::Result;
}
