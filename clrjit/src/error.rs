use std::fmt::{Display, Formatter};

use crate::metadata::MetadataToken;

/// Everything that can go wrong while disassembling or translating a method body.
///
/// This is a manual enum rather than a `thiserror`-derived one, matching the
/// style the rest of this crate already uses for its own error types.
#[derive(Debug)]
pub enum JitError {
	IoError(std::io::Error),

	/// The opcode byte (or `0xFE`-prefixed pair) does not correspond to any
	/// known instruction.
	InvalidOpcode(u8, Option<u8>),

	/// A branch, switch table entry, or argument/local index pointed outside
	/// the bounds it is required to fall within.
	InvalidOperand { opcode: &'static str, reason: &'static str },

	/// A metadata token referenced from an instruction stream resolved to
	/// nothing, or to metadata of the wrong kind.
	UnresolvedToken(MetadataToken),

	/// The evaluation stack manager was asked to pop from an empty stack, or
	/// merge two predecessors with incompatible stack shapes.
	StackUnderflow,

	/// A push or alloc would carry the evaluation stack past `max_stack_size`.
	StackOverflow,

	IncompatibleStackMerge { block: u32 },

	/// A basic block is not part of a fall-through chain but is also never
	/// targeted by any branch or switch - the translator has no way to
	/// reach it.
	UnreachableBlock(u32),

	/// A feature named in the specification for this translator but not yet
	/// implemented by it - notably returning struct-by-value results.
	FeatureNotImplemented(&'static str),

	/// The backend rejected a request the translator believes to be valid
	/// (e.g. a block was finalized twice).
	Backend(String),

	Host(String),
}

impl Display for JitError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			JitError::IoError(err) => write!(f, "i/o error while reading method body: {err}"),
			JitError::InvalidOpcode(op, None) => write!(f, "invalid opcode 0x{op:02X}"),
			JitError::InvalidOpcode(prefix, Some(op)) => write!(f, "invalid opcode 0xFE 0x{op:02X} (prefix 0x{prefix:02X})"),
			JitError::InvalidOperand { opcode, reason } => write!(f, "invalid operand for {opcode}: {reason}"),
			JitError::UnresolvedToken(token) => write!(f, "unresolved metadata token {token:?}"),
			JitError::StackUnderflow => write!(f, "evaluation stack underflow"),
			JitError::StackOverflow => write!(f, "evaluation stack overflow"),
			JitError::IncompatibleStackMerge { block } => write!(f, "incompatible evaluation stack shapes merging into block {block}"),
			JitError::UnreachableBlock(block) => write!(f, "block {block} has no predecessor"),
			JitError::FeatureNotImplemented(what) => write!(f, "not implemented: {what}"),
			JitError::Backend(msg) => write!(f, "backend error: {msg}"),
			JitError::Host(msg) => write!(f, "host error: {msg}"),
		}
	}
}

impl std::error::Error for JitError {}

impl From<std::io::Error> for JitError {
	fn from(value: std::io::Error) -> Self {
		JitError::IoError(value)
	}
}

pub type JitResult<T> = Result<T, JitError>;
