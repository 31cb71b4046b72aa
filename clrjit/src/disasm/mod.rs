//! CIL-style bytecode disassembler (spec.md §3's "Instruction", produced by
//! the disassembler the translator's pass one and pass two walk).
//!
//! Grounded in `cilium::raw::il`'s `OpCode`/`MethodBody` macro-driven opcode
//! table — this module keeps the same opcode byte values and short/long
//! mnemonic split, but decodes straight into the normalized,
//! translator-facing shape SPEC_FULL.md §3 describes rather than a raw
//! per-opcode payload enum: a single `Operand` sum type (the REDESIGN FLAGS
//! collapse of spec.md's `operand_type` + tagged union), and short/long
//! argument and local forms already folded into one `OpKind` each.

mod opcode;

pub use opcode::{decode_method, ControlFlow, Instruction, OpKind, Operand};
