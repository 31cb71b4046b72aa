//! A just-in-time compiler front end for ECMA-335-style managed bytecode:
//! disassembles a method body and translates it into a register-based SSA
//! intermediate representation, consumed through an abstract backend
//! builder rather than any one concrete code generator.
//!
//! Start at [`translate::translate_method`]; [`context::JitContext`] is the
//! per-compilation handle everything else hangs off of.

pub mod classify;
pub mod context;
pub mod disasm;
pub mod error;
pub mod evalstack;
pub mod host;
pub mod ir;
pub mod metadata;
pub mod translate;
mod utilities;
