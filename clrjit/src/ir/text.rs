//! A dependency-free backend that records every emitted operation as a line
//! of text instead of lowering to real machine code. This is the crate's
//! test double and demo backend — every unit test and the E1–E6 integration
//! scenarios drive the translator against it, the way `cilium::structured`
//! exercises its parsing layer against an in-memory `DefaultAssemblyResolver`
//! rather than a real file system in its own tests.

use std::fmt::Write as _;

use crate::error::JitResult;
use crate::ir::{Builder, IntCC, IrType};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Block(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Value(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Func(pub u32);

struct FuncEntry {
	name: String,
	params: Vec<IrType>,
	ret: IrType,
	is_extern: bool,
	lines: Vec<String>,
}

/// Records every `Builder` call against it as a readable line; `dump`
/// renders the whole module. Intended for tests and for the `demos/`
/// binary, not for production code generation.
#[derive(Default)]
pub struct TextBuilder {
	funcs: Vec<FuncEntry>,
	cur_func: Option<usize>,
	cur_block: Option<u32>,
	next_value: u32,
	next_block: u32,
}

impl TextBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	fn fresh_value(&mut self) -> Value {
		let id = self.next_value;
		self.next_value += 1;
		Value(id)
	}

	fn push_line(&mut self, line: String) {
		let idx = self.cur_func.expect("no function is currently being built");
		self.funcs[idx].lines.push(line);
	}

	fn binop(&mut self, mnemonic: &str, a: Value, b: Value) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = {mnemonic} {a}, {b}"));
		result
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "%v{}", self.0)
	}
}

impl std::fmt::Display for Block {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "bb{}", self.0)
	}
}

impl std::fmt::Display for IrType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			IrType::I32 => write!(f, "i32"),
			IrType::I64 => write!(f, "i64"),
			IrType::Ptr => write!(f, "ptr"),
			IrType::None => write!(f, "void"),
		}
	}
}

impl std::fmt::Display for IntCC {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			IntCC::Eq => "eq",
			IntCC::Ne => "ne",
			IntCC::Slt => "slt",
			IntCC::Sle => "sle",
			IntCC::Ult => "ult",
			IntCC::Ule => "ule",
		};
		write!(f, "{s}")
	}
}

impl Builder for TextBuilder {
	type Block = Block;
	type Value = Value;
	type Func = Func;

	fn create_extern_function(&mut self, name: &str, params: &[IrType], ret: IrType) -> Func {
		let id = self.funcs.len() as u32;
		self.funcs.push(FuncEntry { name: name.to_string(), params: params.to_vec(), ret, is_extern: true, lines: Vec::new() });
		Func(id)
	}

	fn create_function(&mut self, name: &str, params: &[IrType], ret: IrType) -> Func {
		let id = self.funcs.len() as u32;
		self.funcs.push(FuncEntry { name: name.to_string(), params: params.to_vec(), ret, is_extern: false, lines: Vec::new() });
		Func(id)
	}

	fn build_function(&mut self, func: Func, emit: impl FnOnce(&mut Self) -> JitResult<()>) -> JitResult<()> {
		let previous = self.cur_func.replace(func.0 as usize);
		self.cur_block = None;
		let result = emit(self);
		self.cur_func = previous;
		result
	}

	fn create_block(&mut self) -> Block {
		let id = self.next_block;
		self.next_block += 1;
		Block(id)
	}

	fn set_entry_block(&mut self, block: Block) {
		self.push_line(format!("; entry = {block}"));
	}

	fn set_block(&mut self, block: Block) {
		self.push_line(format!("{block}:"));
		self.cur_block = Some(block.0);
	}

	fn iconst(&mut self, ty: IrType, value: i64) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = iconst.{ty} {value}"));
		result
	}

	fn param_ref(&mut self, index: u32) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = param_ref {index}"));
		result
	}

	fn stackslot(&mut self, size: u32, align: u32) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = stackslot size={size} align={align}"));
		result
	}

	fn load(&mut self, ty: IrType, ptr: Value) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = load.{ty} [{ptr}]"));
		result
	}

	fn store(&mut self, value: Value, ptr: Value) {
		self.push_line(format!("store {value}, [{ptr}]"));
	}

	fn ptroff(&mut self, base: Value, offset: Value) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = ptroff {base}, {offset}"));
		result
	}

	fn iadd(&mut self, a: Value, b: Value) -> Value { self.binop("iadd", a, b) }
	fn isub(&mut self, a: Value, b: Value) -> Value { self.binop("isub", a, b) }
	fn imul(&mut self, a: Value, b: Value) -> Value { self.binop("imul", a, b) }
	fn sdiv(&mut self, a: Value, b: Value) -> Value { self.binop("sdiv", a, b) }
	fn udiv(&mut self, a: Value, b: Value) -> Value { self.binop("udiv", a, b) }
	fn and(&mut self, a: Value, b: Value) -> Value { self.binop("and", a, b) }
	fn or(&mut self, a: Value, b: Value) -> Value { self.binop("or", a, b) }
	fn xor(&mut self, a: Value, b: Value) -> Value { self.binop("xor", a, b) }
	fn shl(&mut self, a: Value, b: Value) -> Value { self.binop("shl", a, b) }
	fn ashr(&mut self, a: Value, b: Value) -> Value { self.binop("ashr", a, b) }
	fn lshr(&mut self, a: Value, b: Value) -> Value { self.binop("lshr", a, b) }

	fn icmp(&mut self, kind: IntCC, result_type: IrType, a: Value, b: Value) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = icmp.{result_type} {kind} {a}, {b}"));
		result
	}

	fn itrunc(&mut self, ty: IrType, value: Value) -> Value {
		let result = self.fresh_value();
		self.push_line(format!("{result} = itrunc.{ty} {value}"));
		result
	}

	fn iext(&mut self, ty: IrType, value: Value, signed: bool) -> Value {
		let result = self.fresh_value();
		let mnemonic = if signed { "sext" } else { "uext" };
		self.push_line(format!("{result} = {mnemonic}.{ty} {value}"));
		result
	}

	fn branch(&mut self, block: Block) {
		self.push_line(format!("br {block}"));
	}

	fn brcond(&mut self, cond: Value, then_block: Block, else_block: Block) {
		self.push_line(format!("brcond {cond}, {then_block}, {else_block}"));
	}

	fn ret(&mut self, value: Option<Value>) {
		match value {
			Some(value) => self.push_line(format!("ret {value}")),
			None => self.push_line("ret void".to_string()),
		}
	}

	fn call(&mut self, result_type: IrType, func: Func, args: &[Value]) -> Value {
		let name = &self.funcs[func.0 as usize].name;
		let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
		let result = self.fresh_value();
		self.push_line(format!("{result} = call.{result_type} @{name}({args})"));
		result
	}

	fn dump(&self, sink: &mut dyn std::fmt::Write) -> std::fmt::Result {
		for entry in &self.funcs {
			let params = entry.params.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
			if entry.is_extern {
				writeln!(sink, "extern fn {}({}) -> {};", entry.name, params, entry.ret)?;
				continue;
			}
			writeln!(sink, "fn {}({}) -> {} {{", entry.name, params, entry.ret)?;
			for line in &entry.lines {
				if line.ends_with(':') {
					writeln!(sink, "{line}")?;
				} else {
					writeln!(sink, "    {line}")?;
				}
			}
			writeln!(sink, "}}")?;
		}
		Ok(())
	}
}

impl TextBuilder {
	/// Convenience for tests: render the whole module to a `String`.
	pub fn render(&self) -> String {
		let mut out = String::new();
		self.dump(&mut out).expect("writing to a String never fails");
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_a_trivial_function() {
		let mut b = TextBuilder::new();
		let f = b.create_function("Foo", &[], IrType::I32);
		b.build_function(f, |b| {
			let entry = b.create_block();
			b.set_entry_block(entry);
			b.set_block(entry);
			let forty_two = b.iconst(IrType::I32, 42);
			b.ret(Some(forty_two));
			Ok(())
		}).unwrap();

		let rendered = b.render();
		assert!(rendered.contains("fn Foo() -> i32 {"));
		assert!(rendered.contains("iconst.i32 42"));
		assert!(rendered.contains("ret %v0"));
	}
}
