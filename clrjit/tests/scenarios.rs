//! End-to-end scenarios E1-E6 from spec.md §8, driven against the `ir::text`
//! backend and an in-memory metadata fixture (SPEC_FULL.md §3's promised
//! `clrjit/tests/scenarios.rs`).

use std::collections::HashMap;

use bumpalo::Bump;

use clrjit::context::JitContext;
use clrjit::error::{JitError, JitResult};
use clrjit::host::TracingHost;
use clrjit::ir::text::TextBuilder;
use clrjit::metadata::{
	FieldInfo, MetadataToken, MethodAttributes, MethodBody, ParameterInfo, Resolver,
	RuntimeMethodBase, RuntimeTypeInfo, TypeKind,
};
use clrjit::translate::{self, Options};

/// A tiny hand-rolled assembler: tracks byte offsets as instructions are
/// appended and patches short-form (`i8`) branch operands against named
/// labels, so scenario bytecode reads as a sequence of mnemonics instead of
/// manually counted offsets.
#[derive(Default)]
struct Asm {
	bytes: Vec<u8>,
	labels: HashMap<&'static str, u32>,
	fixups: Vec<(usize, &'static str)>,
}

impl Asm {
	fn mark(&mut self, label: &'static str) -> &mut Self {
		self.labels.insert(label, self.bytes.len() as u32);
		self
	}

	fn op(&mut self, byte: u8) -> &mut Self {
		self.bytes.push(byte);
		self
	}

	fn ldarg(&mut self, n: u8) -> &mut Self {
		assert!(n <= 3);
		self.op(0x02 + n)
	}

	fn ldarga_s(&mut self, n: u8) -> &mut Self {
		self.op(0x0F).op(n)
	}

	fn ldloc(&mut self, n: u8) -> &mut Self {
		assert!(n <= 3);
		self.op(0x06 + n)
	}

	fn stloc(&mut self, n: u8) -> &mut Self {
		assert!(n <= 3);
		self.op(0x0A + n)
	}

	fn ldc_i4(&mut self, v: i32) -> &mut Self {
		if (-1..=8).contains(&v) {
			self.op((0x16 + v) as u8)
		} else {
			self.op(0x20);
			self.bytes.extend_from_slice(&v.to_le_bytes());
			self
		}
	}

	fn add(&mut self) -> &mut Self {
		self.op(0x58)
	}

	fn ldfld(&mut self, token: u32) -> &mut Self {
		self.op(0x7B);
		self.bytes.extend_from_slice(&token.to_le_bytes());
		self
	}

	fn ret(&mut self) -> &mut Self {
		self.op(0x2A)
	}

	/// Emits a short-form branch and records a fixup resolved once every
	/// label in the method has been marked.
	fn branch_s(&mut self, opcode: u8, label: &'static str) -> &mut Self {
		self.op(opcode);
		self.fixups.push((self.bytes.len(), label));
		self.bytes.push(0); // placeholder, patched in finish()
		self
	}

	fn br_s(&mut self, label: &'static str) -> &mut Self {
		self.branch_s(0x2B, label)
	}

	fn brfalse_s(&mut self, label: &'static str) -> &mut Self {
		self.branch_s(0x2C, label)
	}

	fn blt_s(&mut self, label: &'static str) -> &mut Self {
		self.branch_s(0x32, label)
	}

	fn finish(mut self) -> Vec<u8> {
		for (operand_pos, label) in &self.fixups {
			let target = *self.labels.get(label).unwrap_or_else(|| panic!("undefined label {label}")) as i64;
			let cursor_after_operand = *operand_pos as i64 + 1;
			let relative = target - cursor_after_operand;
			self.bytes[*operand_pos] = relative as i8 as u8;
		}
		self.bytes
	}
}

struct EmptyResolver;

impl<'l> Resolver<'l> for EmptyResolver {
	fn resolve_method(&self, token: MetadataToken) -> JitResult<&'l RuntimeMethodBase<'l>> {
		Err(JitError::UnresolvedToken(token))
	}
	fn resolve_field(&self, token: MetadataToken) -> JitResult<&'l FieldInfo<'l>> {
		Err(JitError::UnresolvedToken(token))
	}
	fn resolve_type(&self, token: MetadataToken) -> JitResult<&'l RuntimeTypeInfo<'l>> {
		Err(JitError::UnresolvedToken(token))
	}
	fn resolve_string(&self, token: MetadataToken) -> JitResult<&'l str> {
		Err(JitError::UnresolvedToken(token))
	}
}

/// A resolver that answers exactly one field lookup, for E4.
struct SingleFieldResolver<'l> {
	token: MetadataToken,
	field: &'l FieldInfo<'l>,
}

impl<'l> Resolver<'l> for SingleFieldResolver<'l> {
	fn resolve_method(&self, token: MetadataToken) -> JitResult<&'l RuntimeMethodBase<'l>> {
		Err(JitError::UnresolvedToken(token))
	}
	fn resolve_field(&self, token: MetadataToken) -> JitResult<&'l FieldInfo<'l>> {
		if token == self.token {
			Ok(self.field)
		} else {
			Err(JitError::UnresolvedToken(token))
		}
	}
	fn resolve_type(&self, token: MetadataToken) -> JitResult<&'l RuntimeTypeInfo<'l>> {
		Err(JitError::UnresolvedToken(token))
	}
	fn resolve_string(&self, token: MetadataToken) -> JitResult<&'l str> {
		Err(JitError::UnresolvedToken(token))
	}
}

fn declaring_type<'l>(bump: &'l Bump, name: &'l str) -> &'l RuntimeTypeInfo<'l> {
	bump.alloc(RuntimeTypeInfo {
		name,
		namespace: "Demo",
		kind: TypeKind::ReferenceType,
		base_type: None,
		enum_underlying_type: None,
		stack_size: 8,
		stack_alignment: 8,
		is_by_ref: false,
	})
}

/// Counts `bbN:` block-label lines in rendered output — distinct from just
/// grepping for the substring `"bb"`, which would also match every `br`/
/// `brcond` reference to those same blocks.
fn count_blocks(rendered: &str) -> usize {
	rendered
		.lines()
		.filter(|line| {
			let line = line.trim();
			line.strip_prefix("bb").and_then(|rest| rest.strip_suffix(':')).is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
		})
		.count()
}

fn run<'l>(
	ctx: &mut JitContext<'l, TextBuilder>,
	resolver: &impl Resolver<'l>,
	method: &'l RuntimeMethodBase<'l>,
	name: &str,
) -> String {
	let mut options = Options::default();
	translate::translate_method(ctx, resolver, method, name, &mut options).expect("scenario method should translate cleanly");
	ctx.builder().render()
}

/// E1 - Constant return: `int Foo() { return 42; }`.
#[test]
fn e1_constant_return() {
	let bump = Bump::new();
	let host = TracingHost::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
	let int32 = ctx.primitives().int32;

	let bytecode = Asm::default().ldc_i4(42).ret().finish();
	let method = bump.alloc(RuntimeMethodBase {
		declaring_type: declaring_type(&bump, "Program"),
		attributes: MethodAttributes::STATIC,
		parameters: &[],
		return_parameter_type: int32,
		body: MethodBody { max_stack_size: 1, init_locals: true, locals: &[], instructions: bump.alloc_slice_copy(&bytecode) },
	});

	let rendered = run(&mut ctx, &EmptyResolver, method, "Foo");
	assert!(rendered.contains("iconst.i32 42"));
	assert!(rendered.contains("ret %v"));
	// No stack slots: a leaf constant return never crosses a block boundary.
	assert!(!rendered.contains("stackslot"));
	assert_eq!(count_blocks(&rendered), 1, "only the entry block should exist");
}

/// E2 - Simple branch: `int Bar(int x) { if (x == 0) return 1; return 2; }`.
#[test]
fn e2_simple_branch() {
	let bump = Bump::new();
	let host = TracingHost::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
	let int32 = ctx.primitives().int32;

	let bytecode = Asm::default()
		.ldarg(0)
		.brfalse_s("l1")
		.ldc_i4(2)
		.ret()
		.mark("l1")
		.ldc_i4(1)
		.ret()
		.finish();
	let method = bump.alloc(RuntimeMethodBase {
		declaring_type: declaring_type(&bump, "Program"),
		attributes: MethodAttributes::STATIC,
		parameters: bump.alloc([ParameterInfo { name: "x", parameter_type: int32 }]),
		return_parameter_type: int32,
		body: MethodBody { max_stack_size: 1, init_locals: true, locals: &[], instructions: bump.alloc_slice_copy(&bytecode) },
	});

	let rendered = run(&mut ctx, &EmptyResolver, method, "Bar");
	assert!(rendered.contains("brcond"));
	assert!(rendered.contains("icmp.i32 eq"), "x == 0 compiles straight to an eq comparison, no swap needed");
	assert_eq!(count_blocks(&rendered), 3, "entry, fall-through-return-2, and the L1 return-1 block");
	assert!(rendered.contains("ret %v"));
}

/// E3 - Add with native int: `nint Add(int a, nint b) { return a + b; }`.
#[test]
fn e3_add_with_native_int() {
	let bump = Bump::new();
	let host = TracingHost::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
	let int32 = ctx.primitives().int32;
	let intptr = ctx.primitives().intptr;

	let bytecode = Asm::default().ldarg(0).ldarg(1).add().ret().finish();
	let method = bump.alloc(RuntimeMethodBase {
		declaring_type: declaring_type(&bump, "Program"),
		attributes: MethodAttributes::STATIC,
		parameters: bump.alloc([ParameterInfo { name: "a", parameter_type: int32 }, ParameterInfo { name: "b", parameter_type: intptr }]),
		return_parameter_type: intptr,
		body: MethodBody { max_stack_size: 2, init_locals: true, locals: &[], instructions: bump.alloc_slice_copy(&bytecode) },
	});

	let rendered = run(&mut ctx, &EmptyResolver, method, "Add");
	assert!(rendered.contains("-> i64"), "IntPtr is a 64-bit return on this target");
	assert!(rendered.contains("iadd"));
	assert!(!rendered.contains("itrunc"), "Int32 + IntPtr widens, it never truncates");
}

/// E4 - Field load from reference: `class Box { int V; }` at offset 8,
/// `int GetV(Box b) { return b.V; }`.
#[test]
fn e4_field_load_from_reference() {
	let bump = Bump::new();
	let host = TracingHost::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
	let int32 = ctx.primitives().int32;

	let box_type = declaring_type(&bump, "Box");
	let field_token = MetadataToken(0x04000001);
	let field = bump.alloc(FieldInfo { token: field_token, name: "V", declaring_type: box_type, field_type: int32, field_offset: 8, is_static: false });
	let resolver = SingleFieldResolver { token: field_token, field };

	let bytecode = Asm::default().ldarg(0).ldfld(field_token.0).ret().finish();
	let method = bump.alloc(RuntimeMethodBase {
		declaring_type: declaring_type(&bump, "Program"),
		attributes: MethodAttributes::STATIC,
		parameters: bump.alloc([ParameterInfo { name: "b", parameter_type: box_type }]),
		return_parameter_type: int32,
		body: MethodBody { max_stack_size: 1, init_locals: true, locals: &[], instructions: bump.alloc_slice_copy(&bytecode) },
	});

	let rendered = run(&mut ctx, &resolver, method, "GetV");
	assert!(rendered.contains("ptroff"), "a nonzero field offset must emit a ptroff");
	assert!(rendered.contains("load.i32"));
	assert!(rendered.contains("ret %v"));
}

/// E5 - Loop with counter: `int Sum(int n) { int s=0,i=0; while(i<n){s+=i;i+=1;} return s; }`.
/// Exercises pass one's block discovery across a back edge and the
/// resulting conditional-branch loop shape.
#[test]
fn e5_loop_with_counter() {
	let bump = Bump::new();
	let host = TracingHost::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
	let int32 = ctx.primitives().int32;

	let bytecode = Asm::default()
		.ldc_i4(0)
		.stloc(0) // s = 0
		.ldc_i4(0)
		.stloc(1) // i = 0
		.br_s("cond")
		.mark("loop")
		.ldloc(0)
		.ldloc(1)
		.add()
		.stloc(0) // s += i
		.ldloc(1)
		.ldc_i4(1)
		.add()
		.stloc(1) // i += 1
		.mark("cond")
		.ldloc(1)
		.ldarg(0)
		.blt_s("loop") // i < n
		.ldloc(0)
		.ret()
		.finish();

	let method = bump.alloc(RuntimeMethodBase {
		declaring_type: declaring_type(&bump, "Program"),
		attributes: MethodAttributes::STATIC,
		parameters: bump.alloc([ParameterInfo { name: "n", parameter_type: int32 }]),
		return_parameter_type: int32,
		body: MethodBody { max_stack_size: 2, init_locals: true, locals: bump.alloc([int32, int32]), instructions: bump.alloc_slice_copy(&bytecode) },
	});

	let rendered = run(&mut ctx, &EmptyResolver, method, "Sum");
	assert!(rendered.contains("brcond"), "the loop condition must compile to a conditional branch");
	assert!(rendered.contains("icmp.i32 slt"), "blt on two Int32 locals is a signed less-than");
	// Both operands of every branch are re-loaded from local slots rather
	// than carried across the boundary on the evaluation stack, so no
	// cross-block eval-stack materialization is needed here; the four
	// blocks are the prologue, the loop body, the condition check, and the
	// exit (a "test at the bottom" shape pass one discovers from the
	// branch targets and the post-terminator fall-through rule alike).
	assert_eq!(count_blocks(&rendered), 4, "entry/prologue, loop body, condition check, and exit");
}

/// E6 - Argument address forces spill: a method taking `ldarga 0`.
#[test]
fn e6_argument_address_forces_spill() {
	let bump = Bump::new();
	let host = TracingHost::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
	let int32 = ctx.primitives().int32;

	let bytecode = Asm::default().ldarga_s(0).ldarg(0).ret().finish();
	let method = bump.alloc(RuntimeMethodBase {
		declaring_type: declaring_type(&bump, "Program"),
		attributes: MethodAttributes::STATIC,
		parameters: bump.alloc([ParameterInfo { name: "x", parameter_type: int32 }]),
		return_parameter_type: int32,
		body: MethodBody { max_stack_size: 2, init_locals: true, locals: &[], instructions: bump.alloc_slice_copy(&bytecode) },
	});

	let rendered = run(&mut ctx, &EmptyResolver, method, "Touch");
	assert!(rendered.contains("stackslot"), "ldarga must force a spill slot in the entry block");
	assert!(rendered.contains("param_ref 0"), "the incoming parameter is copied into the slot exactly once");
	// The entry block now only holds the spill prologue and a branch into a
	// second, real entry block (spec.md §4.3's post-pass-one retargeting).
	assert_eq!(rendered.matches("; entry =").count(), 1);
	assert!(rendered.contains("br bb"), "pass one's spill prologue falls through via an explicit branch");
}
