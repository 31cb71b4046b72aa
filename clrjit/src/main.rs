//! Demo binary: translates a hand-assembled method body through the
//! library against the text backend and prints the result, running
//! under a tracing subscriber rather than through a test harness.

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

/// A resolver with nothing to resolve: this demo's method body never emits
/// a token-bearing opcode, so every lookup failing loudly is the correct
/// behavior rather than a gap to fill in.
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

fn main() {
	#[cfg(feature = "tracing")]
	tracing_subscriber::fmt::init();

	let bump = Bump::new();
	let host = TracingHost::new();
	let builder = TextBuilder::new();
	let mut ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, builder);

	let declaring_type = bump.alloc(RuntimeTypeInfo {
		name: "Program",
		namespace: "Demo",
		kind: TypeKind::ReferenceType,
		base_type: None,
		enum_underlying_type: None,
		stack_size: 8,
		stack_alignment: 8,
		is_by_ref: false,
	});

	let int32 = ctx.primitives().int32;
	let method = bump.alloc(RuntimeMethodBase {
		declaring_type,
		attributes: MethodAttributes::STATIC,
		parameters: bump.alloc([
			ParameterInfo { name: "a", parameter_type: int32 },
			ParameterInfo { name: "b", parameter_type: int32 },
		]),
		return_parameter_type: int32,
		body: MethodBody {
			max_stack_size: 2,
			init_locals: true,
			locals: &[],
			// ldarg.0; ldarg.1; add; ret
			instructions: bump.alloc([0x02u8, 0x03, 0x58, 0x2A]),
		},
	});

	let resolver = EmptyResolver;
	let mut options = Options::default();
	translate::translate_method(&mut ctx, &resolver, method, "Add", &mut options)
		.expect("translation of a two-argument add should succeed");

	let mut rendered = String::new();
	ctx.builder().dump(&mut rendered).expect("writing to a String never fails");
	print!("{rendered}");
}
