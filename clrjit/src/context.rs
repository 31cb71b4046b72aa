//! Per-compilation context (spec.md §9 Design Notes / Open Questions,
//! "global state"). `original_source/src/dotnet/jit/jit.c` keeps its builtin
//! `memcpy`/`memset` declarations and its module handle behind file-scope
//! statics, created once on first use and guarded implicitly by the runtime
//! never JIT-compiling two methods on the same thread concurrently.
//! SPEC_FULL.md §9 resolves this for a library crate by giving every caller
//! its own [`JitContext`] value instead: no global, no lazy-init guard, and
//! `!Sync` so a context can never be shared across threads by accident —
//! concurrent compilation means one `JitContext` per worker.

use std::cell::RefCell;
use std::marker::PhantomData;

use bumpalo::Bump;
use fxhash::FxHashMap;

use crate::host::Host;
use crate::ir::{Builder, IrType};
use crate::metadata::{Primitives, RuntimeMethodBase};

/// Owns the primitive type table, the backend builder, the builtin
/// `memcpy`/`memset` externs, and the method name mangler for one
/// compilation session.
///
/// `RefCell` makes this `!Sync` on its own, but the marker field makes that
/// intent explicit rather than incidental.
pub struct JitContext<'l, B: Builder> {
	pub(crate) primitives: Primitives<'l>,
	pub(crate) builder: B,
	memcpy_func: B::Func,
	memset_func: B::Func,
	name_counts: RefCell<FxHashMap<String, u32>>,
	_not_sync: PhantomData<std::cell::Cell<()>>,
}

impl<'l, B: Builder> JitContext<'l, B> {
	/// Creates the builtin `memcpy`/`memset` extern declarations exactly
	/// once, up front, the way `jit_init` does for its statics — but as part
	/// of constructing a value rather than a lazily-guarded global.
	pub fn new(bump: &'l Bump, host: &dyn Host, mut builder: B) -> Self {
		host.log_trace("initializing JIT context");
		let memcpy_func = builder.create_extern_function("memcpy", &[IrType::Ptr, IrType::Ptr, IrType::Ptr], IrType::Ptr);
		let memset_func = builder.create_extern_function("memset", &[IrType::Ptr, IrType::I32, IrType::Ptr], IrType::Ptr);
		Self {
			primitives: Primitives::new(bump),
			builder,
			memcpy_func,
			memset_func,
			name_counts: RefCell::new(FxHashMap::default()),
			_not_sync: PhantomData,
		}
	}

	pub fn primitives(&self) -> &Primitives<'l> {
		&self.primitives
	}

	pub fn builder_mut(&mut self) -> &mut B {
		&mut self.builder
	}

	pub fn builder(&self) -> &B {
		&self.builder
	}

	pub fn memcpy_func(&self) -> B::Func {
		self.memcpy_func
	}

	pub fn memset_func(&self) -> B::Func {
		self.memset_func
	}

	/// Mangles a method identity into a function name unique within this
	/// context: `{namespace}.{declaring_type}::{method_name}`, with a `$n`
	/// suffix on the second and subsequent methods sharing that base name
	/// (overloads are not distinguished by signature, per SPEC_FULL.md §9's
	/// Open Question resolution — see `DESIGN.md`).
	pub fn mangle(&self, method: &RuntimeMethodBase<'_>, method_name: &str) -> String {
		let base = format!("{}::{}", method.declaring_type, method_name);
		let mut counts = self.name_counts.borrow_mut();
		let counter = counts.entry(base.clone()).or_insert(0);
		let mangled = if *counter == 0 { base } else { format!("{base}${}", counter) };
		*counter += 1;
		mangled
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::host::TracingHost;
	use crate::ir::text::TextBuilder;
	use crate::metadata::{MethodAttributes, RuntimeMethodBase, MethodBody, TypeKind};

	#[test]
	fn mangler_disambiguates_repeated_base_names() {
		let bump = Bump::new();
		let host = TracingHost::new();
		let ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
		let declaring_type = bump.alloc(crate::metadata::RuntimeTypeInfo {
			name: "Program",
			namespace: "Demo",
			kind: TypeKind::ReferenceType,
			base_type: None,
			enum_underlying_type: None,
			stack_size: 8,
			stack_alignment: 8,
			is_by_ref: false,
		});
		let method = RuntimeMethodBase {
			declaring_type,
			attributes: MethodAttributes::STATIC,
			parameters: &[],
			return_parameter_type: ctx.primitives().void,
			body: MethodBody { max_stack_size: 1, init_locals: true, locals: &[], instructions: &[] },
		};
		let first = ctx.mangle(&method, "Run");
		let second = ctx.mangle(&method, "Run");
		assert_eq!(first, "Demo.Program::Run");
		assert_eq!(second, "Demo.Program::Run$1");
	}

	#[test]
	fn constructing_a_context_declares_the_builtin_externs() {
		let bump = Bump::new();
		let host = TracingHost::new();
		let ctx: JitContext<TextBuilder> = JitContext::new(&bump, &host, TextBuilder::new());
		let mut out = String::new();
		ctx.builder().dump(&mut out).unwrap();
		assert!(out.contains("memcpy"));
		assert!(out.contains("memset"));
	}
}
