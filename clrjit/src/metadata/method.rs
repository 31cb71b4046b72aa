use bitflags::bitflags;

use crate::metadata::RuntimeTypeInfo;

bitflags! {
	#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
	pub struct MethodAttributes: u32 {
		const STATIC  = 1 << 0;
		const VIRTUAL = 1 << 1;
	}
}

#[derive(Debug)]
pub struct ParameterInfo<'l> {
	pub name: &'l str,
	pub parameter_type: &'l RuntimeTypeInfo<'l>,
}

/// Spec.md §3's `RuntimeMethodBase`, plus the `locals` extension SPEC_FULL.md
/// §4.3 documents as additive: the original collaborator exposes a locals
/// signature through `MethodBody` that the distilled spec's Data Model never
/// names, but `ldloc`/`stloc`/`ldloca` cannot be implemented without it.
#[derive(Debug)]
pub struct RuntimeMethodBase<'l> {
	pub declaring_type: &'l RuntimeTypeInfo<'l>,
	pub attributes: MethodAttributes,
	pub parameters: &'l [ParameterInfo<'l>],
	pub return_parameter_type: &'l RuntimeTypeInfo<'l>,
	pub body: MethodBody<'l>,
}

#[derive(Debug)]
pub struct MethodBody<'l> {
	pub max_stack_size: u32,
	pub init_locals: bool,
	pub locals: &'l [&'l RuntimeTypeInfo<'l>],
	pub instructions: &'l [u8],
}

impl<'l> RuntimeMethodBase<'l> {
	pub fn is_static(&self) -> bool {
		self.attributes.contains(MethodAttributes::STATIC)
	}

	/// Number of logical argument slots, including the implicit `this` for
	/// instance methods (spec.md §3's "Argument record").
	pub fn argument_count(&self) -> usize {
		self.parameters.len() + if self.is_static() { 0 } else { 1 }
	}
}
