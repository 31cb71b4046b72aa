use crate::error::JitResult;
use crate::metadata::{FieldInfo, MetadataToken, RuntimeMethodBase, RuntimeTypeInfo};

/// Stands in for the "assembly loader and metadata reader" collaborator
/// spec.md §1 names out of scope. The translator never reads tables or
/// blob heaps directly — it resolves a [`MetadataToken`] it got from the
/// disassembler through whichever `Resolver` the caller supplied, exactly as
/// `cilium::structured::context::Context` hides its own table/heap access
/// behind the `AssemblyResolver` trait.
pub trait Resolver<'l> {
	fn resolve_method(&self, token: MetadataToken) -> JitResult<&'l RuntimeMethodBase<'l>>;
	fn resolve_field(&self, token: MetadataToken) -> JitResult<&'l FieldInfo<'l>>;
	fn resolve_type(&self, token: MetadataToken) -> JitResult<&'l RuntimeTypeInfo<'l>>;
	fn resolve_string(&self, token: MetadataToken) -> JitResult<&'l str>;
}
