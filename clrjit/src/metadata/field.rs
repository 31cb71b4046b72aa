use crate::metadata::{MetadataToken, RuntimeTypeInfo};

/// Matches spec.md §3's `FieldInfo` surface: enough for `ldfld` to compute an
/// offset and a load/memcpy width without resolving a full field table.
#[derive(Debug)]
pub struct FieldInfo<'l> {
	pub token: MetadataToken,
	pub name: &'l str,
	pub declaring_type: &'l RuntimeTypeInfo<'l>,
	pub field_type: &'l RuntimeTypeInfo<'l>,
	pub field_offset: u32,
	pub is_static: bool,
}
