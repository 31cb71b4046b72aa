use std::fmt::{Debug, Formatter};

/// Opaque handle into the assembly loader's metadata tables.
///
/// The full ECMA-335 coded-index system (table index + row index packed into
/// a `u32`, per table-kind decoding rules) belongs to the loader, which is
/// out of scope here; the translator only ever needs to carry a token
/// through to a [`crate::metadata::Resolver`] call, so it is kept as a small
/// transparent wrapper rather than reconstructing that machinery.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct MetadataToken(pub u32);

impl Debug for MetadataToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "MetadataToken(0x{:08X})", self.0)
	}
}

impl From<u32> for MetadataToken {
	fn from(value: u32) -> Self {
		MetadataToken(value)
	}
}
