//! Concrete metadata model consumed by the translator.
//!
//! The real assembly loader and metadata reader are out of scope (see
//! spec.md §1's external collaborators); what lives here is the shape the
//! translator needs from them, expressed as plain arena-backed Rust types
//! plus a [`Resolver`] trait standing in for the loader itself.

mod token;
mod types;
mod method;
mod field;
mod resolver;

pub use token::MetadataToken;
pub use types::{RuntimeTypeInfo, TypeKind, Primitives, intermediate_type};
pub use method::{RuntimeMethodBase, MethodAttributes, MethodBody, ParameterInfo};
pub use field::FieldInfo;
pub use resolver::Resolver;
