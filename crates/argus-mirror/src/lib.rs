//! Runtime introspection capability for Argus.
//!
//! Rust resolves member access at compile time, so a reflective utility like
//! `argus-reflect` cannot lean on the language itself. This crate defines the
//! explicit capability it operates against instead: the [`Mirror`] trait
//! resolves classes by binary name inside a loading context, reports declared
//! members and supertype edges, overrides member accessibility, and reads,
//! writes, and invokes through opaque handles.
//!
//! [`HostMirror`] is the in-process implementation. Hosts register class
//! shapes at runtime (method and constructor bodies are native closures) and
//! the mirror maintains the object heap, static storage, and accessibility
//! state. A remote mirror (a debug-wire adapter, say) can implement the same
//! trait without the layers above changing.

mod access;
mod descriptor;
mod host;
mod mirror;
mod value;

pub use access::{
    is_public, is_static, ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE, ACC_PROTECTED,
    ACC_PUBLIC, ACC_STATIC,
};
pub use descriptor::{
    parse_field_descriptor, parse_method_descriptor, BaseType, DescriptorError, FieldType,
    MethodDescriptor, ReturnType,
};
pub use host::{ClassDef, ConstructorDef, FieldDef, HostMirror, MethodDef, NativeBody};
pub use mirror::{assignable, FieldInfo, MemberId, MethodInfo, Mirror, MirrorError, Thrown};
pub use value::Value;

pub type ClassId = u64;
pub type ObjectId = u64;
pub type FieldId = u64;
pub type MethodId = u64;
pub type LoaderId = u64;

/// The loading context that always exists; the core classes live here.
pub const BOOTSTRAP_LOADER: LoaderId = 0;

/// Normalizes a class name to binary form (`java.util.List`).
///
/// Callers routinely hold internal, slash-delimited spellings; every lookup
/// in this crate accepts either.
pub fn binary_name(name: &str) -> String {
    name.replace('/', ".")
}
