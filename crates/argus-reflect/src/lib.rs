//! Dynamic member access by name over a [`Mirror`].
//!
//! Given an object or class handle, [`Reflector`] locates fields, methods,
//! and constructors by name, walking the superclass chain and resolving
//! overloads against the dynamic types of the supplied arguments. Found
//! members have their accessibility overridden before use, so private
//! members and non-public declaring classes are reachable.
//!
//! Resolution is deliberately *first-applicable*, not most-specific: within
//! one hierarchy level, the first candidate in declaration order whose
//! parameters accept the arguments wins, even when a later overload matches
//! more tightly. Callers of the system this models depend on that order, so
//! it is preserved rather than corrected.
//!
//! Nothing is cached and no state survives a call; each operation is a
//! synchronous request against the mirror on the caller's thread.

mod resolve;

use argus_mirror::{
    binary_name, ClassId, FieldInfo, LoaderId, MemberId, MethodInfo, Mirror, MirrorError, ObjectId,
    Value,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("class `{name}` not found in loader {loader}")]
    ClassNotFound { name: String, loader: LoaderId },
    #[error("no field `{class}#{name}` in the class hierarchy")]
    NoSuchField { class: String, name: String },
    #[error("no applicable method `{class}#{name}` for {argc} argument(s)")]
    NoSuchMethod {
        class: String,
        name: String,
        argc: usize,
    },
    #[error("no applicable constructor `{class}<init>` for {argc} argument(s)")]
    NoSuchConstructor { class: String, argc: usize },
    /// Anything the mirror itself reports, including an exception raised by
    /// an invoked body, passes through unchanged.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// A resolved method or constructor handle, accessibility already
/// overridden, for callers that want the descriptor rather than a result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMethod {
    /// The hierarchy level the walk found the method on.
    pub declaring: ClassId,
    pub info: MethodInfo,
}

/// The member resolver.
///
/// Borrows the mirror for the duration of a call sequence; holds no other
/// state.
pub struct Reflector<'a> {
    mirror: &'a dyn Mirror,
}

impl<'a> Reflector<'a> {
    pub fn new(mirror: &'a dyn Mirror) -> Self {
        Reflector { mirror }
    }

    /// Resolves a class by qualified name (dotted or slashed) within a
    /// loading context.
    pub fn resolve_class(&self, name: &str, loader: LoaderId) -> Result<ClassId, ReflectError> {
        let name = binary_name(name);
        match self.mirror.class_by_name(&name, loader) {
            Ok(class) => Ok(class),
            Err(MirrorError::ClassNotFound { name, loader }) => {
                Err(ReflectError::ClassNotFound { name, loader })
            }
            Err(fault) => Err(fault.into()),
        }
    }

    /// Like [`Reflector::resolve_class`], but separates "definitely absent"
    /// (`Ok(None)`) from a resolution fault (`Err`), so callers can tell a
    /// missing class from a broken lookup.
    pub fn try_resolve_class(
        &self,
        name: &str,
        loader: LoaderId,
    ) -> Result<Option<ClassId>, ReflectError> {
        let name = binary_name(name);
        match self.mirror.class_by_name(&name, loader) {
            Ok(class) => Ok(Some(class)),
            Err(MirrorError::ClassNotFound { .. }) => Ok(None),
            Err(fault) => Err(fault.into()),
        }
    }

    /// Convenience existence check that swallows *every* failure into
    /// `None`, faults included. Callers who need to tell "absent" from
    /// "lookup broke" use [`Reflector::try_resolve_class`] instead.
    pub fn class_if_exists(&self, name: &str, loader: LoaderId) -> Option<ClassId> {
        match self.mirror.class_by_name(&binary_name(name), loader) {
            Ok(class) => Some(class),
            Err(err) => {
                debug!(class = name, loader, error = %err, "existence check swallowed a failure");
                None
            }
        }
    }

    /// Reads the nearest field named `name` on the instance's runtime class
    /// or an ancestor.
    pub fn get_field(&self, object: ObjectId, name: &str) -> Result<Value, ReflectError> {
        let start = self.mirror.object_class(object)?;
        let (_, field) = self.locate_field(start, name)?;
        Ok(self.mirror.get_field(object, field.id)?)
    }

    /// Writes the nearest field named `name`. No type pre-check happens
    /// here; an incompatible value surfaces the mirror's storage-level
    /// failure.
    pub fn set_field(
        &self,
        object: ObjectId,
        name: &str,
        value: Value,
    ) -> Result<(), ReflectError> {
        let start = self.mirror.object_class(object)?;
        let (_, field) = self.locate_field(start, name)?;
        Ok(self.mirror.set_field(object, field.id, value)?)
    }

    /// Reads a static field, walking from `class` toward the root.
    pub fn get_static_field(&self, class: ClassId, name: &str) -> Result<Value, ReflectError> {
        let (_, field) = self.locate_field(class, name)?;
        Ok(self.mirror.get_static(class, field.id)?)
    }

    /// Writes a static field, walking from `class` toward the root.
    pub fn set_static_field(
        &self,
        class: ClassId,
        name: &str,
        value: Value,
    ) -> Result<(), ReflectError> {
        let (_, field) = self.locate_field(class, name)?;
        Ok(self.mirror.set_static(class, field.id, value)?)
    }

    /// Resolves and invokes the best-matching method on the instance's
    /// hierarchy, receiver bound.
    pub fn invoke(
        &self,
        object: ObjectId,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ReflectError> {
        let start = self.mirror.object_class(object)?;
        let resolved = self.best_method(start, name, args)?;
        Ok(self.mirror.invoke(object, resolved.info.id, args)?)
    }

    /// Resolves and invokes the best-matching static method, walking from
    /// `class` toward the root.
    pub fn invoke_static(
        &self,
        class: ClassId,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ReflectError> {
        let resolved = self.best_method(class, name, args)?;
        Ok(self.mirror.invoke_static(class, resolved.info.id, args)?)
    }

    /// Resolves the best-matching constructor declared directly on `class`
    /// and builds an instance with it.
    pub fn construct(&self, class: ClassId, args: &[Value]) -> Result<ObjectId, ReflectError> {
        match resolve::find_constructor(self.mirror, class, args)? {
            Some(ctor) => {
                self.mirror.set_accessible(MemberId::Method(ctor.id))?;
                Ok(self.mirror.construct(class, ctor.id, args)?)
            }
            None => Err(ReflectError::NoSuchConstructor {
                class: self.mirror.class_name(class)?,
                argc: args.len(),
            }),
        }
    }

    /// Resolves the method [`Reflector::invoke_static`] or
    /// [`Reflector::invoke`] would dispatch, without dispatching it.
    pub fn find_best_method(
        &self,
        class: ClassId,
        name: &str,
        args: &[Value],
    ) -> Result<ResolvedMethod, ReflectError> {
        self.best_method(class, name, args)
    }

    fn locate_field(
        &self,
        start: ClassId,
        name: &str,
    ) -> Result<(ClassId, FieldInfo), ReflectError> {
        match resolve::find_field(self.mirror, start, name)? {
            Some(found) => {
                self.mirror.set_accessible(MemberId::Field(found.1.id))?;
                Ok(found)
            }
            None => Err(ReflectError::NoSuchField {
                class: self.mirror.class_name(start)?,
                name: name.to_string(),
            }),
        }
    }

    fn best_method(
        &self,
        start: ClassId,
        name: &str,
        args: &[Value],
    ) -> Result<ResolvedMethod, ReflectError> {
        match resolve::find_method(self.mirror, start, name, args)? {
            Some((declaring, info)) => {
                self.mirror.set_accessible(MemberId::Method(info.id))?;
                Ok(ResolvedMethod { declaring, info })
            }
            None => Err(ReflectError::NoSuchMethod {
                class: self.mirror.class_name(start)?,
                name: name.to_string(),
                argc: args.len(),
            }),
        }
    }
}
