use std::collections::{HashSet, VecDeque};
use std::fmt;

use thiserror::Error;

use crate::access;
use crate::descriptor::{DescriptorError, FieldType, MethodDescriptor};
use crate::value::Value;
use crate::{ClassId, FieldId, LoaderId, MethodId, ObjectId, BOOTSTRAP_LOADER};

/// A directly declared field, as reported by [`Mirror::declared_fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub id: FieldId,
    pub name: String,
    pub descriptor: FieldType,
    pub access_flags: u16,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        access::is_static(self.access_flags)
    }
}

/// A directly declared method or constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub id: MethodId,
    /// Method name; constructors use the JVM name `<init>`.
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub access_flags: u16,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        access::is_static(self.access_flags)
    }
}

/// Identifies a member for accessibility control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberId {
    Field(FieldId),
    Method(MethodId),
}

/// An exception raised by an invoked member body.
///
/// Carried through [`MirrorError::Thrown`] without translation so the
/// original cause reaches the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Thrown {
    pub class_name: String,
    pub message: Option<String>,
}

impl Thrown {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Thrown {
            class_name: class_name.into(),
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("class `{name}` not found in loader {loader}")]
    ClassNotFound { name: String, loader: LoaderId },
    #[error("unknown loader id {0}")]
    UnknownLoader(LoaderId),
    #[error("unknown class id {0}")]
    UnknownClass(ClassId),
    #[error("unknown object id {0}")]
    UnknownObject(ObjectId),
    #[error("unknown field id {0}")]
    UnknownField(FieldId),
    #[error("unknown method id {0}")]
    UnknownMethod(MethodId),
    #[error("method {0} is not a constructor of the requested class")]
    NotConstructor(MethodId),
    #[error("class `{0}` is already defined in this loader")]
    DuplicateClass(String),
    #[error("duplicate member `{member}` on class `{class}`")]
    DuplicateMember { class: String, member: String },
    #[error(transparent)]
    InvalidDescriptor(#[from] DescriptorError),
    #[error("member `{member}` is not accessible")]
    AccessDenied { member: String },
    #[error("member `{member}` is not static")]
    NotStatic { member: String },
    #[error("`{declaring}` member used through unrelated class `{receiver}`")]
    ReceiverMismatch { receiver: String, declaring: String },
    #[error("expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("{got} value is not compatible with `{target}` of type {expected}")]
    IncompatibleValue {
        target: String,
        expected: String,
        got: &'static str,
    },
    #[error("invocation threw {0}")]
    Thrown(Thrown),
}

/// Minimal, adapter-friendly introspection surface.
///
/// The resolution layer performs its hierarchy walks and overload selection
/// entirely through this trait, so an in-process host, a test fixture, and a
/// remote debug wire can all back the same call sites. Implementations take
/// `&self` and must tolerate concurrent calls; blocking transports belong
/// behind the adapter, not in the trait.
pub trait Mirror: Send + Sync {
    /// Resolves `name` (binary or slash-delimited form) in `loader`.
    ///
    /// Whether lookup consults parent loaders is the implementation's
    /// loading policy; [`crate::HostMirror`] delegates parent-first.
    fn class_by_name(&self, name: &str, loader: LoaderId) -> Result<ClassId, MirrorError>;

    /// Binary name of a class (`java.lang.Integer`).
    fn class_name(&self, class: ClassId) -> Result<String, MirrorError>;

    /// Direct superclass; `None` at the hierarchy root.
    fn superclass(&self, class: ClassId) -> Result<Option<ClassId>, MirrorError>;

    /// Direct superinterfaces, in declaration order.
    fn interfaces(&self, class: ClassId) -> Result<Vec<ClassId>, MirrorError>;

    /// Fields declared directly on `class`, in declaration order.
    fn declared_fields(&self, class: ClassId) -> Result<Vec<FieldInfo>, MirrorError>;

    /// Methods declared directly on `class` (constructors excluded), in
    /// declaration order.
    fn declared_methods(&self, class: ClassId) -> Result<Vec<MethodInfo>, MirrorError>;

    /// Constructors of `class`, in declaration order. Constructors are not
    /// inherited; callers wanting one walk no further than this.
    fn declared_constructors(&self, class: ClassId) -> Result<Vec<MethodInfo>, MirrorError>;

    /// Runtime class of a live instance.
    fn object_class(&self, object: ObjectId) -> Result<ClassId, MirrorError>;

    /// Dynamic class of an argument value: the boxed wrapper for primitives,
    /// the runtime class for objects, `None` for `Null` and `Void`.
    fn class_of(&self, value: &Value) -> Result<Option<ClassId>, MirrorError> {
        if let Value::Object(id) = value {
            return self.object_class(*id).map(Some);
        }
        match value.wrapper_class_name() {
            Some(name) => self.class_by_name(name, BOOTSTRAP_LOADER).map(Some),
            None => Ok(None),
        }
    }

    /// Marks a member readable, writable, and invocable regardless of its
    /// declared visibility. Idempotent; concurrent calls are safe.
    fn set_accessible(&self, member: MemberId) -> Result<(), MirrorError>;

    /// Reads a field of `object`. A static field is read from its declaring
    /// class and the receiver is ignored.
    fn get_field(&self, object: ObjectId, field: FieldId) -> Result<Value, MirrorError>;

    /// Writes a field of `object`. The storage-level compatibility check
    /// happens here: an incompatible value fails with
    /// [`MirrorError::IncompatibleValue`].
    fn set_field(&self, object: ObjectId, field: FieldId, value: Value)
        -> Result<(), MirrorError>;

    /// Reads a static field. Fails [`MirrorError::NotStatic`] for instance
    /// fields.
    fn get_static(&self, class: ClassId, field: FieldId) -> Result<Value, MirrorError>;

    /// Writes a static field. Fails [`MirrorError::NotStatic`] for instance
    /// fields.
    fn set_static(&self, class: ClassId, field: FieldId, value: Value)
        -> Result<(), MirrorError>;

    /// Invokes `method` with `object` as the receiver. A static target is
    /// dispatched receiverless, like `Method.invoke` with an instance bound.
    fn invoke(
        &self,
        object: ObjectId,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, MirrorError>;

    /// Invokes a static method. Fails [`MirrorError::NotStatic`] for
    /// instance methods.
    fn invoke_static(
        &self,
        class: ClassId,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, MirrorError>;

    /// Allocates an instance of `class`, default-initializes every instance
    /// field in the hierarchy, and runs `ctor`. A constructor that throws
    /// rolls the allocation back.
    fn construct(
        &self,
        class: ClassId,
        ctor: MethodId,
        args: &[Value],
    ) -> Result<ObjectId, MirrorError>;
}

/// Reference-type compatibility: can a value whose runtime class is `from`
/// be bound to a slot whose declared type has binary name `target`?
///
/// Breadth-first over superclass and superinterface edges, comparing binary
/// names. Name-based, debugger-style: two loaders defining the same binary
/// name compare equal here.
pub fn assignable(
    mirror: &dyn Mirror,
    from: ClassId,
    target: &str,
) -> Result<bool, MirrorError> {
    let target = crate::binary_name(target);
    let mut queue = VecDeque::new();
    let mut seen = HashSet::new();
    queue.push_back(from);
    seen.insert(from);
    while let Some(class) = queue.pop_front() {
        if mirror.class_name(class)? == target {
            return Ok(true);
        }
        if let Some(superclass) = mirror.superclass(class)? {
            if seen.insert(superclass) {
                queue.push_back(superclass);
            }
        }
        for interface in mirror.interfaces(class)? {
            if seen.insert(interface) {
                queue.push_back(interface);
            }
        }
    }
    Ok(false)
}
