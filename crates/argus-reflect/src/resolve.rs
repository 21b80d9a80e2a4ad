//! Hierarchy walks and first-applicable overload selection.
//!
//! Fields resolve to the nearest declaration between the starting class and
//! the root. Methods resolve level by level: the walk only ascends to the
//! superclass when the current level has no applicable candidate, and within
//! a level the first applicable candidate in declaration order wins, even
//! when a later one would be more specific. Constructors are not inherited,
//! so they get the single-level version of the same selection.

use argus_mirror::{
    assignable, ClassId, FieldInfo, FieldType, MethodInfo, Mirror, MirrorError, Value,
};
use tracing::trace;

/// Nearest declaration of a field named `name`, from `start` toward the
/// root. Shadowed declarations further up the chain are never returned.
pub(crate) fn find_field(
    mirror: &dyn Mirror,
    start: ClassId,
    name: &str,
) -> Result<Option<(ClassId, FieldInfo)>, MirrorError> {
    let mut current = Some(start);
    while let Some(class) = current {
        let found = mirror
            .declared_fields(class)?
            .into_iter()
            .find(|field| field.name == name);
        if let Some(field) = found {
            return Ok(Some((class, field)));
        }
        current = mirror.superclass(class)?;
        if current.is_some() {
            trace!(class, field = name, "no declaration at this level, ascending");
        }
    }
    Ok(None)
}

/// First applicable method named `name`, walking from `start` toward the
/// root one level at a time.
pub(crate) fn find_method(
    mirror: &dyn Mirror,
    start: ClassId,
    name: &str,
    args: &[Value],
) -> Result<Option<(ClassId, MethodInfo)>, MirrorError> {
    let mut current = Some(start);
    while let Some(class) = current {
        let candidates = mirror
            .declared_methods(class)?
            .into_iter()
            .filter(|method| method.name == name && method.descriptor.arity() == args.len());
        for candidate in candidates {
            if applicable(mirror, &candidate, args)? {
                return Ok(Some((class, candidate)));
            }
        }
        current = mirror.superclass(class)?;
        if current.is_some() {
            trace!(class, method = name, "no applicable candidate at this level, ascending");
        }
    }
    Ok(None)
}

/// First applicable constructor of `class`. No walk: constructors are
/// declared, never inherited.
pub(crate) fn find_constructor(
    mirror: &dyn Mirror,
    class: ClassId,
    args: &[Value],
) -> Result<Option<MethodInfo>, MirrorError> {
    let candidates = mirror
        .declared_constructors(class)?
        .into_iter()
        .filter(|ctor| ctor.descriptor.arity() == args.len());
    for candidate in candidates {
        if applicable(mirror, &candidate, args)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn applicable(
    mirror: &dyn Mirror,
    candidate: &MethodInfo,
    args: &[Value],
) -> Result<bool, MirrorError> {
    for (param, arg) in candidate.descriptor.params.iter().zip(args) {
        if !param_accepts(mirror, param, arg)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Per-position compatibility:
///
/// - `Null` wildcard-matches any parameter.
/// - A primitive parameter takes exactly its own primitive kind; no
///   widening, so a declared `long` does not take an `int` argument.
/// - A reference parameter takes any argument whose dynamic class (the
///   boxed wrapper, for primitives) is assignable to the declared type.
fn param_accepts(
    mirror: &dyn Mirror,
    param: &FieldType,
    arg: &Value,
) -> Result<bool, MirrorError> {
    match arg {
        Value::Null => Ok(true),
        Value::Void => Ok(false),
        _ => match param {
            FieldType::Base(base) => Ok(arg.base_type() == Some(*base)),
            FieldType::Object(_) | FieldType::Array(_) => match mirror.class_of(arg)? {
                Some(class) => assignable(mirror, class, &param.binary_name()),
                None => Ok(false),
            },
        },
    }
}
