use crate::descriptor::{BaseType, FieldType};
use crate::ObjectId;

/// A runtime value crossing the mirror boundary.
///
/// Primitives travel unboxed; for overload resolution their dynamic type is
/// the corresponding wrapper class (see [`Value::wrapper_class_name`]).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    /// Result of a `void` invocation. Never valid as an argument or a field
    /// value.
    Void,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(ObjectId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> Option<i8> {
        match self {
            Value::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<i16> {
        match self {
            Value::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The primitive kind this value carries, if any.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Boolean(_) => Some(BaseType::Boolean),
            Value::Byte(_) => Some(BaseType::Byte),
            Value::Short(_) => Some(BaseType::Short),
            Value::Char(_) => Some(BaseType::Char),
            Value::Int(_) => Some(BaseType::Int),
            Value::Long(_) => Some(BaseType::Long),
            Value::Float(_) => Some(BaseType::Float),
            Value::Double(_) => Some(BaseType::Double),
            Value::Null | Value::Void | Value::Object(_) => None,
        }
    }

    /// Binary name of the wrapper class a primitive value boxes to. `None`
    /// for `Null`, `Void`, and objects.
    pub fn wrapper_class_name(&self) -> Option<&'static str> {
        match self.base_type()? {
            BaseType::Boolean => Some("java.lang.Boolean"),
            BaseType::Byte => Some("java.lang.Byte"),
            BaseType::Short => Some("java.lang.Short"),
            BaseType::Char => Some("java.lang.Character"),
            BaseType::Int => Some("java.lang.Integer"),
            BaseType::Long => Some("java.lang.Long"),
            BaseType::Float => Some("java.lang.Float"),
            BaseType::Double => Some("java.lang.Double"),
        }
    }

    /// Short lowercase tag for diagnostics (`"int"`, `"object"`, ...).
    pub fn kind_name(&self) -> &'static str {
        match self.base_type() {
            Some(base) => base.binary_name(),
            None => match self {
                Value::Null => "null",
                Value::Void => "void",
                _ => "object",
            },
        }
    }

    /// JVM default initialization value for a field of type `ty`.
    pub fn default_for(ty: &FieldType) -> Value {
        match ty {
            FieldType::Base(BaseType::Boolean) => Value::Boolean(false),
            FieldType::Base(BaseType::Byte) => Value::Byte(0),
            FieldType::Base(BaseType::Short) => Value::Short(0),
            FieldType::Base(BaseType::Char) => Value::Char('\0'),
            FieldType::Base(BaseType::Int) => Value::Int(0),
            FieldType::Base(BaseType::Long) => Value::Long(0),
            FieldType::Base(BaseType::Float) => Value::Float(0.0),
            FieldType::Base(BaseType::Double) => Value::Double(0.0),
            FieldType::Object(_) | FieldType::Array(_) => Value::Null,
        }
    }
}
