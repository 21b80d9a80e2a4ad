//! JVM type descriptors and their runtime names.
//!
//! Grammar per JVMS §4.3: `I`, `Ljava/lang/String;`, `[I` for fields;
//! `(ILjava/lang/String;)V` for methods. Object names are normalized to
//! binary (dotted) form at parse time, so downstream comparisons never see
//! the slashed spelling.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid descriptor `{0}`")]
pub struct DescriptorError(pub String);

/// Primitive kinds, one per base-type descriptor character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl BaseType {
    pub fn descriptor_char(self) -> char {
        match self {
            BaseType::Boolean => 'Z',
            BaseType::Byte => 'B',
            BaseType::Short => 'S',
            BaseType::Char => 'C',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Float => 'F',
            BaseType::Double => 'D',
        }
    }

    fn from_descriptor_char(c: u8) -> Option<BaseType> {
        match c {
            b'Z' => Some(BaseType::Boolean),
            b'B' => Some(BaseType::Byte),
            b'S' => Some(BaseType::Short),
            b'C' => Some(BaseType::Char),
            b'I' => Some(BaseType::Int),
            b'J' => Some(BaseType::Long),
            b'F' => Some(BaseType::Float),
            b'D' => Some(BaseType::Double),
            _ => None,
        }
    }

    /// Source-level keyword, which is also what `Class.getName()` reports
    /// for primitives.
    pub fn binary_name(self) -> &'static str {
        match self {
            BaseType::Boolean => "boolean",
            BaseType::Byte => "byte",
            BaseType::Short => "short",
            BaseType::Char => "char",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Float => "float",
            BaseType::Double => "double",
        }
    }
}

/// A field or parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Base(BaseType),
    /// Class or interface type; the name is held in binary form
    /// (`java.lang.String`) regardless of how the descriptor spelled it.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Runtime class name as `Class.getName()` renders it: keywords for
    /// primitives, dotted binary names for classes, and the `[`-prefixed
    /// descriptor form for arrays (`[I`, `[Ljava.lang.String;`).
    pub fn binary_name(&self) -> String {
        match self {
            FieldType::Base(base) => base.binary_name().to_string(),
            FieldType::Object(name) => name.clone(),
            FieldType::Array(component) => match component.as_ref() {
                FieldType::Base(base) => format!("[{}", base.descriptor_char()),
                FieldType::Object(name) => format!("[L{name};"),
                FieldType::Array(_) => format!("[{}", component.binary_name()),
            },
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(base) => write!(f, "{}", base.descriptor_char()),
            FieldType::Object(name) => write!(f, "L{};", name.replace('.', "/")),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => write!(f, "V"),
            ReturnType::Type(ty) => write!(f, "{ty}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

impl MethodDescriptor {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.return_type)
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType, DescriptorError> {
    let mut cursor = Cursor::new(desc);
    let ty = cursor.field_type()?;
    cursor.finish()?;
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor, DescriptorError> {
    let mut cursor = Cursor::new(desc);
    cursor.expect(b'(')?;
    let mut params = Vec::new();
    while !cursor.peek_is(b')') {
        params.push(cursor.field_type()?);
    }
    cursor.expect(b')')?;
    let return_type = if cursor.peek_is(b'V') {
        cursor.expect(b'V')?;
        ReturnType::Void
    } else {
        ReturnType::Type(cursor.field_type()?)
    };
    cursor.finish()?;
    Ok(MethodDescriptor { params, return_type })
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    fn malformed(&self) -> DescriptorError {
        DescriptorError(self.src.to_string())
    }

    fn bump(&mut self) -> Result<u8, DescriptorError> {
        let byte = *self
            .src
            .as_bytes()
            .get(self.pos)
            .ok_or_else(|| self.malformed())?;
        self.pos += 1;
        Ok(byte)
    }

    fn peek_is(&self, byte: u8) -> bool {
        self.src.as_bytes().get(self.pos) == Some(&byte)
    }

    fn expect(&mut self, byte: u8) -> Result<(), DescriptorError> {
        if self.peek_is(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.malformed())
        }
    }

    fn finish(&self) -> Result<(), DescriptorError> {
        if self.pos == self.src.len() {
            Ok(())
        } else {
            Err(self.malformed())
        }
    }

    fn field_type(&mut self) -> Result<FieldType, DescriptorError> {
        match self.bump()? {
            b'L' => {
                let start = self.pos;
                while self.bump()? != b';' {}
                // The terminating `;` is ASCII, so this slice boundary is
                // always a char boundary.
                let name = &self.src[start..self.pos - 1];
                if name.is_empty() {
                    return Err(self.malformed());
                }
                Ok(FieldType::Object(crate::binary_name(name)))
            }
            b'[' => Ok(FieldType::Array(Box::new(self.field_type()?))),
            other => BaseType::from_descriptor_char(other)
                .map(FieldType::Base)
                .ok_or_else(|| self.malformed()),
        }
    }
}
