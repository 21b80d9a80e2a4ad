//! JVM access-flag bits, as they appear in class files and on debug wires.

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

pub fn is_public(flags: u16) -> bool {
    (flags & ACC_PUBLIC) != 0
}

pub fn is_static(flags: u16) -> bool {
    (flags & ACC_STATIC) != 0
}
