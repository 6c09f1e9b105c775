// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Marshalling between host values and the little-endian wire layouts used
//! by the device family under test. All functions here are pure; nothing
//! touches the transport.

use crate::types::{Error, Result};
use byteorder::{ByteOrder, LittleEndian as LE};
use num_traits::ToPrimitive;
use std::fmt;
use std::str::FromStr;

/// Symbolic object types as used in test tables. The mapping to wire
/// layouts is total: every tag has exactly one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Byte,
    Word,
    Dword,
    Int,
    Uint,
    Udint,
    Real,
    String,
    Addr,
}

pub const TYPE_TAGS: [TypeTag; 10] = [
    TypeTag::Bool,
    TypeTag::Byte,
    TypeTag::Word,
    TypeTag::Dword,
    TypeTag::Int,
    TypeTag::Uint,
    TypeTag::Udint,
    TypeTag::Real,
    TypeTag::String,
    TypeTag::Addr,
];

impl TypeTag {
    /// Fixed wire width in bytes, or `None` for the variable-length tags.
    pub const fn width(self) -> Option<usize> {
        match self {
            TypeTag::Bool | TypeTag::Byte => Some(1),
            TypeTag::Word | TypeTag::Int | TypeTag::Uint => Some(2),
            TypeTag::Dword | TypeTag::Udint | TypeTag::Real => Some(4),
            TypeTag::String | TypeTag::Addr => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TypeTag::Bool => "BOOL",
            TypeTag::Byte => "BYTE",
            TypeTag::Word => "WORD",
            TypeTag::Dword => "DWORD",
            TypeTag::Int => "INT",
            TypeTag::Uint => "UINT",
            TypeTag::Udint => "UDINT",
            TypeTag::Real => "REAL",
            TypeTag::String => "STRING",
            TypeTag::Addr => "ADDR",
        })
    }
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BOOL" => Ok(TypeTag::Bool),
            "BYTE" => Ok(TypeTag::Byte),
            "WORD" => Ok(TypeTag::Word),
            "DWORD" => Ok(TypeTag::Dword),
            "INT" => Ok(TypeTag::Int),
            "UINT" => Ok(TypeTag::Uint),
            "UDINT" => Ok(TypeTag::Udint),
            "REAL" => Ok(TypeTag::Real),
            "STRING" => Ok(TypeTag::String),
            "ADDR" => Ok(TypeTag::Addr),
            _ => Err(Error::UnsupportedType(s.into())),
        }
    }
}

/// A host-side object value. Byte strings keep their raw bytes; trailing
/// NULs are stripped on decode, following the C string convention of the
/// wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    I16(i16),
    F32(f32),
    Bytes(Vec<u8>),
}

impl Value {
    /// Numeric view used for the deviation window. `None` for BOOL and
    /// byte-string values.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::U8(v) => v.to_f64(),
            Value::U16(v) => v.to_f64(),
            Value::U32(v) => v.to_f64(),
            Value::I16(v) => v.to_f64(),
            Value::F32(v) => v.to_f64(),
            Value::Bool(_) | Value::Bytes(_) => None,
        }
    }

    fn unsigned(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U32(v) => Some(u64::from(*v)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "'{}'", s),
                Err(_) => {
                    for byte in b {
                        write!(f, "\\x{:02x}", byte)?;
                    }
                    Ok(())
                }
            },
        }
    }
}

/// Packs `value` into the wire layout of `tag`.
///
/// The tag's sign class is enforced rather than silently switched: a
/// signed value against an unsigned tag is a `TypeMismatch`, never a
/// reinterpretation. An in-class value that exceeds the tag's width fails
/// with `Encoding`.
pub fn encode(tag: TypeTag, value: &Value) -> Result<Vec<u8>> {
    match (tag, value) {
        (TypeTag::Bool, Value::Bool(v)) => Ok(vec![*v as u8]),
        (TypeTag::Byte, _) => encode_unsigned(tag, value, 1),
        (TypeTag::Word, _) | (TypeTag::Uint, _) => encode_unsigned(tag, value, 2),
        (TypeTag::Dword, _) | (TypeTag::Udint, _) => encode_unsigned(tag, value, 4),
        (TypeTag::Int, Value::I16(v)) => {
            let mut buf = vec![0; 2];
            LE::write_i16(&mut buf, *v);
            Ok(buf)
        }
        (TypeTag::Real, Value::F32(v)) => {
            let mut buf = vec![0; 4];
            LE::write_f32(&mut buf, *v);
            Ok(buf)
        }
        (TypeTag::String, Value::Bytes(b)) | (TypeTag::Addr, Value::Bytes(b)) => Ok(b.clone()),
        (tag, value) => Err(Error::TypeMismatch {
            tag,
            value: value.clone(),
        }),
    }
}

fn encode_unsigned(tag: TypeTag, value: &Value, width: usize) -> Result<Vec<u8>> {
    let raw = value.unsigned().ok_or_else(|| Error::TypeMismatch {
        tag,
        value: value.clone(),
    })?;
    if raw >= 1 << (8 * width) {
        return Err(Error::Encoding {
            tag,
            value: value.clone(),
        });
    }
    let mut buf = vec![0; width];
    LE::write_uint(&mut buf, raw, width);
    Ok(buf)
}

/// Unpacks `bytes` into the canonical host value of `tag`. Fixed-width
/// tags require the exact byte count; byte-string tags accept any length
/// and strip trailing NULs.
pub fn decode(tag: TypeTag, bytes: &[u8]) -> Result<Value> {
    if let Some(width) = tag.width() {
        if bytes.len() != width {
            return Err(Error::Decoding {
                tag,
                expected: width,
                actual: bytes.len(),
            });
        }
    }
    Ok(match tag {
        TypeTag::Bool => Value::Bool(bytes[0] != 0),
        TypeTag::Byte => Value::U8(bytes[0]),
        TypeTag::Word | TypeTag::Uint => Value::U16(LE::read_u16(bytes)),
        TypeTag::Dword | TypeTag::Udint => Value::U32(LE::read_u32(bytes)),
        TypeTag::Int => Value::I16(LE::read_i16(bytes)),
        TypeTag::Real => Value::F32(LE::read_f32(bytes)),
        TypeTag::String | TypeTag::Addr => Value::Bytes(strip_trailing_nuls(bytes).to_vec()),
    })
}

pub fn strip_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
