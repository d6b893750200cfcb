//! Recognises one obfuscated rendering class by what it contains rather than what
//! it is called, and retargets a single `sipush` literal inside it.
//!
//! The pipeline is [`parse_class`] → [`Fingerprint::check`] → [`locate`] →
//! [`patch`] → [`serialize`], driven end to end by [`Transformer`]. Every stage
//! is a gate: the first one that does not match hands the caller its original
//! bytes back.

#[macro_use]
extern crate bitflags;
extern crate cesu8;

#[macro_use]
mod error;

mod attributes;
pub mod bytecode;
pub mod config;
pub mod constant_pool;
mod descriptors;
pub mod fingerprint;
pub mod locator;
mod names;
pub mod patcher;
pub mod transform;
pub mod writer;

use std::borrow::Cow;

pub use crate::attributes::{AttributeData, AttributeInfo, CodeData, ExceptionTableEntry};
use crate::attributes::read_attributes;
pub use crate::bytecode::{Instruction, InstructionList, Opcode};
pub use crate::config::{FixedOverrides, Overrides, ProcessOverrides, Properties, Replacement, ReplacementSource};
use crate::constant_pool::{read_constant_pool, read_cp_classinfo_index, read_cp_classinfo_opt_index, read_cp_utf8_indexed};
pub use crate::constant_pool::{ConstantPoolEntry, ConstantPoolItem, ConstantPoolIter};
use crate::descriptors::parse_parameters;
pub use crate::error::{ParseError, TransformError};
pub use crate::fingerprint::Fingerprint;
pub use crate::locator::{locate, MethodShape};
pub use crate::patcher::{patch, InstructionTarget, PatchResult};
pub use crate::transform::{install_panic_hook, PatchPlan, Transformer};
pub use crate::writer::serialize;

pub(crate) fn read_u1(bytes: &[u8], ix: &mut usize) -> Result<u8, ParseError> {
    if bytes.len() < *ix + 1 {
        fail!("Unexpected end of stream reading u1 at index {}", *ix);
    }
    let result = bytes[*ix];
    *ix += 1;
    Ok(result)
}

pub(crate) fn read_u2(bytes: &[u8], ix: &mut usize) -> Result<u16, ParseError> {
    if bytes.len() < *ix + 2 {
        fail!("Unexpected end of stream reading u2 at index {}", *ix);
    }
    let result =
        ((bytes[*ix + 0] as u16) << 8) |
        ((bytes[*ix + 1] as u16));
    *ix += 2;
    Ok(result)
}

pub(crate) fn read_u4(bytes: &[u8], ix: &mut usize) -> Result<u32, ParseError> {
    if bytes.len() < *ix + 4 {
        fail!("Unexpected end of stream reading u4 at index {}", *ix);
    }
    let result =
        ((bytes[*ix + 0] as u32) << 24) |
        ((bytes[*ix + 1] as u32) << 16) |
        ((bytes[*ix + 2] as u32) <<  8) |
        ((bytes[*ix + 3] as u32));
    *ix += 4;
    Ok(result)
}

pub(crate) fn read_bytes<'a>(bytes: &'a [u8], ix: &mut usize, length: usize) -> Result<&'a [u8], ParseError> {
    if bytes.len() < *ix + length {
        fail!("Unexpected end of stream reading {} bytes at index {}", length, *ix);
    }
    let result = &bytes[*ix .. *ix + length];
    *ix += length;
    Ok(result)
}

fn read_interfaces(bytes: &[u8], ix: &mut usize, pool: &[ConstantPoolEntry]) -> Result<Vec<u16>, ParseError> {
    let count = read_u2(bytes, ix)?;
    let mut interfaces = Vec::with_capacity(count.into());
    for i in 0..count {
        interfaces.push(read_cp_classinfo_index(bytes, ix, pool).map_err(|e| err!(e, "interface {}", i))?);
    }
    Ok(interfaces)
}

bitflags! {
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = AccessFlags::PUBLIC.bits();
        const PRIVATE = AccessFlags::PRIVATE.bits();
        const PROTECTED = AccessFlags::PROTECTED.bits();
        const STATIC = AccessFlags::STATIC.bits();
        const FINAL = AccessFlags::FINAL.bits();
        const VOLATILE = AccessFlags::VOLATILE.bits();
        const TRANSIENT = AccessFlags::TRANSIENT.bits();
        const SYNTHETIC = AccessFlags::SYNTHETIC.bits();
        const ENUM = AccessFlags::ENUM.bits();
    }
}

/// Fields are carried through untouched; only enough is decoded to write them back.
#[derive(Debug)]
pub struct FieldInfo<'a> {
    pub access_flags: FieldAccessFlags,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub attributes: Vec<AttributeInfo<'a>>,
}

fn read_fields<'a>(bytes: &'a [u8], ix: &mut usize, pool: &[ConstantPoolEntry<'a>]) -> Result<Vec<FieldInfo<'a>>, ParseError> {
    let count = read_u2(bytes, ix)?;
    let mut fields = Vec::with_capacity(count.into());
    for i in 0..count {
        let access_flags = match FieldAccessFlags::from_bits(read_u2(bytes, ix)?) {
            Some(flags) => flags,
            None => fail!("Invalid access flags found on class field {}", i),
        };
        let (name_index, _) = read_cp_utf8_indexed(bytes, ix, pool).map_err(|e| err!(e, "name of class field {}", i))?;
        let (descriptor_index, _) = read_cp_utf8_indexed(bytes, ix, pool).map_err(|e| err!(e, "descriptor of class field {}", i))?;
        let attributes = read_attributes(bytes, ix, pool, false).map_err(|e| err!(e, "class field {}", i))?;
        fields.push(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(fields)
}

bitflags! {
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = AccessFlags::PUBLIC.bits();
        const PRIVATE = AccessFlags::PRIVATE.bits();
        const PROTECTED = AccessFlags::PROTECTED.bits();
        const STATIC = AccessFlags::STATIC.bits();
        const FINAL = AccessFlags::FINAL.bits();
        const SYNCHRONIZED = AccessFlags::SYNCHRONIZED.bits();
        const BRIDGE = AccessFlags::BRIDGE.bits();
        const VARARGS = AccessFlags::VARARGS.bits();
        const NATIVE = AccessFlags::NATIVE.bits();
        const ABSTRACT = AccessFlags::ABSTRACT.bits();
        const STRICT = AccessFlags::STRICT.bits();
        const SYNTHETIC = AccessFlags::SYNTHETIC.bits();
    }
}

#[derive(Debug)]
pub struct MethodDefinition<'a> {
    pub access_flags: MethodAccessFlags,
    pub name: Cow<'a, str>,
    pub descriptor: Cow<'a, str>,
    /// One descriptor string per formal parameter, e.g. `I`, `[J`, `LFoo;`.
    pub parameters: Vec<Cow<'a, str>>,
    pub attributes: Vec<AttributeInfo<'a>>,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
}

impl<'a> MethodDefinition<'a> {
    pub fn code(&self) -> Option<&CodeData<'a>> {
        self.attributes.iter().find_map(|attr| match &attr.data {
            AttributeData::Code(code) => Some(code),
            _ => None,
        })
    }

    pub fn code_mut(&mut self) -> Option<&mut CodeData<'a>> {
        self.attributes.iter_mut().find_map(|attr| match &mut attr.data {
            AttributeData::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Decodes the method body. `Ok(None)` for abstract and native methods.
    pub fn instructions(&self) -> Result<Option<InstructionList<'_>>, ParseError> {
        match self.code() {
            Some(code) => Ok(Some(InstructionList::decode(&code.code).map_err(|e| err!(e, "method {}", self.name))?)),
            None => Ok(None),
        }
    }
}

fn read_methods<'a>(bytes: &'a [u8], ix: &mut usize, pool: &[ConstantPoolEntry<'a>]) -> Result<Vec<MethodDefinition<'a>>, ParseError> {
    let count = read_u2(bytes, ix)?;
    let mut methods = Vec::with_capacity(count.into());
    for i in 0..count {
        let access_flags = match MethodAccessFlags::from_bits(read_u2(bytes, ix)?) {
            Some(flags) => flags,
            None => fail!("Invalid access flags found on class method {}", i),
        };
        let (name_index, name) = read_cp_utf8_indexed(bytes, ix, pool).map_err(|e| err!(e, "name of class method {}", i))?;
        let (descriptor_index, descriptor) = read_cp_utf8_indexed(bytes, ix, pool).map_err(|e| err!(e, "descriptor of class method {}", i))?;
        let parameters = parse_parameters(&descriptor).map_err(|e| err!(e, "descriptor of class method {}", i))?;
        let attributes = read_attributes(bytes, ix, pool, true).map_err(|e| err!(e, "class method {}", i))?;
        methods.push(MethodDefinition {
            access_flags,
            name,
            descriptor,
            parameters,
            attributes,
            name_index,
            descriptor_index,
        });
    }
    Ok(methods)
}

bitflags! {
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = AccessFlags::PUBLIC.bits();
        const FINAL = AccessFlags::FINAL.bits();
        const SUPER = AccessFlags::SUPER.bits();
        const INTERFACE = AccessFlags::INTERFACE.bits();
        const ABSTRACT = AccessFlags::ABSTRACT.bits();
        const SYNTHETIC = AccessFlags::SYNTHETIC.bits();
        const ANNOTATION = AccessFlags::ANNOTATION.bits();
        const ENUM = AccessFlags::ENUM.bits();
        const MODULE = AccessFlags::MODULE.bits();
    }
}

/// One parsed class file, borrowing from the buffer it was read from.
///
/// Everything needed to write the class back out byte for byte is retained;
/// only method bodies are ever replaced.
#[derive(Debug)]
pub struct ClassDefinition<'a> {
    pub major_version: u16,
    pub minor_version: u16,
    pub(crate) constant_pool: Vec<ConstantPoolEntry<'a>>,
    pub access_flags: ClassAccessFlags,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo<'a>>,
    pub methods: Vec<MethodDefinition<'a>>,
    pub attributes: Vec<AttributeInfo<'a>>,
}

impl<'a> ClassDefinition<'a> {
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn this_class(&self) -> Option<Cow<'a, str>> {
        constant_pool::classinfo_name(&self.constant_pool, self.this_class)
    }

    pub fn super_class(&self) -> Option<Cow<'a, str>> {
        constant_pool::classinfo_name(&self.constant_pool, self.super_class)
    }

    pub fn constant_pool(&self) -> &[ConstantPoolEntry<'a>] {
        &self.constant_pool
    }

    pub fn constantpool_iter(&self) -> ConstantPoolIter<'_, 'a> {
        ConstantPoolIter::new(&self.constant_pool)
    }
}

/// Parses a complete class file. Malformed input of any kind is reported as a
/// [`ParseError`]; nothing in here panics on untrusted bytes.
pub fn parse_class<'a>(raw_bytes: &'a [u8]) -> Result<ClassDefinition<'a>, ParseError> {
    let mut ix = 0;
    if read_u4(raw_bytes, &mut ix)? != 0xCAFEBABE {
        fail!("Unexpected magic header");
    }
    let minor_version = read_u2(raw_bytes, &mut ix)?;
    let major_version = read_u2(raw_bytes, &mut ix)?;
    let constant_pool = read_constant_pool(raw_bytes, &mut ix).map_err(|e| err!(e, "constant pool"))?;

    let access_flags = match ClassAccessFlags::from_bits(read_u2(raw_bytes, &mut ix)?) {
        Some(flags) => flags,
        None => fail!("Invalid access flags found on class"),
    };
    let this_class = read_cp_classinfo_index(raw_bytes, &mut ix, &constant_pool).map_err(|e| err!(e, "this_class"))?;
    let super_class = read_cp_classinfo_opt_index(raw_bytes, &mut ix, &constant_pool).map_err(|e| err!(e, "super_class"))?;
    let interfaces = read_interfaces(raw_bytes, &mut ix, &constant_pool)?;
    let fields = read_fields(raw_bytes, &mut ix, &constant_pool)?;
    let methods = read_methods(raw_bytes, &mut ix, &constant_pool)?;
    let attributes = read_attributes(raw_bytes, &mut ix, &constant_pool, false).map_err(|e| err!(e, "class"))?;
    if ix != raw_bytes.len() {
        fail!("Unexpected {} trailing bytes after class attributes", raw_bytes.len() - ix);
    }

    Ok(ClassDefinition {
        major_version,
        minor_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}
