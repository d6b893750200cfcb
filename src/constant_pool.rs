use std::borrow::Cow;

use crate::names::{is_array_descriptor, is_binary_name};
use crate::{read_bytes, read_u1, read_u2, ParseError};

/// One slot of the constant pool.
///
/// Only the two entry kinds that fingerprinting looks at are decoded; every
/// other tag is kept as its raw payload so the pool can be written back as-is.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantPoolEntry<'a> {
    /// Index 0, which the class file never encodes.
    Zero,
    /// Modified UTF-8 as stored in the class file.
    Utf8(&'a [u8]),
    /// Index of the `Utf8` entry holding the class name.
    ClassInfo(u16),
    /// Any other recognised tag, with its payload bytes excluding the tag.
    Other { tag: u8, data: &'a [u8] },
    /// The slot following a long or double.
    Unused,
}

impl<'a> ConstantPoolEntry<'a> {
    /// Decodes a `Utf8` entry. `None` for other entries and for byte sequences
    /// that are not valid modified UTF-8 (lone surrogates in string literals).
    pub fn utf8(&self) -> Option<Cow<'a, str>> {
        match self {
            ConstantPoolEntry::Utf8(x) => cesu8::from_java_cesu8(*x).ok(),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<u8> {
        match self {
            ConstantPoolEntry::Zero | ConstantPoolEntry::Unused => None,
            ConstantPoolEntry::Utf8(_) => Some(1),
            ConstantPoolEntry::ClassInfo(_) => Some(7),
            ConstantPoolEntry::Other { tag, .. } => Some(*tag),
        }
    }

    fn validate(&self, pool: &[ConstantPoolEntry<'a>]) -> Result<(), ParseError> {
        match self {
            ConstantPoolEntry::ClassInfo(name_index) => {
                let name = match pool.get(*name_index as usize) {
                    Some(entry) => match entry {
                        ConstantPoolEntry::Utf8(_) => entry.utf8(),
                        _ => fail!("Unexpected constant pool reference type"),
                    },
                    None => fail!("Out-of-bounds index {} in constant pool reference", name_index),
                };
                match name {
                    // Per 4.4.1, classinfo names are allowed to be array descriptors too.
                    Some(x) if is_binary_name(&x) || is_array_descriptor(&x) => Ok(()),
                    _ => fail!("Invalid binary name"),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Payload size in bytes for every tag whose layout is fixed, by tag number.
fn fixed_payload_len(tag: u8) -> Option<usize> {
    match tag {
        3 | 4 => Some(4),
        5 | 6 => Some(8),
        7 | 8 | 16 | 19 | 20 => Some(2),
        9 | 10 | 11 | 12 | 17 | 18 => Some(4),
        15 => Some(3),
        _ => None,
    }
}

fn read_constant<'a>(bytes: &'a [u8], ix: &mut usize, tag: u8) -> Result<ConstantPoolEntry<'a>, ParseError> {
    match tag {
        1 => {
            let length = read_u2(bytes, ix)? as usize;
            Ok(ConstantPoolEntry::Utf8(read_bytes(bytes, ix, length)?))
        }
        7 => Ok(ConstantPoolEntry::ClassInfo(read_u2(bytes, ix)?)),
        _ => match fixed_payload_len(tag) {
            Some(length) => Ok(ConstantPoolEntry::Other { tag, data: read_bytes(bytes, ix, length)? }),
            // Without a known layout there is no way to find the next entry.
            None => fail!("Unexpected constant pool entry type {} at index {}", tag, *ix - 1),
        },
    }
}

fn validate_constant_pool(constant_pool: &[ConstantPoolEntry]) -> Result<(), ParseError> {
    for (i, cp_entry) in constant_pool.iter().enumerate() {
        cp_entry.validate(constant_pool).map_err(|e| err!(e, "constant pool entry {}", i))?;
    }
    Ok(())
}

pub(crate) fn read_constant_pool<'a>(bytes: &'a [u8], ix: &mut usize) -> Result<Vec<ConstantPoolEntry<'a>>, ParseError> {
    let count = read_u2(bytes, ix)?;
    if count == 0 {
        fail!("Constant pool count must be at least 1");
    }
    let mut constant_pool = Vec::with_capacity(count.into());
    constant_pool.push(ConstantPoolEntry::Zero);
    let mut cp_ix = 1;
    while cp_ix < count {
        let constant_type = read_u1(bytes, ix)?;
        constant_pool.push(read_constant(bytes, ix, constant_type).map_err(|e| err!(e, "constant pool entry {}", cp_ix))?);
        cp_ix += 1;
        if constant_type == 5 || constant_type == 6 {
            // long and double types take up two entries in the constant pool,
            // so eat up another index.
            if cp_ix >= count {
                fail!("Long or double constant at index {} overruns the constant pool", cp_ix - 1);
            }
            cp_ix += 1;
            constant_pool.push(ConstantPoolEntry::Unused);
        }
    }
    validate_constant_pool(&constant_pool)?;
    Ok(constant_pool)
}

fn read_cp_ref_any<'p, 'a>(bytes: &[u8], ix: &mut usize, pool: &'p [ConstantPoolEntry<'a>]) -> Result<(u16, &'p ConstantPoolEntry<'a>), ParseError> {
    let cp_index = read_u2(bytes, ix)?;
    match pool.get(cp_index as usize) {
        Some(entry) => Ok((cp_index, entry)),
        None => fail!("Out-of-bounds index {} in constant pool reference", cp_index),
    }
}

pub(crate) fn read_cp_utf8_indexed<'a>(bytes: &[u8], ix: &mut usize, pool: &[ConstantPoolEntry<'a>]) -> Result<(u16, Cow<'a, str>), ParseError> {
    let (cp_index, cp_ref) = read_cp_ref_any(bytes, ix, pool)?;
    match cp_ref {
        ConstantPoolEntry::Utf8(_) => match cp_ref.utf8() {
            Some(x) => Ok((cp_index, x)),
            None => fail!("Invalid modified UTF-8 in constant pool entry {}", cp_index),
        },
        _ => fail!("Unexpected constant pool reference type"),
    }
}

pub(crate) fn read_cp_classinfo_index(bytes: &[u8], ix: &mut usize, pool: &[ConstantPoolEntry]) -> Result<u16, ParseError> {
    match read_cp_ref_any(bytes, ix, pool)? {
        (cp_index, ConstantPoolEntry::ClassInfo(_)) => Ok(cp_index),
        _ => fail!("Unexpected constant pool reference type"),
    }
}

pub(crate) fn read_cp_classinfo_opt_index(bytes: &[u8], ix: &mut usize, pool: &[ConstantPoolEntry]) -> Result<u16, ParseError> {
    match read_cp_ref_any(bytes, ix, pool)? {
        (cp_index, ConstantPoolEntry::Zero) |
        (cp_index, ConstantPoolEntry::ClassInfo(_)) => Ok(cp_index),
        _ => fail!("Unexpected constant pool reference type"),
    }
}

/// Resolves a `ClassInfo` index to its name. Validation during parsing
/// guarantees this succeeds for every `ClassInfo` in a parsed pool.
pub(crate) fn classinfo_name<'a>(pool: &[ConstantPoolEntry<'a>], index: u16) -> Option<Cow<'a, str>> {
    match pool.get(index as usize)? {
        ConstantPoolEntry::ClassInfo(name_index) => pool.get(*name_index as usize)?.utf8(),
        _ => None,
    }
}

/// The entries fingerprinting cares about, resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantPoolItem<'a> {
    Utf8(Cow<'a, str>),
    /// A `Utf8` entry that is not valid modified UTF-8.
    Utf8Bytes(&'a [u8]),
    ClassInfo(Cow<'a, str>),
}

pub struct ConstantPoolIter<'p, 'a> {
    constant_pool: &'p [ConstantPoolEntry<'a>],
    index: usize,
}

impl<'p, 'a> ConstantPoolIter<'p, 'a> {
    pub(crate) fn new(constant_pool: &'p [ConstantPoolEntry<'a>]) -> Self {
        ConstantPoolIter {
            constant_pool,
            index: 0,
        }
    }
}

impl<'p, 'a> Iterator for ConstantPoolIter<'p, 'a> {
    type Item = ConstantPoolItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.constant_pool.get(self.index) {
            self.index += 1;
            let item = match entry {
                ConstantPoolEntry::Utf8(x) => match entry.utf8() {
                    Some(s) => ConstantPoolItem::Utf8(s),
                    None => ConstantPoolItem::Utf8Bytes(*x),
                },
                ConstantPoolEntry::ClassInfo(name_index) => match self.constant_pool.get(*name_index as usize).and_then(|e| e.utf8()) {
                    Some(name) => ConstantPoolItem::ClassInfo(name),
                    None => continue,
                },
                ConstantPoolEntry::Zero |
                ConstantPoolEntry::Other { .. } |
                ConstantPoolEntry::Unused => continue,
            };
            return Some(item);
        }
        None
    }
}
