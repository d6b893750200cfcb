use std::borrow::Cow;
use std::ops::Deref;

use crate::constant_pool::{read_cp_utf8_indexed, ConstantPoolEntry};
use crate::{read_bytes, read_u2, read_u4, ParseError};

#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Constant pool index of the caught class, 0 for `finally`.
    pub catch_type: u16,
}

#[derive(Debug)]
pub struct CodeData<'a> {
    pub max_stack: u16,
    pub max_locals: u16,
    /// The raw instruction stream. Becomes owned once the method is patched.
    pub code: Cow<'a, [u8]>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo<'a>>,
}

#[derive(Debug)]
pub enum AttributeData<'a> {
    Code(CodeData<'a>),
    Other(&'a [u8]),
}

#[derive(Debug)]
pub struct AttributeInfo<'a> {
    pub(crate) name_index: u16,
    pub name: Cow<'a, str>,
    pub data: AttributeData<'a>,
}

fn read_code_data<'a>(bytes: &'a [u8], ix: &mut usize, pool: &[ConstantPoolEntry<'a>]) -> Result<CodeData<'a>, ParseError> {
    let max_stack = read_u2(bytes, ix)?;
    let max_locals = read_u2(bytes, ix)?;
    let code_length = read_u4(bytes, ix)? as usize;
    if code_length == 0 {
        fail!("Empty code array in code attribute");
    }
    let code = read_bytes(bytes, ix, code_length).map_err(|e| err!(e, "code array"))?;
    let exception_table_count = read_u2(bytes, ix)?;
    let mut exception_table = Vec::with_capacity(exception_table_count.into());
    for _ in 0..exception_table_count {
        exception_table.push(ExceptionTableEntry {
            start_pc: read_u2(bytes, ix)?,
            end_pc: read_u2(bytes, ix)?,
            handler_pc: read_u2(bytes, ix)?,
            catch_type: read_u2(bytes, ix)?,
        });
    }
    let attributes = read_attributes(bytes, ix, pool, false).map_err(|e| err!(e, "code attribute"))?;
    Ok(CodeData {
        max_stack,
        max_locals,
        code: Cow::Borrowed(code),
        exception_table,
        attributes,
    })
}

/// Reads an attribute table. `Code` is only decoded where a method may carry
/// it (`in_method`); anywhere else it stays opaque, so nesting never recurses.
pub(crate) fn read_attributes<'a>(
    bytes: &'a [u8],
    ix: &mut usize,
    pool: &[ConstantPoolEntry<'a>],
    in_method: bool,
) -> Result<Vec<AttributeInfo<'a>>, ParseError> {
    let count = read_u2(bytes, ix)?;
    let mut attributes = Vec::with_capacity(count.into());
    for i in 0..count {
        let (name_index, name) = read_cp_utf8_indexed(bytes, ix, pool).map_err(|e| err!(e, "name field of attribute {}", i))?;
        let length = read_u4(bytes, ix)? as usize;
        let expected_end_ix = *ix + length;
        if bytes.len() < expected_end_ix {
            fail!("Unexpected end of stream reading attribute {} at index {}", i, *ix);
        }
        let data = match name.deref() {
            "Code" if in_method => {
                // Confine the nested reads to this attribute's declared extent.
                let body = &bytes[.. expected_end_ix];
                AttributeData::Code(read_code_data(body, ix, pool).map_err(|e| err!(e, "attribute {}", i))?)
            }
            _ => AttributeData::Other(read_bytes(bytes, ix, length)?),
        };
        if expected_end_ix != *ix {
            fail!("Length mismatch when reading attribute {}", i);
        }
        attributes.push(AttributeInfo {
            name_index,
            name,
            data,
        });
    }
    Ok(attributes)
}

impl<'a> AttributeInfo<'a> {
    /// The value of `attribute_length` this attribute serializes with.
    pub(crate) fn body_len(&self) -> usize {
        match &self.data {
            AttributeData::Other(data) => data.len(),
            AttributeData::Code(code) => {
                2 + 2 + 4 + code.code.len()
                    + 2 + 8 * code.exception_table.len()
                    + 2 + code.attributes.iter().map(|a| 6 + a.body_len()).sum::<usize>()
            }
        }
    }
}
