use crate::{AttributeData, AttributeInfo, ClassDefinition, ConstantPoolEntry};

fn write_u1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

fn write_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

// Counts and lengths were all read from fields of these widths, and patching
// never changes a length, so the narrowing casts below cannot truncate.

fn write_constant_pool(out: &mut Vec<u8>, pool: &[ConstantPoolEntry]) {
    write_u2(out, pool.len() as u16);
    for entry in pool {
        match entry {
            ConstantPoolEntry::Zero | ConstantPoolEntry::Unused => (),
            ConstantPoolEntry::Utf8(bytes) => {
                write_u1(out, 1);
                write_u2(out, bytes.len() as u16);
                out.extend_from_slice(bytes);
            }
            ConstantPoolEntry::ClassInfo(name_index) => {
                write_u1(out, 7);
                write_u2(out, *name_index);
            }
            ConstantPoolEntry::Other { tag, data } => {
                write_u1(out, *tag);
                out.extend_from_slice(data);
            }
        }
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) {
    write_u2(out, attributes.len() as u16);
    for attribute in attributes {
        write_u2(out, attribute.name_index);
        write_u4(out, attribute.body_len() as u32);
        match &attribute.data {
            AttributeData::Other(data) => out.extend_from_slice(data),
            AttributeData::Code(code) => {
                write_u2(out, code.max_stack);
                write_u2(out, code.max_locals);
                write_u4(out, code.code.len() as u32);
                out.extend_from_slice(&code.code);
                write_u2(out, code.exception_table.len() as u16);
                for entry in &code.exception_table {
                    write_u2(out, entry.start_pc);
                    write_u2(out, entry.end_pc);
                    write_u2(out, entry.handler_pc);
                    write_u2(out, entry.catch_type);
                }
                write_attributes(out, &code.attributes);
            }
        }
    }
}

/// Writes `class` back out in class file format. For a class that was
/// parsed and not modified the output equals the parsed input.
pub fn serialize(class: &ClassDefinition) -> Vec<u8> {
    let mut out = Vec::new();
    write_u4(&mut out, 0xCAFEBABE);
    write_u2(&mut out, class.minor_version);
    write_u2(&mut out, class.major_version);
    write_constant_pool(&mut out, &class.constant_pool);
    write_u2(&mut out, class.access_flags.bits());
    write_u2(&mut out, class.this_class);
    write_u2(&mut out, class.super_class);
    write_u2(&mut out, class.interfaces.len() as u16);
    for interface in &class.interfaces {
        write_u2(&mut out, *interface);
    }
    write_u2(&mut out, class.fields.len() as u16);
    for field in &class.fields {
        write_u2(&mut out, field.access_flags.bits());
        write_u2(&mut out, field.name_index);
        write_u2(&mut out, field.descriptor_index);
        write_attributes(&mut out, &field.attributes);
    }
    write_u2(&mut out, class.methods.len() as u16);
    for method in &class.methods {
        write_u2(&mut out, method.access_flags.bits());
        write_u2(&mut out, method.name_index);
        write_u2(&mut out, method.descriptor_index);
        write_attributes(&mut out, &method.attributes);
    }
    write_attributes(&mut out, &class.attributes);
    out
}
