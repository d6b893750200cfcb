pub(crate) fn is_binary_name(name: &str) -> bool {
    for segment in name.split('/') {
        if !is_unqualified_name(segment, false, false) {
            return false;
        }
    }
    true
}

pub(crate) fn is_unqualified_name(name: &str, allow_init: bool, allow_clinit: bool) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => return false,
        Some('<') => return (allow_init && name == "<init>") || (allow_clinit && name == "<clinit>"),
        Some(x) if !is_valid_unqualified_char(x) => return false,
        Some(_) => (),
    };
    chars.all(is_valid_unqualified_char)
}

fn is_valid_unqualified_char(c: char) -> bool {
    match c {
        '.' | ';' | '[' | '/' | '<' | '>' => false,
        _ => true,
    }
}

pub(crate) fn is_array_descriptor(name: &str) -> bool {
    let dimensions = name.chars().take_while(|c| *c == '[').count();
    if dimensions == 0 || dimensions > 255 {
        return false;
    }
    is_field_descriptor(&name[dimensions..])
}

pub(crate) fn is_field_descriptor(name: &str) -> bool {
    match name.as_bytes().first() {
        Some(b'B') | Some(b'C') | Some(b'D') | Some(b'F') | Some(b'I') | Some(b'J') | Some(b'S') | Some(b'Z') => name.len() == 1,
        Some(b'L') => match name[1..].strip_suffix(';') {
            Some(class_name) => is_binary_name(class_name),
            None => false,
        },
        Some(b'[') => is_array_descriptor(name),
        _ => false,
    }
}

/// An object descriptor naming a class in the default package, such as `LFoo;`.
/// Obfuscated classes are typically flattened this way, while library types
/// always carry a package.
pub(crate) fn is_unpackaged_object_descriptor(descriptor: &str) -> bool {
    match descriptor.strip_prefix('L').and_then(|rest| rest.strip_suffix(';')) {
        Some(class_name) => is_unqualified_name(class_name, false, false),
        None => false,
    }
}
