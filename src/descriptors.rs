use std::borrow::Cow;

use crate::names::is_field_descriptor;
use crate::ParseError;

// Borrows from the descriptor when it was borrowed from the class file bytes.
fn slice<'a>(data: &Cow<'a, str>, start: usize, end: usize) -> Cow<'a, str> {
    match data {
        Cow::Borrowed(borrowed_str) => Cow::Borrowed(&borrowed_str[start..end]),
        Cow::Owned(owned_str) => Cow::Owned(owned_str[start..end].to_string()),
    }
}

// Returns the byte length of the field type starting at `start`.
fn field_type_len(data: &str, start: usize) -> Result<usize, ParseError> {
    let bytes = data.as_bytes();
    let mut end = start;
    while bytes.get(end) == Some(&b'[') {
        end += 1;
    }
    match bytes.get(end) {
        Some(b'B') | Some(b'C') | Some(b'D') | Some(b'F') | Some(b'I') | Some(b'J') | Some(b'S') | Some(b'Z') => end += 1,
        Some(b'L') => match data[end..].find(';') {
            Some(semicolon) => end += semicolon + 1,
            None => fail!("Unterminated class name in descriptor at index {}", end),
        },
        Some(c) => fail!("Unexpected character {:?} in descriptor at index {}", *c as char, end),
        None => fail!("Unexpected end of descriptor at index {}", end),
    }
    if !is_field_descriptor(&data[start..end]) {
        fail!("Invalid field type {:?} in descriptor", &data[start..end]);
    }
    Ok(end - start)
}

/// Splits a method descriptor such as `(ILFoo;[J)V` into its parameter
/// descriptors `I`, `LFoo;`, `[J`. The return type is checked but dropped.
pub(crate) fn parse_parameters<'a>(descriptor: &Cow<'a, str>) -> Result<Vec<Cow<'a, str>>, ParseError> {
    if !descriptor.starts_with('(') {
        fail!("Invalid start of method descriptor, missing (");
    }
    let mut parameters = Vec::new();
    let mut ix = 1;
    loop {
        match descriptor.as_bytes().get(ix) {
            Some(b')') => break,
            Some(_) => {
                let len = field_type_len(descriptor, ix)?;
                parameters.push(slice(descriptor, ix, ix + len));
                ix += len;
            }
            None => fail!("Invalid method descriptor, missing end )"),
        }
    }
    ix += 1;
    match &descriptor[ix..] {
        "V" => (),
        result if is_field_descriptor(result) => (),
        result => fail!("Invalid return type {:?} in method descriptor", result),
    }
    Ok(parameters)
}
