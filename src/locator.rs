use std::fmt;

use tracing::info;

use crate::names::is_unpackaged_object_descriptor;
use crate::{ClassDefinition, MethodAccessFlags, MethodDefinition};

/// Picks a method out of an obfuscated class without knowing its name: by
/// visibility, arity, and whether its one parameter is an unpackaged class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodShape {
    pub required_access: MethodAccessFlags,
    pub parameter_count: usize,
    pub unpackaged_object_parameters: bool,
}

impl MethodShape {
    /// A private method taking one argument whose type lives in the default
    /// package, like `private void a(Foo)`.
    pub fn private_unary_unpackaged() -> Self {
        MethodShape {
            required_access: MethodAccessFlags::PRIVATE,
            parameter_count: 1,
            unpackaged_object_parameters: true,
        }
    }

    pub fn accepts(&self, method: &MethodDefinition) -> bool {
        method.access_flags.contains(self.required_access)
            && method.parameters.len() == self.parameter_count
            && (!self.unpackaged_object_parameters || method.parameters.iter().all(|p| is_unpackaged_object_descriptor(p)))
    }
}

impl fmt::Display for MethodShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} with {} parameter(s)", self.required_access, self.parameter_count)?;
        if self.unpackaged_object_parameters {
            write!(f, " of unpackaged object type")?;
        }
        Ok(())
    }
}

/// Returns the first method, in declaration order, that `shape` accepts.
pub fn locate<'c, 'a>(class: &'c ClassDefinition<'a>, shape: &MethodShape) -> Option<(usize, &'c MethodDefinition<'a>)> {
    let found = class.methods.iter().enumerate().find(|(_, method)| shape.accepts(method));
    if let Some((_, method)) = found {
        info!(method = %method.name, descriptor = %method.descriptor, "candidate method found");
    }
    found
}
