use std::collections::HashSet;

use crate::constant_pool::ConstantPoolItem;
use crate::{ClassDefinition, TransformError};

/// Identifies a class by incidental structure and content instead of by name.
///
/// A class matches when it implements exactly `interface_count` interfaces,
/// its constant pool holds every string in `utf8_constants`, and it references
/// every class in `class_names`. Extra constants are fine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub label: String,
    pub interface_count: usize,
    pub utf8_constants: Vec<String>,
    pub class_names: Vec<String>,
}

impl Fingerprint {
    pub fn new(label: &str, interface_count: usize) -> Self {
        Fingerprint {
            label: label.to_string(),
            interface_count,
            utf8_constants: Vec::new(),
            class_names: Vec::new(),
        }
    }

    pub fn with_utf8_constants<I, S>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.utf8_constants.extend(constants.into_iter().map(Into::into));
        self
    }

    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// The vanilla level renderer: two interfaces, the sky and weather
    /// textures it binds, and three library types it alone pulls in together.
    pub fn level_renderer() -> Self {
        Fingerprint::new("LevelRenderer", 2)
            .with_utf8_constants(vec![
                "textures/environment/moon_phases.png",
                "textures/environment/sun.png",
                "textures/environment/clouds.png",
                "textures/environment/end_sky.png",
                "textures/misc/forcefield.png",
                "textures/environment/rain.png",
                "textures/environment/snow.png",
            ])
            .with_class_names(vec![
                "java/util/concurrent/atomic/AtomicReference",
                "it/unimi/dsi/fastutil/ints/Int2ObjectMap",
                "com/google/gson/JsonSyntaxException",
            ])
    }

    /// Explains why `class` does not match, checking the interface count
    /// before paying for the constant pool scan.
    pub fn check(&self, class: &ClassDefinition) -> Result<(), TransformError> {
        if class.interface_count() != self.interface_count {
            return Err(TransformError::NoStructuralMatch {
                found: class.interface_count(),
                required: self.interface_count,
            });
        }

        let mut strings = HashSet::new();
        let mut classes = HashSet::new();
        for item in class.constantpool_iter() {
            match item {
                ConstantPoolItem::Utf8(s) => {
                    strings.insert(s);
                }
                ConstantPoolItem::ClassInfo(name) => {
                    classes.insert(name);
                }
                ConstantPoolItem::Utf8Bytes(_) => (),
            }
        }

        let missing_string = self.utf8_constants.iter().find(|s| !strings.contains(s.as_str()));
        let missing_class = self.class_names.iter().find(|c| !classes.contains(c.as_str()));
        match missing_string.or(missing_class) {
            Some(missing) => Err(TransformError::NoContentMatch { missing: missing.clone() }),
            None => Ok(()),
        }
    }

    pub fn matches(&self, class: &ClassDefinition) -> bool {
        self.check(class).is_ok()
    }
}
