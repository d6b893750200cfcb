#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;

pub const SIPUSH_1500: [u8; 3] = [0x11, 0x05, 0xdc];

pub const TEXTURES: [&str; 7] = [
    "textures/environment/moon_phases.png",
    "textures/environment/sun.png",
    "textures/environment/clouds.png",
    "textures/environment/end_sky.png",
    "textures/misc/forcefield.png",
    "textures/environment/rain.png",
    "textures/environment/snow.png",
];

pub const LIBRARY_CLASSES: [&str; 3] = [
    "java/util/concurrent/atomic/AtomicReference",
    "it/unimi/dsi/fastutil/ints/Int2ObjectMap",
    "com/google/gson/JsonSyntaxException",
];

/// Assembles class files byte by byte. Only what the parser checks is
/// produced; the bytecode is never verified.
#[derive(Clone)]
pub struct ClassBuilder {
    pool: Vec<u8>,
    pool_count: u16,
    utf8s: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = ClassBuilder {
            pool: Vec::new(),
            pool_count: 1,
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    fn push_entry(&mut self, entry: &[u8], slots: u16) -> u16 {
        let index = self.pool_count;
        self.pool.extend_from_slice(entry);
        self.pool_count += slots;
        index
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        if let Some(index) = self.utf8s.get(s) {
            return *index;
        }
        let mut entry = vec![1];
        entry.extend_from_slice(&(s.len() as u16).to_be_bytes());
        entry.extend_from_slice(s.as_bytes());
        let index = self.push_entry(&entry, 1);
        self.utf8s.insert(s.to_string(), index);
        index
    }

    /// Adds a Utf8 entry holding arbitrary bytes.
    pub fn raw_utf8(&mut self, bytes: &[u8]) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        entry.extend_from_slice(bytes);
        self.push_entry(&entry, 1)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name_index.to_be_bytes());
        let index = self.push_entry(&entry, 1);
        self.classes.insert(name.to_string(), index);
        index
    }

    pub fn string(&mut self, s: &str) -> u16 {
        let utf8_index = self.utf8(s);
        let mut entry = vec![8];
        entry.extend_from_slice(&utf8_index.to_be_bytes());
        self.push_entry(&entry, 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(&entry, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(&entry, 2)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut name_and_type = vec![12];
        name_and_type.extend_from_slice(&name_index.to_be_bytes());
        name_and_type.extend_from_slice(&descriptor_index.to_be_bytes());
        let name_and_type_index = self.push_entry(&name_and_type, 1);
        let mut entry = vec![10];
        entry.extend_from_slice(&class_index.to_be_bytes());
        entry.extend_from_slice(&name_and_type_index.to_be_bytes());
        self.push_entry(&entry, 1)
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn literal(mut self, s: &str) -> Self {
        self.string(s);
        self
    }

    pub fn reference(mut self, name: &str) -> Self {
        self.class(name);
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        let mut field = Vec::new();
        field.extend_from_slice(&access.to_be_bytes());
        field.extend_from_slice(&self.utf8(name).to_be_bytes());
        field.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        field.extend_from_slice(&0u16.to_be_bytes());
        self.fields.push(field);
        self
    }

    /// Adds a method. `code` of `None` declares it without a body.
    pub fn method(mut self, access: u16, name: &str, descriptor: &str, code: Option<&[u8]>) -> Self {
        let mut method = Vec::new();
        method.extend_from_slice(&access.to_be_bytes());
        method.extend_from_slice(&self.utf8(name).to_be_bytes());
        method.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        match code {
            Some(code) => {
                method.extend_from_slice(&1u16.to_be_bytes());
                let attribute = self.code_attribute(code);
                method.extend_from_slice(&attribute);
            }
            None => method.extend_from_slice(&0u16.to_be_bytes()),
        }
        self.methods.push(method);
        self
    }

    /// Adds a method whose only attribute is `name` with an arbitrary body.
    pub fn method_with_attribute(mut self, access: u16, name: &str, descriptor: &str, attribute: &str, body: &[u8]) -> Self {
        let mut method = Vec::new();
        method.extend_from_slice(&access.to_be_bytes());
        method.extend_from_slice(&self.utf8(name).to_be_bytes());
        method.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        method.extend_from_slice(&1u16.to_be_bytes());
        method.extend_from_slice(&self.utf8(attribute).to_be_bytes());
        method.extend_from_slice(&(body.len() as u32).to_be_bytes());
        method.extend_from_slice(body);
        self.methods.push(method);
        self
    }

    // A Code attribute with a one-row exception table and a line number table,
    // so nested structures survive the round trip too.
    fn code_attribute(&mut self, code: &[u8]) -> Vec<u8> {
        let catch_type = self.class("java/lang/RuntimeException");
        let mut line_numbers = Vec::new();
        line_numbers.extend_from_slice(&self.utf8("LineNumberTable").to_be_bytes());
        line_numbers.extend_from_slice(&6u32.to_be_bytes());
        line_numbers.extend_from_slice(&1u16.to_be_bytes());
        line_numbers.extend_from_slice(&0u16.to_be_bytes());
        line_numbers.extend_from_slice(&42u16.to_be_bytes());

        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_be_bytes());
        body.extend_from_slice(&5u16.to_be_bytes());
        body.extend_from_slice(&(code.len() as u32).to_be_bytes());
        body.extend_from_slice(code);
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&(code.len() as u16).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&catch_type.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&line_numbers);

        let mut attribute = Vec::new();
        attribute.extend_from_slice(&self.utf8("Code").to_be_bytes());
        attribute.extend_from_slice(&(body.len() as u32).to_be_bytes());
        attribute.extend_from_slice(&body);
        attribute
    }

    pub fn source_file(mut self, name: &str) -> Self {
        let mut attribute = Vec::new();
        attribute.extend_from_slice(&self.utf8("SourceFile").to_be_bytes());
        attribute.extend_from_slice(&2u32.to_be_bytes());
        attribute.extend_from_slice(&self.utf8(name).to_be_bytes());
        self.attributes.push(attribute);
        self
    }

    /// Adds a class level attribute with an arbitrary body.
    pub fn attribute(mut self, name: &str, body: &[u8]) -> Self {
        let mut attribute = Vec::new();
        attribute.extend_from_slice(&self.utf8(name).to_be_bytes());
        attribute.extend_from_slice(&(body.len() as u32).to_be_bytes());
        attribute.extend_from_slice(body);
        self.attributes.push(attribute);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&61u16.to_be_bytes());
        out.extend_from_slice(&self.pool_count.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&(ACC_PUBLIC | ACC_FINAL | ACC_SUPER).to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        for table in &[&self.fields, &self.methods, &self.attributes] {
            out.extend_from_slice(&(table.len() as u16).to_be_bytes());
            for entry in table.iter() {
                out.extend_from_slice(entry);
            }
        }
        out
    }
}

/// The body of the star field builder, reduced to its loop:
///
/// ```text
///  0: sipush 1500
///  3: istore_2
///  4: iconst_0
///  5: istore_3
///  6: iload_3
///  7: iload_2
///  8: if_icmpge 17
/// 11: iinc 3, 1
/// 14: goto 6
/// 17: return
/// ```
pub fn star_loop() -> Vec<u8> {
    let mut code = SIPUSH_1500.to_vec();
    code.extend_from_slice(&[0x3d, 0x03, 0x3e, 0x1d, 0x1c, 0xa2, 0x00, 0x09, 0x84, 0x03, 0x01, 0xa7, 0xff, 0xf8, 0xb1]);
    code
}

/// Two independent star counts in one method, with a tableswitch between
/// them whose case keys carry the `sipush 1500` byte pattern.
pub fn twin_star_loops() -> Vec<u8> {
    let mut code = SIPUSH_1500.to_vec();
    code.push(0x3d); // istore_2
    code.push(0x1c); // iload_2
    code.push(0xaa); // tableswitch at pc 5
    code.extend_from_slice(&[0x00, 0x00]); // pad to pc 8
    code.extend_from_slice(&[0x00, 0x00, 0x00, 0x13]); // default: pc 24
    code.extend_from_slice(&[0x11, 0x05, 0xdc, 0x00]); // low
    code.extend_from_slice(&[0x11, 0x05, 0xdc, 0x00]); // high
    code.extend_from_slice(&[0x00, 0x00, 0x00, 0x13]); // the one case: pc 24
    code.extend_from_slice(&SIPUSH_1500); // pc 24
    code.push(0x3e); // istore_3
    code.push(0xb1); // return
    code
}

/// The body of a `Code` attribute (a lone `return`) whose own attribute
/// table holds another `Code` attribute, `depth` levels down. `code_name`
/// is the pool index of the "Code" string.
pub fn nested_code_body(code_name: u16, depth: usize) -> Vec<u8> {
    // Stack and locals, one byte of code, no exception table, attribute count.
    const LEVEL: usize = 2 + 2 + 4 + 1 + 2 + 2;
    let mut body = Vec::with_capacity(LEVEL + depth * (LEVEL + 6));
    for level in (0..=depth).rev() {
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&1u32.to_be_bytes());
        body.push(0xb1);
        body.extend_from_slice(&0u16.to_be_bytes());
        if level == 0 {
            body.extend_from_slice(&0u16.to_be_bytes());
        } else {
            body.extend_from_slice(&1u16.to_be_bytes());
            body.extend_from_slice(&code_name.to_be_bytes());
            body.extend_from_slice(&((LEVEL + (level - 1) * (LEVEL + 6)) as u32).to_be_bytes());
        }
    }
    body
}

/// A class that fingerprints as the level renderer and whose star field
/// method has `code` as its body.
pub fn level_renderer_with(code: &[u8]) -> ClassBuilder {
    let mut builder = ClassBuilder::new("dzx")
        .interface("java/lang/AutoCloseable")
        .interface("ajl");
    builder.long(0x5f5e100);
    builder.integer(1500);
    for texture in TEXTURES.iter() {
        builder = builder.literal(texture);
    }
    for class in LIBRARY_CLASSES.iter() {
        builder = builder.reference(class);
    }
    builder.method_ref("java/lang/Object", "<init>", "()V");
    builder
        .field(ACC_PRIVATE | ACC_FINAL, "f", "Lefw;")
        .field(ACC_PRIVATE | ACC_STATIC, "g", "I")
        .method(ACC_PUBLIC, "<init>", "(Lefw;)V", Some(&[0x2a, 0xb1][..]))
        // Public, so never the candidate even though it holds the literal.
        .method(ACC_PUBLIC, "a", "(Lefw;)V", Some(&star_loop()[..]))
        // Packaged parameter type.
        .method(ACC_PRIVATE, "b", "(Ljava/lang/String;)V", Some(&[0xb1][..]))
        // Two parameters.
        .method(ACC_PRIVATE, "c", "(Lefw;I)V", Some(&[0xb1][..]))
        .method(ACC_PRIVATE, "d", "(Lefw;)V", Some(code))
        // Also matches, but comes after the first candidate.
        .method(ACC_PRIVATE, "e", "(Lcjb;)V", Some(&star_loop()[..]))
        .method(ACC_PRIVATE | ACC_STATIC, "h", "([I)I", Some(&[0x03, 0xac][..]))
        .source_file("SourceFile")
}

pub fn level_renderer() -> ClassBuilder {
    level_renderer_with(&star_loop())
}

/// Offsets at which `a` and `b` differ. Panics if the lengths differ.
pub fn differing_offsets(a: &[u8], b: &[u8]) -> Vec<usize> {
    assert_eq!(a.len(), b.len(), "lengths differ");
    a.iter().zip(b.iter()).enumerate().filter(|(_, (x, y))| x != y).map(|(i, _)| i).collect()
}

/// Where the body of method `name` starts within `bytes`.
pub fn code_offset(bytes: &[u8], name: &str) -> usize {
    let class = starpatch::parse_class(bytes).unwrap();
    let method = class.methods.iter().find(|m| m.name == name).unwrap();
    method.code().unwrap().code.as_ptr() as usize - bytes.as_ptr() as usize
}

/// Every offset at which `needle` starts in `haystack`.
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    haystack.windows(needle.len()).enumerate().filter(|(_, w)| *w == needle).map(|(i, _)| i).collect()
}

/// An in-memory sink for formatted diagnostics.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with every diagnostic at or above TRACE captured as plain text.
pub fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}
