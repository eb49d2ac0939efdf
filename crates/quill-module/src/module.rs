//! Decompiled module description

use crate::opcode::{HostFunction, Instruction};

/// Module magic bytes
pub const MAGIC: [u8; 4] = *b"QMOD";

/// Current format version
pub const FORMAT_VERSION: u8 = 1;

/// Base type every contract derives from
pub const DEFAULT_BASE_TYPE: &str = "SmartContract";

/// Module flag: gas metering has been injected
pub(crate) const FLAG_INSTRUMENTED: u8 = 0x01;

/// Method attribute bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodAttributes(u8);

impl MethodAttributes {
    /// Run once at deployment
    pub const INITIALIZER: u8 = 0x01;
    /// Not callable from a transaction
    pub const INTERNAL: u8 = 0x02;
    const KNOWN: u8 = Self::INITIALIZER | Self::INTERNAL;

    /// Parse raw bits; `None` if unknown bits are set
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::KNOWN == 0).then_some(Self(bits))
    }

    /// Raw bits
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Check the initializer bit
    pub fn is_initializer(self) -> bool {
        self.0 & Self::INITIALIZER != 0
    }

    /// Check the internal bit
    pub fn is_internal(self) -> bool {
        self.0 & Self::INTERNAL != 0
    }

    pub(crate) fn with(self, bit: u8) -> Self {
        Self(self.0 | bit)
    }
}

/// Imported host facility
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Name as written in the module
    pub name: String,
    /// Resolved capability, if the name is known
    pub host: Option<HostFunction>,
}

impl Import {
    /// Resolve `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let host = HostFunction::from_name(&name);
        Self { name, host }
    }
}

/// One method of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Attribute bits
    pub attributes: MethodAttributes,
    /// Number of parameters
    pub params: u8,
    /// Number of local slots
    pub locals: u8,
    /// Instructions
    pub code: Vec<Instruction>,
}

impl Method {
    /// Callable from a transaction or another contract
    pub fn is_callable(&self) -> bool {
        !self.attributes.is_internal() && !self.attributes.is_initializer()
    }
}

/// Structured view of a contract module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescription {
    /// Primary contract type name
    pub contract_type: String,
    /// Base type name
    pub base_type: String,
    /// Import table
    pub imports: Vec<Import>,
    /// Method table
    pub methods: Vec<Method>,
    /// Index of the first method carrying the initializer attribute
    pub initializer: Option<usize>,
    /// Gas metering has been injected
    pub instrumented: bool,
    /// Encoded size in bytes
    pub code_size: usize,
}

impl ModuleDescription {
    /// Look up a method by name
    pub fn find_method(&self, name: &str) -> Option<(usize, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, method)| method.name == name)
    }

    /// The initializer method
    pub fn initializer_method(&self) -> Option<&Method> {
        self.initializer.and_then(|index| self.methods.get(index))
    }

    /// Host capability bound to import `index`
    pub fn host(&self, index: u16) -> Option<HostFunction> {
        self.imports.get(usize::from(index)).and_then(|i| i.host)
    }

    /// Total instruction count
    pub fn instruction_count(&self) -> usize {
        self.methods.iter().map(|m| m.code.len()).sum()
    }

    /// Canonical encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.code_size.max(64));
        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        buf.push(if self.instrumented { FLAG_INSTRUMENTED } else { 0 });
        write_str(&mut buf, &self.contract_type);
        write_str(&mut buf, &self.base_type);

        buf.extend_from_slice(&(self.imports.len() as u16).to_le_bytes());
        for import in &self.imports {
            write_str(&mut buf, &import.name);
        }

        buf.extend_from_slice(&(self.methods.len() as u16).to_le_bytes());
        for method in &self.methods {
            write_str(&mut buf, &method.name);
            buf.push(method.attributes.bits());
            buf.push(method.params);
            buf.push(method.locals);
            buf.extend_from_slice(&(method.code.len() as u32).to_le_bytes());
            for instruction in &method.code {
                instruction.encode_into(&mut buf);
            }
        }
        buf
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}
