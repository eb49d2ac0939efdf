//! Module encoder
//!
//! Builds a [`ModuleDescription`] in memory; [`ModuleDescription::encode`]
//! turns it into the bytes a Create transaction carries.

use crate::module::{Import, Method, MethodAttributes, ModuleDescription, DEFAULT_BASE_TYPE};
use crate::opcode::Instruction;
use quill_primitives::{Address, U256};

/// Builder for one method
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    method: Method,
}

impl MethodBuilder {
    /// Start an empty public method
    pub fn new(name: &str) -> Self {
        Self {
            method: Method {
                name: name.to_string(),
                attributes: MethodAttributes::default(),
                params: 0,
                locals: 0,
                code: Vec::new(),
            },
        }
    }

    /// Mark as the initializer
    pub fn initializer(mut self) -> Self {
        self.method.attributes = self.method.attributes.with(MethodAttributes::INITIALIZER);
        self
    }

    /// Mark as internal
    pub fn internal(mut self) -> Self {
        self.method.attributes = self.method.attributes.with(MethodAttributes::INTERNAL);
        self
    }

    /// Set parameter count
    pub fn params(mut self, params: u8) -> Self {
        self.method.params = params;
        self
    }

    /// Set local slot count
    pub fn locals(mut self, locals: u8) -> Self {
        self.method.locals = locals;
        self
    }

    /// Index the next instruction will get
    pub fn position(&self) -> u32 {
        self.method.code.len() as u32
    }

    /// Append an instruction
    pub fn op(mut self, instruction: Instruction) -> Self {
        self.method.code.push(instruction);
        self
    }

    /// Append several instructions
    pub fn ops(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.method.code.extend(instructions);
        self
    }

    /// Push an integer
    pub fn push_int(self, value: u64) -> Self {
        self.op(Instruction::PushInt(U256::from(value)))
    }

    /// Push a byte string
    pub fn push_bytes(self, bytes: &[u8]) -> Self {
        self.op(Instruction::PushBytes(bytes.to_vec()))
    }

    /// Push an address
    pub fn push_address(self, address: Address) -> Self {
        self.op(Instruction::PushAddress(address))
    }

    /// Push argument `index`
    pub fn load_arg(self, index: u8) -> Self {
        self.op(Instruction::LoadArg(index))
    }

    /// Invoke import `index`
    pub fn host(self, index: u16) -> Self {
        self.op(Instruction::Host(index))
    }

    /// Call method `index`
    pub fn call(self, index: u16) -> Self {
        self.op(Instruction::Call(index))
    }

    /// Return the top of the stack
    pub fn ret(self) -> Self {
        self.op(Instruction::Return)
    }

    /// Finish without a return value
    pub fn stop(self) -> Self {
        self.op(Instruction::Stop)
    }

    /// Abort with the top of the stack as reason
    pub fn abort(self) -> Self {
        self.op(Instruction::Abort)
    }

    /// Finish the method
    pub fn build(self) -> Method {
        self.method
    }
}

/// Builder for a whole module
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    contract_type: String,
    base_type: String,
    imports: Vec<Import>,
    methods: Vec<Method>,
    instrumented: bool,
}

impl ModuleBuilder {
    /// Start a contract deriving from the default base type
    pub fn contract(name: &str) -> Self {
        Self {
            contract_type: name.to_string(),
            base_type: DEFAULT_BASE_TYPE.to_string(),
            imports: Vec::new(),
            methods: Vec::new(),
            instrumented: false,
        }
    }

    /// Override the base type
    pub fn base(mut self, base: &str) -> Self {
        self.base_type = base.to_string();
        self
    }

    /// Append an import; its index is the number of imports before it
    pub fn import(mut self, name: &str) -> Self {
        self.imports.push(Import::new(name));
        self
    }

    /// Append a method; its index is the number of methods before it
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method.build());
        self
    }

    /// Set the instrumented flag without injecting anything
    pub fn instrumented(mut self, instrumented: bool) -> Self {
        self.instrumented = instrumented;
        self
    }

    /// Finish the module
    pub fn build(self) -> ModuleDescription {
        let initializer = self
            .methods
            .iter()
            .position(|m| m.attributes.is_initializer());
        let mut module = ModuleDescription {
            contract_type: self.contract_type,
            base_type: self.base_type,
            imports: self.imports,
            methods: self.methods,
            initializer,
            instrumented: self.instrumented,
            code_size: 0,
        };
        module.code_size = module.encode().len();
        module
    }

    /// Finish and encode
    pub fn encode(self) -> Vec<u8> {
        self.build().encode()
    }
}
