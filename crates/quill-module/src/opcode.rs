//! Instruction set definitions

use quill_primitives::{Address, U256};

/// Opcode bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    // Stack
    Nop = 0x00,
    PushInt = 0x01,
    PushBytes = 0x02,
    PushAddress = 0x03,
    Pop = 0x04,
    Dup = 0x05,
    Swap = 0x06,

    // Arguments and locals
    LoadArg = 0x10,
    LoadLocal = 0x11,
    StoreLocal = 0x12,

    // Arithmetic, comparison and logic
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Mod = 0x24,
    Lt = 0x25,
    Gt = 0x26,
    Eq = 0x27,
    IsZero = 0x28,
    And = 0x29,
    Or = 0x2A,
    Not = 0x2B,
    Concat = 0x2C,

    // Control flow
    Jump = 0x30,
    JumpIf = 0x31,
    Call = 0x32,
    Return = 0x33,
    Stop = 0x34,
    Abort = 0x35,

    // Host interface
    Host = 0x40,

    // Floating point (decodable, never executable)
    FloatAdd = 0x50,
    FloatMul = 0x51,
    FloatDiv = 0x52,

    // Metering, only written by the gas injector
    Gas = 0xF0,
}

impl Opcode {
    /// Try to convert from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::PushInt),
            0x02 => Some(Self::PushBytes),
            0x03 => Some(Self::PushAddress),
            0x04 => Some(Self::Pop),
            0x05 => Some(Self::Dup),
            0x06 => Some(Self::Swap),
            0x10 => Some(Self::LoadArg),
            0x11 => Some(Self::LoadLocal),
            0x12 => Some(Self::StoreLocal),
            0x20 => Some(Self::Add),
            0x21 => Some(Self::Sub),
            0x22 => Some(Self::Mul),
            0x23 => Some(Self::Div),
            0x24 => Some(Self::Mod),
            0x25 => Some(Self::Lt),
            0x26 => Some(Self::Gt),
            0x27 => Some(Self::Eq),
            0x28 => Some(Self::IsZero),
            0x29 => Some(Self::And),
            0x2A => Some(Self::Or),
            0x2B => Some(Self::Not),
            0x2C => Some(Self::Concat),
            0x30 => Some(Self::Jump),
            0x31 => Some(Self::JumpIf),
            0x32 => Some(Self::Call),
            0x33 => Some(Self::Return),
            0x34 => Some(Self::Stop),
            0x35 => Some(Self::Abort),
            0x40 => Some(Self::Host),
            0x50 => Some(Self::FloatAdd),
            0x51 => Some(Self::FloatMul),
            0x52 => Some(Self::FloatDiv),
            0xF0 => Some(Self::Gas),
            _ => None,
        }
    }

    /// Check if this opcode ends a basic block
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Self::Jump | Self::JumpIf | Self::Return | Self::Stop | Self::Abort
        )
    }

    /// Check if this is a floating point opcode
    pub fn is_float(self) -> bool {
        matches!(self, Self::FloatAdd | Self::FloatMul | Self::FloatDiv)
    }
}

/// A decoded instruction with its immediates
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Instruction {
    Nop,
    PushInt(U256),
    PushBytes(Vec<u8>),
    PushAddress(Address),
    Pop,
    Dup,
    Swap,
    LoadArg(u8),
    LoadLocal(u8),
    StoreLocal(u8),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Eq,
    IsZero,
    And,
    Or,
    Not,
    Concat,
    /// Jump to an instruction index within the method
    Jump(u32),
    /// Pop a value, jump if it is truthy
    JumpIf(u32),
    /// Call a method of this module by table index
    Call(u16),
    Return,
    Stop,
    Abort,
    /// Invoke an import by table index
    Host(u16),
    FloatAdd,
    FloatMul,
    FloatDiv,
    /// Debit gas before a basic block runs
    Gas(u64),
}

impl Instruction {
    /// Opcode of this instruction
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::PushInt(_) => Opcode::PushInt,
            Self::PushBytes(_) => Opcode::PushBytes,
            Self::PushAddress(_) => Opcode::PushAddress,
            Self::Pop => Opcode::Pop,
            Self::Dup => Opcode::Dup,
            Self::Swap => Opcode::Swap,
            Self::LoadArg(_) => Opcode::LoadArg,
            Self::LoadLocal(_) => Opcode::LoadLocal,
            Self::StoreLocal(_) => Opcode::StoreLocal,
            Self::Add => Opcode::Add,
            Self::Sub => Opcode::Sub,
            Self::Mul => Opcode::Mul,
            Self::Div => Opcode::Div,
            Self::Mod => Opcode::Mod,
            Self::Lt => Opcode::Lt,
            Self::Gt => Opcode::Gt,
            Self::Eq => Opcode::Eq,
            Self::IsZero => Opcode::IsZero,
            Self::And => Opcode::And,
            Self::Or => Opcode::Or,
            Self::Not => Opcode::Not,
            Self::Concat => Opcode::Concat,
            Self::Jump(_) => Opcode::Jump,
            Self::JumpIf(_) => Opcode::JumpIf,
            Self::Call(_) => Opcode::Call,
            Self::Return => Opcode::Return,
            Self::Stop => Opcode::Stop,
            Self::Abort => Opcode::Abort,
            Self::Host(_) => Opcode::Host,
            Self::FloatAdd => Opcode::FloatAdd,
            Self::FloatMul => Opcode::FloatMul,
            Self::FloatDiv => Opcode::FloatDiv,
            Self::Gas(_) => Opcode::Gas,
        }
    }

    /// Jump target, if this is a jump
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Self::Jump(target) | Self::JumpIf(target) => Some(*target),
            _ => None,
        }
    }

    /// Check if this instruction ends a basic block
    pub fn is_terminator(&self) -> bool {
        self.opcode().is_terminator()
    }

    /// Append the encoded form to `buf`
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode() as u8);
        match self {
            Self::PushInt(v) => {
                let mut word = [0u8; 32];
                v.to_big_endian(&mut word);
                buf.extend_from_slice(&word);
            }
            Self::PushBytes(bytes) => {
                buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
            Self::PushAddress(addr) => buf.extend_from_slice(addr.as_bytes()),
            Self::LoadArg(i) | Self::LoadLocal(i) | Self::StoreLocal(i) => buf.push(*i),
            Self::Jump(target) | Self::JumpIf(target) => {
                buf.extend_from_slice(&target.to_le_bytes())
            }
            Self::Call(index) | Self::Host(index) => buf.extend_from_slice(&index.to_le_bytes()),
            Self::Gas(amount) => buf.extend_from_slice(&amount.to_le_bytes()),
            _ => {}
        }
    }
}

/// Host facilities a contract may import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFunction {
    /// key -> value (empty bytes if unset)
    StorageGet,
    /// key, value ->
    StorageSet,
    /// key -> 0/1
    StorageHas,
    /// -> balance of the running contract
    BalanceSelf,
    /// address -> balance
    BalanceOf,
    /// to, amount -> (pays from the running contract)
    Transfer,
    /// -> caller address
    ContextCaller,
    /// -> running contract address
    ContextSelf,
    /// -> value attached to the call
    ContextValue,
    /// -> block number
    ContextBlockNumber,
    /// -> block difficulty
    ContextDifficulty,
    /// -> coinbase address
    ContextCoinbase,
    /// -> gas price
    ContextGasPrice,
    /// value -> (appends a log)
    LogEmit,
    /// value -> keccak-256 digest of its payload
    HashKeccak256,
    /// target, value, method, args.., argc -> return value, success flag
    ContractCall,
}

impl HostFunction {
    /// Every host function
    pub const ALL: [HostFunction; 16] = [
        Self::StorageGet,
        Self::StorageSet,
        Self::StorageHas,
        Self::BalanceSelf,
        Self::BalanceOf,
        Self::Transfer,
        Self::ContextCaller,
        Self::ContextSelf,
        Self::ContextValue,
        Self::ContextBlockNumber,
        Self::ContextDifficulty,
        Self::ContextCoinbase,
        Self::ContextGasPrice,
        Self::LogEmit,
        Self::HashKeccak256,
        Self::ContractCall,
    ];

    /// Import name
    pub fn name(self) -> &'static str {
        match self {
            Self::StorageGet => "storage.get",
            Self::StorageSet => "storage.set",
            Self::StorageHas => "storage.has",
            Self::BalanceSelf => "balance.self",
            Self::BalanceOf => "balance.of",
            Self::Transfer => "transfer",
            Self::ContextCaller => "context.caller",
            Self::ContextSelf => "context.self",
            Self::ContextValue => "context.value",
            Self::ContextBlockNumber => "context.block_number",
            Self::ContextDifficulty => "context.difficulty",
            Self::ContextCoinbase => "context.coinbase",
            Self::ContextGasPrice => "context.gas_price",
            Self::LogEmit => "log.emit",
            Self::HashKeccak256 => "hash.keccak256",
            Self::ContractCall => "contract.call",
        }
    }

    /// Resolve an import name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|host| host.name() == name)
    }
}
