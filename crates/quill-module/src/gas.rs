//! Gas costs
//!
//! Every instruction has a static cost known before execution, which the
//! injector sums per basic block. Instructions that copy or persist byte
//! strings also carry a size-dependent cost the VM charges at run time.

use crate::module::Import;
use crate::opcode::{HostFunction, Instruction};

/// Gas costs for instructions and host calls
pub mod cost {
    /// Zero gas
    pub const ZERO: u64 = 0;
    /// Stack shuffling, pushes, argument and local access
    pub const BASE: u64 = 1;
    /// Add, sub, comparisons, logic
    pub const VERYLOW: u64 = 3;
    /// Mul, div, mod
    pub const LOW: u64 = 5;
    /// Byte string concatenation
    pub const CONCAT: u64 = 6;
    /// Unconditional jump
    pub const JUMP: u64 = 8;
    /// Conditional jump
    pub const JUMPI: u64 = 10;
    /// Call into another method of the same module
    pub const CALL: u64 = 40;

    /// Read a context field
    pub const CONTEXT: u64 = 2;
    /// Read a balance
    pub const BALANCE: u64 = 100;
    /// Read a storage slot or test for it
    pub const STORAGE_GET: u64 = 200;
    /// Write a storage slot
    pub const STORAGE_SET: u64 = 5000;
    /// Move value out of the contract
    pub const TRANSFER: u64 = 9000;
    /// Append a log
    pub const LOG: u64 = 375;
    /// Keccak-256 digest
    pub const KECCAK: u64 = 30;
    /// Call another contract (callee blocks are charged separately)
    pub const CONTRACT_CALL: u64 = 700;

    /// Per 32-byte word copied onto the stack
    pub const COPY: u64 = 3;
    /// Per 32-byte word hashed
    pub const KECCAK_WORD: u64 = 6;
    /// Per byte of log data
    pub const LOG_DATA: u64 = 8;
    /// Per 32-byte word written to storage
    pub const STORAGE_WORD: u64 = 200;
}

fn words(length: usize) -> u64 {
    length.div_ceil(32) as u64
}

/// Cost of copying `length` bytes (dup, local and argument loads, concat)
pub fn copy_gas(length: usize) -> u64 {
    cost::COPY.saturating_mul(words(length))
}

/// Cost of hashing `length` bytes
pub fn keccak_gas(length: usize) -> u64 {
    cost::KECCAK_WORD.saturating_mul(words(length))
}

/// Cost of logging `length` bytes
pub fn log_gas(length: usize) -> u64 {
    cost::LOG_DATA.saturating_mul(length as u64)
}

/// Cost of storing a `length`-byte encoded value
pub fn storage_gas(length: usize) -> u64 {
    cost::STORAGE_WORD.saturating_mul(words(length))
}

/// Cost of one host call
pub fn host_cost(host: HostFunction) -> u64 {
    match host {
        HostFunction::StorageGet | HostFunction::StorageHas => cost::STORAGE_GET,
        HostFunction::StorageSet => cost::STORAGE_SET,
        HostFunction::BalanceSelf | HostFunction::BalanceOf => cost::BALANCE,
        HostFunction::Transfer => cost::TRANSFER,
        HostFunction::ContextCaller
        | HostFunction::ContextSelf
        | HostFunction::ContextValue
        | HostFunction::ContextBlockNumber
        | HostFunction::ContextDifficulty
        | HostFunction::ContextCoinbase
        | HostFunction::ContextGasPrice => cost::CONTEXT,
        HostFunction::LogEmit => cost::LOG,
        HostFunction::HashKeccak256 => cost::KECCAK,
        HostFunction::ContractCall => cost::CONTRACT_CALL,
    }
}

/// Static cost of an instruction. Host calls are priced through `imports`;
/// an unresolved import costs nothing because it can never run.
pub fn static_cost(instruction: &Instruction, imports: &[Import]) -> u64 {
    match instruction {
        Instruction::Return
        | Instruction::Stop
        | Instruction::Abort
        | Instruction::Gas(_)
        | Instruction::FloatAdd
        | Instruction::FloatMul
        | Instruction::FloatDiv => cost::ZERO,

        Instruction::Nop
        | Instruction::PushInt(_)
        | Instruction::PushBytes(_)
        | Instruction::PushAddress(_)
        | Instruction::Pop
        | Instruction::Dup
        | Instruction::Swap
        | Instruction::LoadArg(_)
        | Instruction::LoadLocal(_)
        | Instruction::StoreLocal(_) => cost::BASE,

        Instruction::Add
        | Instruction::Sub
        | Instruction::Lt
        | Instruction::Gt
        | Instruction::Eq
        | Instruction::IsZero
        | Instruction::And
        | Instruction::Or
        | Instruction::Not => cost::VERYLOW,

        Instruction::Mul | Instruction::Div | Instruction::Mod => cost::LOW,
        Instruction::Concat => cost::CONCAT,
        Instruction::Jump(_) => cost::JUMP,
        Instruction::JumpIf(_) => cost::JUMPI,
        Instruction::Call(_) => cost::CALL,

        Instruction::Host(index) => imports
            .get(usize::from(*index))
            .and_then(|import| import.host)
            .map(host_cost)
            .unwrap_or(cost::ZERO),
    }
}
