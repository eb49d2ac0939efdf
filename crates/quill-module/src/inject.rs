//! Gas injection
//!
//! Splits every method into basic blocks and prepends each block with a
//! `Gas` instruction carrying the block's total static cost. A block is
//! entered only at its first instruction, so paying up front covers every
//! path. Jump targets are rewritten to land on the `Gas` of their block.

use crate::decode::decompile;
use crate::error::{InjectError, InjectResult};
use crate::gas::static_cost;
use crate::module::{Import, Method, ModuleDescription};
use crate::opcode::Instruction;
use tracing::debug;

/// Module carrying metering, with its encoded bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedCode {
    module: ModuleDescription,
    bytes: Vec<u8>,
}

impl InstrumentedCode {
    /// Accept stored code only if it already carries metering
    pub fn from_stored(bytes: &[u8]) -> InjectResult<Self> {
        let module = decompile(bytes)?;
        if !module.instrumented {
            return Err(InjectError::NotInstrumented);
        }
        Ok(Self {
            module,
            bytes: bytes.to_vec(),
        })
    }

    /// The rewritten module
    pub fn module(&self) -> &ModuleDescription {
        &self.module
    }

    /// Encoded bytes, suitable for `set_code`
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// What an injection pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionSummary {
    /// Basic blocks metered
    pub blocks: usize,
    /// Sum of all block costs
    pub total_static_cost: u64,
}

/// Gas injector
#[derive(Debug, Clone, Copy, Default)]
pub struct GasInjector;

impl GasInjector {
    /// Create an injector
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `module` with metering
    pub fn inject(&self, module: &ModuleDescription) -> InjectResult<InstrumentedCode> {
        if module.instrumented {
            return Err(InjectError::AlreadyInstrumented);
        }

        let mut summary = InjectionSummary::default();
        let mut methods = Vec::with_capacity(module.methods.len());
        for method in &module.methods {
            methods.push(instrument_method(method, &module.imports, &mut summary)?);
        }

        let mut rewritten = ModuleDescription {
            contract_type: module.contract_type.clone(),
            base_type: module.base_type.clone(),
            imports: module.imports.clone(),
            methods,
            initializer: module.initializer,
            instrumented: true,
            code_size: 0,
        };
        let bytes = rewritten.encode();
        rewritten.code_size = bytes.len();

        debug!(
            contract = %module.contract_type,
            blocks = summary.blocks,
            total_static_cost = summary.total_static_cost,
            size = bytes.len(),
            "Injected gas metering"
        );

        Ok(InstrumentedCode {
            module: rewritten,
            bytes,
        })
    }
}

/// Block leaders: entry, jump targets, and whatever follows a terminator
fn leaders(method: &Method) -> InjectResult<Vec<bool>> {
    let len = method.code.len();
    let mut leader = vec![false; len];
    if len == 0 {
        return Ok(leader);
    }
    leader[0] = true;

    for (at, instruction) in method.code.iter().enumerate() {
        if let Some(target) = instruction.jump_target() {
            let target_index = target as usize;
            if target_index >= len {
                return Err(InjectError::InvalidJumpTarget {
                    method: method.name.clone(),
                    target,
                });
            }
            leader[target_index] = true;
        }
        if instruction.is_terminator() && at + 1 < len {
            leader[at + 1] = true;
        }
    }
    Ok(leader)
}

fn instrument_method(
    method: &Method,
    imports: &[Import],
    summary: &mut InjectionSummary,
) -> InjectResult<Method> {
    let leader = leaders(method)?;

    // new index of each block's Gas instruction, keyed by old leader index
    let mut gas_at = vec![0u32; method.code.len()];
    let mut next = 0usize;
    for (old, is_leader) in leader.iter().enumerate() {
        if *is_leader {
            gas_at[old] = u32::try_from(next)
                .map_err(|_| InjectError::MethodTooLarge(method.name.clone()))?;
            next += 1;
        }
        next += 1;
    }
    if u32::try_from(next).is_err() {
        return Err(InjectError::MethodTooLarge(method.name.clone()));
    }

    let mut code = Vec::with_capacity(next);
    for old in 0..method.code.len() {
        if leader[old] {
            let end = leader[old + 1..]
                .iter()
                .position(|l| *l)
                .map(|offset| old + 1 + offset)
                .unwrap_or(method.code.len());
            let cost: u64 = method.code[old..end]
                .iter()
                .map(|i| static_cost(i, imports))
                .fold(0u64, u64::saturating_add);

            code.push(Instruction::Gas(cost));
            summary.blocks += 1;
            summary.total_static_cost = summary.total_static_cost.saturating_add(cost);
        }
        let rewritten = match &method.code[old] {
            Instruction::Jump(target) => Instruction::Jump(gas_at[*target as usize]),
            Instruction::JumpIf(target) => Instruction::JumpIf(gas_at[*target as usize]),
            other => other.clone(),
        };
        code.push(rewritten);
    }

    Ok(Method {
        name: method.name.clone(),
        attributes: method.attributes,
        params: method.params,
        locals: method.locals,
        code,
    })
}
