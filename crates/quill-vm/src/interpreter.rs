//! Method interpreter
//!
//! A tagged-instruction loop over a decoded method body. Static gas is debited
//! by the `Gas` instructions the injector wrote at the head of every basic
//! block. The loop adds a size-dependent charge before anything copies,
//! hashes, logs or stores a byte string.

use crate::context::{CallContext, ExecutionContext, TxContext};
use crate::error::{VmError, VmResult};
use crate::gas::GasMeter;
use crate::result::ExecutionResult;
use crate::stack::Stack;
use quill_crypto::keccak256;
use quill_module::gas::{copy_gas, keccak_gas, log_gas, storage_gas};
use quill_module::{HostFunction, Instruction, InstrumentedCode, ModuleDescription};
use quill_primitives::{Address, Amount, U256};
use quill_state::{StateReader, StateView};
use quill_types::{BlockContext, Log, Value};
use tracing::{debug, trace};

/// Upper bound on nested method frames within one execution
const MAX_FRAMES: usize = 256;

/// VM limits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Deepest contract-to-contract nesting allowed
    pub max_call_depth: usize,
    /// Values a single frame's stack may hold
    pub max_stack_depth: usize,
    /// Longest byte string a single value may hold
    pub max_value_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 8,
            max_stack_depth: 1024,
            max_value_size: 64 * 1024,
        }
    }
}

/// Contract virtual machine
#[derive(Clone, Debug, Default)]
pub struct Vm {
    config: VmConfig,
}

impl Vm {
    /// Create a VM
    pub fn new(config: VmConfig) -> Self {
        Self { config }
    }

    /// Limits in force
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Run the callable method named in `ctx.call.method`
    pub fn execute_method(
        &self,
        code: &InstrumentedCode,
        ctx: &ExecutionContext,
        view: &mut StateView<'_>,
    ) -> ExecutionResult {
        let module = code.module();
        let name = &ctx.call.method;
        let entry = match module.find_method(name) {
            Some((index, method)) if method.is_callable() => Ok(index),
            Some(_) => Err(VmError::MethodNotCallable(name.clone())),
            None => Err(VmError::MethodNotFound(name.clone())),
        };
        match entry {
            Ok(index) => self.run(module, ctx, index, view),
            Err(err) => {
                debug!(contract = %ctx.call.contract, error = %err, "Entry point rejected");
                ExecutionResult::revert(0, err.into())
            }
        }
    }

    /// Run the module's initializer. A module without one succeeds at no cost.
    pub fn execute_initializer(
        &self,
        code: &InstrumentedCode,
        ctx: &ExecutionContext,
        view: &mut StateView<'_>,
    ) -> ExecutionResult {
        match code.module().initializer {
            Some(index) => self.run(code.module(), ctx, index, view),
            None => ExecutionResult::success(0, None, Vec::new(), Vec::new()),
        }
    }

    fn run(
        &self,
        module: &ModuleDescription,
        ctx: &ExecutionContext,
        index: usize,
        view: &mut StateView<'_>,
    ) -> ExecutionResult {
        let mark = view.transfers().len();
        let mut machine = Machine {
            config: &self.config,
            block: &ctx.block,
            tx: &ctx.tx,
            meter: GasMeter::new(ctx.tx.gas_limit),
            logs: Vec::new(),
            frames: 0,
        };

        match machine.invoke(module, &ctx.call, 0, index, &ctx.call.parameters, view) {
            Ok(return_value) => {
                trace!(
                    contract = %ctx.call.contract,
                    gas = machine.meter.used(),
                    "Execution finished"
                );
                ExecutionResult::success(
                    machine.meter.used(),
                    return_value,
                    view.transfers()[mark..].to_vec(),
                    machine.logs,
                )
            }
            Err(err) => {
                debug!(
                    contract = %ctx.call.contract,
                    error = %err,
                    gas = machine.meter.used(),
                    "Execution reverted"
                );
                ExecutionResult::revert(machine.meter.used(), err.into())
            }
        }
    }
}

/// Mutable state shared by every frame of one execution
struct Machine<'a> {
    config: &'a VmConfig,
    block: &'a BlockContext,
    tx: &'a TxContext,
    meter: GasMeter,
    logs: Vec<Log>,
    frames: usize,
}

impl Machine<'_> {
    /// Run method `index` of `module` as contract `call.contract` at
    /// contract nesting `depth`
    fn invoke(
        &mut self,
        module: &ModuleDescription,
        call: &CallContext,
        depth: usize,
        index: usize,
        args: &[Value],
        view: &mut StateView<'_>,
    ) -> VmResult<Option<Value>> {
        if self.frames >= MAX_FRAMES {
            return Err(VmError::CallDepthExceeded(MAX_FRAMES));
        }
        self.frames += 1;
        let result = self.frame(module, call, depth, index, args, view);
        self.frames -= 1;
        result
    }

    fn frame(
        &mut self,
        module: &ModuleDescription,
        call: &CallContext,
        depth: usize,
        index: usize,
        args: &[Value],
        view: &mut StateView<'_>,
    ) -> VmResult<Option<Value>> {
        let method = module
            .methods
            .get(index)
            .ok_or_else(|| VmError::MethodNotFound(format!("#{}", index)))?;
        if args.len() != usize::from(method.params) {
            return Err(VmError::ArgumentCountMismatch {
                expected: usize::from(method.params),
                found: args.len(),
            });
        }

        let mut stack = Stack::new(self.config.max_stack_depth);
        let mut locals = vec![Value::zero(); usize::from(method.locals)];
        let code = &method.code;
        let mut pc = 0usize;

        while let Some(instruction) = code.get(pc) {
            pc += 1;
            match instruction {
                Instruction::Gas(amount) => self.meter.charge(*amount)?,
                Instruction::Nop => {}

                // Stack
                Instruction::PushInt(v) => stack.push(Value::Int(*v))?,
                Instruction::PushBytes(b) => stack.push(Value::Bytes(b.clone()))?,
                Instruction::PushAddress(a) => stack.push(Value::Address(*a))?,
                Instruction::Pop => {
                    stack.pop()?;
                }
                Instruction::Dup => {
                    self.meter.charge(copy_gas(byte_len(stack.peek()?)))?;
                    let top = stack.peek()?.clone();
                    stack.push(top)?;
                }
                Instruction::Swap => stack.swap()?,
                Instruction::LoadArg(i) => {
                    let arg = args
                        .get(usize::from(*i))
                        .ok_or(VmError::ArgumentOutOfRange(*i))?;
                    self.meter.charge(copy_gas(byte_len(arg)))?;
                    stack.push(arg.clone())?;
                }
                Instruction::LoadLocal(i) => {
                    let local = locals
                        .get(usize::from(*i))
                        .ok_or(VmError::LocalOutOfRange(*i))?;
                    self.meter.charge(copy_gas(byte_len(local)))?;
                    stack.push(local.clone())?;
                }
                Instruction::StoreLocal(i) => {
                    let value = stack.pop()?;
                    let slot = locals
                        .get_mut(usize::from(*i))
                        .ok_or(VmError::LocalOutOfRange(*i))?;
                    *slot = value;
                }

                // Arithmetic
                Instruction::Add => int_op(&mut stack, |a, b| {
                    a.checked_add(b).ok_or(VmError::ArithmeticOverflow)
                })?,
                Instruction::Sub => int_op(&mut stack, |a, b| {
                    a.checked_sub(b).ok_or(VmError::ArithmeticOverflow)
                })?,
                Instruction::Mul => int_op(&mut stack, |a, b| {
                    a.checked_mul(b).ok_or(VmError::ArithmeticOverflow)
                })?,
                Instruction::Div => {
                    int_op(&mut stack, |a, b| a.checked_div(b).ok_or(VmError::DivisionByZero))?
                }
                Instruction::Mod => {
                    int_op(&mut stack, |a, b| a.checked_rem(b).ok_or(VmError::DivisionByZero))?
                }

                // Comparison and logic
                Instruction::Lt => {
                    let b = stack.pop_int()?;
                    let a = stack.pop_int()?;
                    stack.push(Value::from_bool(a < b))?;
                }
                Instruction::Gt => {
                    let b = stack.pop_int()?;
                    let a = stack.pop_int()?;
                    stack.push(Value::from_bool(a > b))?;
                }
                Instruction::Eq => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(Value::from_bool(a == b))?;
                }
                Instruction::IsZero => {
                    let v = stack.pop()?;
                    stack.push(Value::from_bool(!v.is_truthy()))?;
                }
                Instruction::And => int_op(&mut stack, |a, b| Ok(a & b))?,
                Instruction::Or => int_op(&mut stack, |a, b| Ok(a | b))?,
                Instruction::Not => {
                    let v = stack.pop_int()?;
                    stack.push(Value::Int(!v))?;
                }
                Instruction::Concat => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    let length = a.key_len().saturating_add(b.key_len());
                    self.copy(length)?;
                    let mut a = a.key_bytes();
                    a.extend_from_slice(&b.key_bytes());
                    stack.push(Value::Bytes(a))?;
                }

                // Control flow
                Instruction::Jump(target) => pc = jump(code.len(), *target)?,
                Instruction::JumpIf(target) => {
                    let target = jump(code.len(), *target)?;
                    if stack.pop()?.is_truthy() {
                        pc = target;
                    }
                }
                Instruction::Call(callee) => {
                    let callee = usize::from(*callee);
                    let params = module
                        .methods
                        .get(callee)
                        .map(|m| usize::from(m.params))
                        .ok_or_else(|| VmError::MethodNotFound(format!("#{}", callee)))?;
                    let call_args = stack.pop_many(params)?;
                    let returned = self.invoke(module, call, depth, callee, &call_args, view)?;
                    stack.push(returned.unwrap_or_else(empty))?;
                }
                Instruction::Return => return Ok(Some(stack.pop()?)),
                Instruction::Stop => return Ok(None),
                Instruction::Abort => {
                    let payload = if stack.is_empty() {
                        Vec::new()
                    } else {
                        stack.pop()?.key_bytes()
                    };
                    return Err(VmError::Aborted(payload));
                }

                Instruction::Host(index) => {
                    let host = module
                        .host(*index)
                        .ok_or(VmError::UnresolvedImport(*index))?;
                    self.host(host, call, depth, &mut stack, view)?;
                }

                Instruction::FloatAdd | Instruction::FloatMul | Instruction::FloatDiv => {
                    return Err(VmError::ForbiddenInstruction(instruction.opcode()));
                }
            }
        }

        // falling off the end is an implicit stop
        Ok(None)
    }

    /// Charge for building a `length`-byte string, refusing it past the cap
    fn copy(&mut self, length: usize) -> VmResult<()> {
        if length > self.config.max_value_size {
            return Err(VmError::ValueTooLarge {
                size: length,
                limit: self.config.max_value_size,
            });
        }
        self.meter.charge(copy_gas(length))
    }

    fn host(
        &mut self,
        host: HostFunction,
        call: &CallContext,
        depth: usize,
        stack: &mut Stack,
        view: &mut StateView<'_>,
    ) -> VmResult<()> {
        let contract = call.contract;
        match host {
            HostFunction::StorageGet => {
                let key = stack.pop()?.key_bytes();
                let value = match view.get_storage(&contract, &key) {
                    Some(raw) => Value::decode(&raw).unwrap_or(Value::Bytes(raw)),
                    None => empty(),
                };
                stack.push(value)?;
            }
            HostFunction::StorageSet => {
                let value = stack.pop()?.encode();
                let key = stack.pop()?.key_bytes();
                self.meter
                    .charge(storage_gas(key.len().saturating_add(value.len())))?;
                view.set_storage(contract, &key, &value);
            }
            HostFunction::StorageHas => {
                let key = stack.pop()?.key_bytes();
                let present = view.get_storage(&contract, &key).is_some();
                stack.push(Value::from_bool(present))?;
            }
            HostFunction::BalanceSelf => {
                stack.push(Value::from(view.get_balance(&contract)))?;
            }
            HostFunction::BalanceOf => {
                let account = stack.pop_address()?;
                stack.push(Value::from(view.get_balance(&account)))?;
            }
            HostFunction::Transfer => {
                let amount = stack.pop_amount()?;
                let to = stack.pop_address()?;
                view.transfer(contract, to, amount)?;
            }
            HostFunction::ContextCaller => stack.push(Value::Address(call.caller))?,
            HostFunction::ContextSelf => stack.push(Value::Address(contract))?,
            HostFunction::ContextValue => stack.push(Value::from(call.value))?,
            HostFunction::ContextBlockNumber => stack.push(Value::from(self.block.number))?,
            HostFunction::ContextDifficulty => stack.push(Value::from(self.block.difficulty))?,
            HostFunction::ContextCoinbase => stack.push(Value::Address(self.block.coinbase))?,
            HostFunction::ContextGasPrice => stack.push(Value::from(self.tx.gas_price))?,
            HostFunction::LogEmit => {
                let data = stack.pop()?;
                self.meter.charge(log_gas(data.key_len()))?;
                let data = data.key_bytes();
                self.logs.push(Log::new(contract, data));
            }
            HostFunction::HashKeccak256 => {
                let data = stack.pop()?;
                self.meter.charge(keccak_gas(data.key_len()))?;
                let digest = keccak256(&data.key_bytes());
                stack.push(Value::Bytes(digest.as_bytes().to_vec()))?;
            }
            HostFunction::ContractCall => self.contract_call(call, depth, stack, view)?,
        }
        Ok(())
    }

    /// Stack in: target, value, method, args..., argc.
    /// Stack out: return value, success flag.
    fn contract_call(
        &mut self,
        call: &CallContext,
        depth: usize,
        stack: &mut Stack,
        view: &mut StateView<'_>,
    ) -> VmResult<()> {
        let argc = stack.pop_int()?;
        if argc > U256::from(stack.len()) {
            return Err(VmError::StackUnderflow);
        }
        let args = stack.pop_many(argc.as_usize())?;
        let method = match stack.pop()? {
            Value::Bytes(raw) => String::from_utf8_lossy(&raw).into_owned(),
            other => {
                return Err(VmError::TypeMismatch {
                    expected: "bytes",
                    found: other.type_name(),
                })
            }
        };
        let value = stack.pop_amount()?;
        let target = stack.pop_address()?;

        if depth >= self.config.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.config.max_call_depth));
        }

        let log_mark = self.logs.len();
        let outcome = {
            let mut child = view.start_tracking();
            let outcome =
                self.enter_contract(call.contract, target, method, value, args, depth + 1, &mut child);
            match outcome {
                Ok(returned) => child.commit().map(|()| returned).map_err(VmError::from),
                Err(err) => {
                    child.rollback();
                    Err(err)
                }
            }
        };

        match outcome {
            Ok(returned) => {
                stack.push(returned.unwrap_or_else(empty))?;
                stack.push(Value::from_bool(true))?;
            }
            Err(err @ (VmError::OutOfGas | VmError::CallDepthExceeded(_))) => return Err(err),
            Err(err) => {
                debug!(caller = %call.contract, callee = %target, error = %err, "Nested call failed");
                self.logs.truncate(log_mark);
                stack.push(empty())?;
                stack.push(Value::from_bool(false))?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_contract(
        &mut self,
        caller: Address,
        target: Address,
        method: String,
        value: Amount,
        args: Vec<Value>,
        depth: usize,
        view: &mut StateView<'_>,
    ) -> VmResult<Option<Value>> {
        view.transfer(caller, target, value)?;

        let stored = view.get_code(&target);
        if stored.is_empty() {
            return Err(VmError::ContractNotFound(target));
        }
        let callee = InstrumentedCode::from_stored(&stored)
            .map_err(|_| VmError::CalleeNotInstrumented(target))?;
        let index = match callee.module().find_method(&method) {
            Some((index, m)) if m.is_callable() => index,
            Some(_) => return Err(VmError::MethodNotCallable(method)),
            None => return Err(VmError::MethodNotFound(method)),
        };

        trace!(caller = %caller, callee = %target, method = %method, depth, "Entering contract");
        let nested = CallContext {
            contract: target,
            caller,
            value,
            method,
            parameters: args,
        };
        self.invoke(callee.module(), &nested, depth, index, &nested.parameters, view)
    }
}

fn empty() -> Value {
    Value::Bytes(Vec::new())
}

/// Bytes a clone of `value` allocates on the heap
fn byte_len(value: &Value) -> usize {
    value.as_bytes().map_or(0, <[u8]>::len)
}

fn jump(len: usize, target: u32) -> VmResult<usize> {
    let index = target as usize;
    if index >= len {
        return Err(VmError::InvalidJump(target));
    }
    Ok(index)
}

/// Pop b then a, push `f(a, b)`
fn int_op(stack: &mut Stack, f: impl FnOnce(U256, U256) -> VmResult<U256>) -> VmResult<()> {
    let b = stack.pop_int()?;
    let a = stack.pop_int()?;
    stack.push(Value::Int(f(a, b)?))
}
