//! Transaction executor

use crate::condenser::Condenser;
use crate::config::ExecutorConfig;
use quill_metrics::Metrics;
use quill_module::{decompile, GasInjector, InjectError, InstrumentedCode, Validator};
use quill_primitives::{Address, H256};
use quill_state::{StateError, StateReader, StateView, Tracked};
use quill_types::{BlockContext, ContractTransaction, ContractTxKind};
use quill_vm::{
    CallContext, ExecutionContext, ExecutionResult, FailureReason, TxContext, Vm, VmError,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Steps of one transaction's processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Nothing done yet
    Start,
    /// Tracked view opened
    TrackingOpen,
    /// Code parsed
    Decompiled,
    /// Module accepted by the validator
    Validated,
    /// Metering in place
    Injected,
    /// Method ran to completion
    Executed,
    /// View folded into its parent
    Committed,
    /// View discarded
    RolledBack,
    /// Result handed back
    Done,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Records transitions for one transaction
struct Progress {
    carrier: H256,
    state: ExecutorState,
}

impl Progress {
    fn new(carrier: H256) -> Self {
        Self {
            carrier,
            state: ExecutorState::Start,
        }
    }

    fn advance(&mut self, next: ExecutorState) {
        trace!(tx = %self.carrier, from = %self.state, to = %next, "Executor transition");
        self.state = next;
    }
}

/// Executes contract transactions against tracked state
pub struct TransactionExecutor {
    config: ExecutorConfig,
    validator: Validator,
    injector: GasInjector,
    vm: Vm,
    metrics: Option<Arc<Metrics>>,
}

impl TransactionExecutor {
    /// Create an executor
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            validator: config.validator(),
            injector: GasInjector::new(),
            vm: Vm::new(config.vm_config()),
            metrics: None,
            config,
        }
    }

    /// Report into `metrics` (ignored when metrics are disabled in config)
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        if self.config.metrics_enabled {
            self.metrics = Some(metrics);
        }
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `tx` in a fresh tracked view over `state`.
    ///
    /// The view is committed on success and rolled back on every failure;
    /// `state` is untouched unless the result reports success.
    pub fn execute<S: Tracked>(
        &self,
        state: &mut S,
        tx: &ContractTransaction,
        block: &BlockContext,
    ) -> ExecutionResult {
        let mut progress = Progress::new(tx.carrier_hash);
        self.count(if tx.is_create() {
            "executor.create"
        } else {
            "executor.call"
        });

        let mut view = state.start_tracking();
        progress.advance(ExecutorState::TrackingOpen);

        let result = match &tx.kind {
            ContractTxKind::Create { code, .. } => {
                self.create(&mut view, tx, code, block, &mut progress)
            }
            ContractTxKind::Call { to, method, .. } => {
                self.call(&mut view, tx, *to, method, block, &mut progress)
            }
        };

        let result = if result.success {
            match view.commit() {
                Ok(()) => {
                    progress.advance(ExecutorState::Committed);
                    result
                }
                Err(err) => {
                    warn!(tx = %tx.carrier_hash, error = %err, "Commit rejected");
                    progress.advance(ExecutorState::RolledBack);
                    ExecutionResult::revert(result.gas_consumed, VmError::from(err).into())
                }
            }
        } else {
            view.rollback();
            progress.advance(ExecutorState::RolledBack);
            result
        };
        progress.advance(ExecutorState::Done);

        self.record(&result);
        result
    }

    fn create(
        &self,
        view: &mut StateView<'_>,
        tx: &ContractTransaction,
        code: &[u8],
        block: &BlockContext,
        progress: &mut Progress,
    ) -> ExecutionResult {
        let address = tx.new_contract_address();
        if let Err(err) = view.create_account(address) {
            return terminal(tx, VmError::from(err).into());
        }

        let module = match decompile(code) {
            Ok(module) => module,
            Err(err) => return terminal(tx, FailureReason::MalformedCode(err.to_string())),
        };
        progress.advance(ExecutorState::Decompiled);

        let verdict = self.validator.validate(&module);
        if !verdict.is_valid() {
            return terminal(tx, FailureReason::ValidationRejected(verdict.reasons));
        }
        progress.advance(ExecutorState::Validated);

        let instrumented = match self.injector.inject(&module) {
            Ok(instrumented) => instrumented,
            Err(err) => return terminal(tx, FailureReason::MalformedCode(err.to_string())),
        };
        progress.advance(ExecutorState::Injected);

        if let Err(err) = view.transfer(tx.sender, address, tx.value) {
            return unfunded(tx, err);
        }

        let ctx = self.context(tx, address, String::new(), block);
        let result = self.vm.execute_initializer(&instrumented, &ctx, view);
        if !result.success {
            return result;
        }
        progress.advance(ExecutorState::Executed);

        if let Err(err) = view.set_code(address, instrumented.into_bytes()) {
            return ExecutionResult::failure(result.gas_consumed, VmError::from(err).into());
        }
        info!(tx = %tx.carrier_hash, contract = %address, gas = result.gas_consumed, "Contract deployed");

        self.settle(view, tx, result)
    }

    fn call(
        &self,
        view: &mut StateView<'_>,
        tx: &ContractTransaction,
        to: Address,
        method: &str,
        block: &BlockContext,
        progress: &mut Progress,
    ) -> ExecutionResult {
        let stored = view.get_code(&to);
        if stored.is_empty() {
            return terminal(tx, FailureReason::ContractNotFound(to));
        }

        let instrumented = match InstrumentedCode::from_stored(&stored) {
            Ok(code) => {
                progress.advance(ExecutorState::Decompiled);
                code
            }
            Err(InjectError::NotInstrumented) => match self.reinstrument(&stored, progress) {
                Ok(code) => code,
                Err(reason) => return terminal(tx, reason),
            },
            Err(err) => return terminal(tx, FailureReason::MalformedCode(err.to_string())),
        };

        if let Err(err) = view.transfer(tx.sender, to, tx.value) {
            return unfunded(tx, err);
        }

        let ctx = self.context(tx, to, method.to_string(), block);
        let result = self.vm.execute_method(&instrumented, &ctx, view);
        if !result.success {
            return result;
        }
        progress.advance(ExecutorState::Executed);

        self.settle(view, tx, result)
    }

    /// Stored code without metering is decoded and metered again
    fn reinstrument(
        &self,
        stored: &[u8],
        progress: &mut Progress,
    ) -> Result<InstrumentedCode, FailureReason> {
        let module =
            decompile(stored).map_err(|err| FailureReason::MalformedCode(err.to_string()))?;
        progress.advance(ExecutorState::Decompiled);
        let code = self
            .injector
            .inject(&module)
            .map_err(|err| FailureReason::MalformedCode(err.to_string()))?;
        progress.advance(ExecutorState::Injected);
        Ok(code)
    }

    fn context(
        &self,
        tx: &ContractTransaction,
        contract: Address,
        method: String,
        block: &BlockContext,
    ) -> ExecutionContext {
        ExecutionContext::new(
            block.clone(),
            CallContext {
                contract,
                caller: tx.sender,
                value: tx.value,
                method,
                parameters: tx.parameters().to_vec(),
            },
            TxContext {
                gas_limit: tx.gas_limit,
                gas_price: tx.gas_price,
            },
        )
    }

    /// Attach every transfer made in `view` and its settlement to `result`
    fn settle(
        &self,
        view: &StateView<'_>,
        tx: &ContractTransaction,
        mut result: ExecutionResult,
    ) -> ExecutionResult {
        result.transfers = view.transfers().to_vec();
        if result.transfers.is_empty() {
            return result;
        }

        match Condenser::condense(&result.transfers, tx.carrier_hash, view.opening_balances()) {
            Ok(settlement) => {
                debug!(
                    tx = %tx.carrier_hash,
                    settlement = %settlement.hash(),
                    "Settlement transaction built"
                );
                result.transactions.push(settlement);
                result
            }
            Err(err) => {
                warn!(tx = %tx.carrier_hash, error = %err, "Settlement failed");
                ExecutionResult::revert(
                    result.gas_consumed,
                    FailureReason::SettlementFailed(err.to_string()),
                )
            }
        }
    }

    fn count(&self, name: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.incr(name);
        }
    }

    fn record(&self, result: &ExecutionResult) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.histogram("executor.gas_consumed", result.gas_consumed);
        if result.success {
            metrics.incr("executor.success");
            metrics.counter("executor.settlements", result.transactions.len() as u64);
            return;
        }
        match &result.failure {
            Some(FailureReason::OutOfGas) => metrics.incr("executor.out_of_gas"),
            Some(FailureReason::MalformedCode(_)) => metrics.incr("executor.malformed_code"),
            Some(FailureReason::ValidationRejected(_)) => {
                metrics.incr("executor.validation_rejected")
            }
            _ => {}
        }
        if result.revert {
            metrics.incr("executor.revert");
        }
    }
}

/// Failure that ran no code: the whole gas limit is consumed
fn terminal(tx: &ContractTransaction, reason: FailureReason) -> ExecutionResult {
    warn!(tx = %tx.carrier_hash, reason = ?reason, "Transaction rejected");
    ExecutionResult::failure(tx.gas_limit, reason)
}

/// The attached value could not be paid. Nothing ran, but the limit is
/// still charged.
fn unfunded(tx: &ContractTransaction, err: StateError) -> ExecutionResult {
    warn!(tx = %tx.carrier_hash, error = %err, "Transaction value not covered");
    ExecutionResult::revert(tx.gas_limit, VmError::from(err).into())
}
