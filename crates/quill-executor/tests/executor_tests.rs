//! End-to-end executor scenarios
//!
//! Test categories:
//! 1. Create path: deployment, terminal rejections, redeployment
//! 2. Call path: storage, transfers, settlement, reverts
//! 3. Rollback: repository unchanged after any failure
//! 4. Determinism and gas monotonicity
//! 5. Block-level views and signed transactions

use proptest::prelude::*;
use quill_crypto::{public_key_to_address, sign, PrivateKey};
use quill_executor::{ExecutorConfig, TransactionExecutor};
use quill_module::{Instruction, MethodBuilder, ModuleBuilder, ValidationReason};
use quill_primitives::{Address, Amount, H256};
use quill_state::{StateError, StateReader, StateRepository};
use quill_types::{BlockContext, ContractTransaction, TransferRecord, TxIn, TxOut, Value};
use quill_vm::{FailureReason, RevertReason};
use tracing_subscriber::EnvFilter;

// =============================================================================
// Test Helpers
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sender() -> Address {
    Address::from_hex("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap()
}

fn bob() -> Address {
    Address::from_hex("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap()
}

fn carol() -> Address {
    Address::from_hex("0xcccccccccccccccccccccccccccccccccccccccc").unwrap()
}

fn carrier(n: u8) -> H256 {
    H256::from_bytes([n; 32])
}

fn block() -> BlockContext {
    BlockContext::new(42, 1_000, Address::from_bytes([0xCB; 20]))
}

fn executor() -> TransactionExecutor {
    TransactionExecutor::new(ExecutorConfig::default())
}

/// Wallet contract: the initializer records "owner"; `pay(to, amount)`
/// transfers out of the contract balance; `payout` pays bob 5 and carol 3.
fn wallet_code() -> Vec<u8> {
    ModuleBuilder::contract("Wallet")
        .import("storage.set")
        .import("storage.get")
        .import("context.caller")
        .import("transfer")
        .import("balance.self")
        .method(
            MethodBuilder::new("init")
                .initializer()
                .push_bytes(b"owner")
                .host(2)
                .host(0)
                .stop(),
        )
        .method(MethodBuilder::new("owner").push_bytes(b"owner").host(1).ret())
        .method(
            MethodBuilder::new("pay")
                .params(2)
                .load_arg(0)
                .load_arg(1)
                .host(3)
                .stop(),
        )
        .method(
            MethodBuilder::new("payout")
                .push_address(bob())
                .push_int(5)
                .host(3)
                .push_address(carol())
                .push_int(3)
                .host(3)
                .stop(),
        )
        .method(MethodBuilder::new("balance").host(4).ret())
        .encode()
}

/// Deploys the wallet and funds it with `funds` taken from the sender
fn deployed_wallet(funds: Amount) -> (StateRepository, Address) {
    let mut repo = StateRepository::with_balances([(sender(), 1_000)]);
    let tx = ContractTransaction::create(carrier(1), wallet_code(), 100_000)
        .with_sender(sender())
        .with_value(funds);
    let result = executor().execute(&mut repo, &tx, &block());
    assert!(result.success, "{:?}", result.failure);
    (repo, tx.new_contract_address())
}

fn call(to: Address, method: &str) -> ContractTransaction {
    ContractTransaction::call(carrier(2), to, method, 100_000).with_sender(sender())
}

// =============================================================================
// 1. Create path
// =============================================================================

mod create_path {
    use super::*;

    #[test]
    fn test_deploy_sets_code_and_storage() {
        init_tracing();
        let mut repo = StateRepository::new();
        let tx = ContractTransaction::create(carrier(1), wallet_code(), 100_000)
            .with_sender(sender());

        let result = executor().execute(&mut repo, &tx, &block());
        assert!(result.success);
        assert!(!result.revert);
        assert!(result.gas_consumed > 0 && result.gas_consumed < 100_000);
        assert!(result.transactions.is_empty());

        let address = tx.new_contract_address();
        assert!(!repo.get_code(&address).is_empty());
        assert_eq!(
            repo.get_storage(&address, b"owner"),
            Some(Value::from(sender()).encode())
        );
    }

    #[test]
    fn test_code_is_set_only_once() {
        let (repo, address) = deployed_wallet(0);
        let mut view = repo.start_tracking();
        assert_eq!(
            view.set_code(address, vec![1, 2, 3]),
            Err(StateError::CodeAlreadySet(address))
        );
    }

    #[test]
    fn test_redeploy_same_transaction_rejected() {
        let (mut repo, address) = deployed_wallet(0);
        let root = repo.state_root();
        let tx = ContractTransaction::create(carrier(1), wallet_code(), 100_000)
            .with_sender(sender());

        let result = executor().execute(&mut repo, &tx, &block());
        assert_eq!(result.failure, Some(FailureReason::CodeAlreadySet(address)));
        assert_eq!(result.gas_consumed, 100_000);
        assert_eq!(repo.state_root(), root);
    }

    #[test]
    fn test_malformed_code_is_terminal() {
        let mut repo = StateRepository::with_balances([(sender(), 10)]);
        let root = repo.state_root();
        let tx = ContractTransaction::create(carrier(3), b"QMOD\x01".to_vec(), 50_000);

        let result = executor().execute(&mut repo, &tx, &block());
        assert!(!result.success);
        assert!(!result.revert);
        assert!(matches!(result.failure, Some(FailureReason::MalformedCode(_))));
        assert_eq!(result.gas_consumed, 50_000);
        assert_eq!(repo.state_root(), root);
        assert!(!repo.account_exists(&tx.new_contract_address()));
    }

    #[test]
    fn test_validation_rejection_carries_codes() {
        let code = ModuleBuilder::contract("Dice")
            .import("random.next")
            .method(
                MethodBuilder::new("roll")
                    .push_int(1)
                    .push_int(2)
                    .op(Instruction::FloatDiv)
                    .ret(),
            )
            .encode();
        let mut repo = StateRepository::new();
        let tx = ContractTransaction::create(carrier(4), code, 50_000);

        let result = executor().execute(&mut repo, &tx, &block());
        let Some(FailureReason::ValidationRejected(reasons)) = result.failure else {
            panic!("expected rejection, got {:?}", result.failure);
        };
        let codes: Vec<u16> = reasons.iter().map(ValidationReason::code).collect();
        assert!(codes.contains(&3), "{:?}", codes);
        assert!(codes.contains(&5), "{:?}", codes);
        assert_eq!(result.gas_consumed, 50_000);
        assert_eq!(repo.account_count(), 0);
    }

    #[test]
    fn test_initializer_abort_rolls_back() {
        let code = ModuleBuilder::contract("Broken")
            .import("storage.set")
            .method(
                MethodBuilder::new("init")
                    .initializer()
                    .push_bytes(b"k")
                    .push_int(1)
                    .host(0)
                    .push_bytes(b"refused")
                    .abort(),
            )
            .encode();
        let mut repo = StateRepository::with_balances([(sender(), 100)]);
        let root = repo.state_root();
        let tx = ContractTransaction::create(carrier(5), code, 50_000)
            .with_sender(sender())
            .with_value(10);

        let result = executor().execute(&mut repo, &tx, &block());
        assert!(result.revert);
        assert_eq!(
            result.failure,
            Some(FailureReason::Revert(RevertReason::Aborted(b"refused".to_vec())))
        );
        assert!(result.gas_consumed < 50_000);
        assert_eq!(repo.state_root(), root);
        assert_eq!(repo.get_balance(&sender()), 100);
    }

    #[test]
    fn test_unpaid_create_value_charges_the_limit() {
        let mut repo = StateRepository::with_balances([(sender(), 10)]);
        let tx = ContractTransaction::create(carrier(3), wallet_code(), 100_000)
            .with_sender(sender())
            .with_value(11);

        let result = executor().execute(&mut repo, &tx, &block());
        assert!(result.revert);
        assert_eq!(result.gas_consumed, 100_000);
        assert_eq!(
            result.failure,
            Some(FailureReason::InsufficientFunds {
                account: sender(),
                required: 11,
                available: 10
            })
        );
        assert!(!repo.account_exists(&tx.new_contract_address()));
    }

    #[test]
    fn test_create_value_is_settled() {
        let (repo, address) = deployed_wallet(40);
        assert_eq!(repo.get_balance(&address), 40);
        assert_eq!(repo.get_balance(&sender()), 960);
    }
}

// =============================================================================
// 2. Call path
// =============================================================================

mod call_path {
    use super::*;

    #[test]
    fn test_read_storage() {
        let (mut repo, address) = deployed_wallet(0);
        let result = executor().execute(&mut repo, &call(address, "owner"), &block());
        assert!(result.success);
        assert_eq!(result.return_value, Some(Value::from(sender())));
    }

    #[test]
    fn test_payout_is_condensed() {
        init_tracing();
        let (mut repo, address) = deployed_wallet(8);
        let result = executor().execute(&mut repo, &call(address, "payout"), &block());
        assert!(result.success, "{:?}", result.failure);

        assert_eq!(
            result.transfers,
            vec![
                TransferRecord::new(address, bob(), 5),
                TransferRecord::new(address, carol(), 3),
            ]
        );
        assert_eq!(result.transactions.len(), 1);
        let settlement = &result.transactions[0];
        assert_eq!(settlement.origin, carrier(2));
        assert_eq!(settlement.inputs, vec![TxIn { source: address, value: 8 }]);
        assert_eq!(
            settlement.outputs,
            vec![
                TxOut { destination: bob(), value: 5 },
                TxOut { destination: carol(), value: 3 },
            ]
        );
        assert_eq!(repo.get_balance(&address), 0);
        assert_eq!(repo.get_balance(&bob()), 5);
    }

    #[test]
    fn test_parameters_are_bound() {
        let (mut repo, address) = deployed_wallet(10);
        let tx = call(address, "pay").with_parameters(vec![Value::from(bob()), Value::from(4u64)]);
        let result = executor().execute(&mut repo, &tx, &block());
        assert!(result.success);
        assert_eq!(repo.get_balance(&bob()), 4);
    }

    #[test]
    fn test_overdraft_reverts_with_insufficient_funds() {
        let (mut repo, address) = deployed_wallet(10);
        let root = repo.state_root();
        let tx = call(address, "pay").with_parameters(vec![Value::from(bob()), Value::from(11u64)]);

        let result = executor().execute(&mut repo, &tx, &block());
        assert!(result.revert);
        assert_eq!(
            result.failure,
            Some(FailureReason::InsufficientFunds {
                account: address,
                required: 11,
                available: 10
            })
        );
        assert!(result.transactions.is_empty());
        assert_eq!(repo.state_root(), root);
    }

    #[test]
    fn test_call_value_is_credited_before_running() {
        let (mut repo, address) = deployed_wallet(0);
        let tx = call(address, "balance").with_value(25);
        let result = executor().execute(&mut repo, &tx, &block());

        assert_eq!(result.return_value, Some(Value::from(25u64)));
        assert_eq!(result.transfers, vec![TransferRecord::new(sender(), address, 25)]);
        assert_eq!(result.transactions[0].input_from(&sender()), Some(25));
    }

    #[test]
    fn test_unpaid_call_value_charges_the_limit() {
        let (mut repo, address) = deployed_wallet(0);
        let root = repo.state_root();
        let tx = call(address, "balance").with_value(5_000);

        let result = executor().execute(&mut repo, &tx, &block());
        assert!(result.revert);
        assert_eq!(result.gas_consumed, 100_000);
        assert!(matches!(
            result.failure,
            Some(FailureReason::InsufficientFunds { required: 5_000, .. })
        ));
        assert!(result.transfers.is_empty());
        assert_eq!(repo.state_root(), root);
    }

    #[test]
    fn test_unknown_contract() {
        let mut repo = StateRepository::new();
        let result = executor().execute(&mut repo, &call(bob(), "owner"), &block());
        assert_eq!(result.failure, Some(FailureReason::ContractNotFound(bob())));
        assert_eq!(result.gas_consumed, 100_000);
    }

    #[test]
    fn test_unknown_method_reverts() {
        let (mut repo, address) = deployed_wallet(0);
        let result = executor().execute(&mut repo, &call(address, "steal"), &block());
        assert!(result.revert);
        assert_eq!(
            result.failure,
            Some(FailureReason::Revert(RevertReason::Fault(
                "method not found: steal".into()
            )))
        );
    }

    #[test]
    fn test_stored_code_without_metering_is_reinstrumented() {
        let repo = StateRepository::new();
        let address = Address::from_bytes([0x11; 20]);
        let raw = ModuleBuilder::contract("Plain")
            .method(MethodBuilder::new("answer").push_int(42).ret())
            .encode();
        let mut view = repo.start_tracking();
        view.set_code(address, raw).unwrap();
        view.commit().unwrap();

        let mut repo = repo;
        let result = executor().execute(&mut repo, &call(address, "answer"), &block());
        assert!(result.success);
        assert_eq!(result.return_value, Some(Value::from(42u64)));
        assert!(result.gas_consumed > 0);
    }

    #[test]
    fn test_garbage_stored_code_is_malformed() {
        let repo = StateRepository::new();
        let address = Address::from_bytes([0x12; 20]);
        let mut view = repo.start_tracking();
        view.set_code(address, b"garbage".to_vec()).unwrap();
        view.commit().unwrap();

        let mut repo = repo;
        let result = executor().execute(&mut repo, &call(address, "x"), &block());
        assert!(matches!(result.failure, Some(FailureReason::MalformedCode(_))));
    }
}

// =============================================================================
// 3. Out of gas and rollback
// =============================================================================

mod rollback {
    use super::*;

    fn spinner() -> Vec<u8> {
        ModuleBuilder::contract("Spinner")
            .import("storage.set")
            .method(
                MethodBuilder::new("spin")
                    .push_bytes(b"k")
                    .push_int(1)
                    .host(0)
                    .op(Instruction::Nop)
                    .op(Instruction::Jump(3)),
            )
            .encode()
    }

    #[test]
    fn test_out_of_gas_consumes_limit_and_rolls_back() {
        let mut repo = StateRepository::with_balances([(sender(), 1_000)]);
        let tx = ContractTransaction::create(carrier(1), spinner(), 100_000).with_sender(sender());
        assert!(executor().execute(&mut repo, &tx, &block()).success);
        let address = tx.new_contract_address();
        let root = repo.state_root();

        let spin = call(address, "spin").with_value(7);
        let result = executor().execute(&mut repo, &spin, &block());
        assert!(result.revert);
        assert_eq!(result.failure, Some(FailureReason::OutOfGas));
        assert_eq!(result.gas_consumed, 100_000);
        assert_eq!(result.fee(3), 300_000);
        assert_eq!(repo.state_root(), root);
        assert_eq!(repo.get_storage(&address, b"k"), None);
    }
}

// =============================================================================
// 4. Determinism and gas monotonicity
// =============================================================================

mod determinism {
    use super::*;

    #[test]
    fn test_identical_inputs_identical_results() {
        let run = || {
            let (mut repo, address) = deployed_wallet(8);
            let result = executor().execute(&mut repo, &call(address, "payout"), &block());
            (result, repo.state_root())
        };
        assert_eq!(run(), run());
    }

    fn payout_gas() -> u64 {
        let (mut repo, address) = deployed_wallet(8);
        executor()
            .execute(&mut repo, &call(address, "payout"), &block())
            .gas_consumed
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_gas_limit_monotonic(delta in 0u64..50_000) {
            let needed = payout_gas();

            let (mut repo, address) = deployed_wallet(8);
            let mut tx = call(address, "payout");
            tx.gas_limit = needed + delta;
            let above = executor().execute(&mut repo, &tx, &block());
            prop_assert!(above.success);
            prop_assert_eq!(above.gas_consumed, needed);

            let (mut repo, address) = deployed_wallet(8);
            let mut tx = call(address, "payout");
            tx.gas_limit = needed.saturating_sub(1 + delta % needed.max(1));
            let below = executor().execute(&mut repo, &tx, &block());
            prop_assert_eq!(below.failure, Some(FailureReason::OutOfGas));
        }
    }
}

// =============================================================================
// 5. Block-level views and signed transactions
// =============================================================================

mod block_view {
    use super::*;

    #[test]
    fn test_transactions_inside_block_view() {
        let (repo, address) = deployed_wallet(8);
        let root = repo.state_root();
        let exec = executor();

        let mut block_view = repo.start_tracking();
        let first = exec.execute(&mut block_view, &call(address, "payout"), &block());
        assert!(first.success);
        // second payout overdraws the now-empty wallet
        let second = exec.execute(&mut block_view, &call(address, "payout"), &block());
        assert!(second.revert);
        assert_eq!(block_view.get_balance(&bob()), 5);
        assert_eq!(repo.state_root(), root);

        block_view.rollback();
        assert_eq!(repo.state_root(), root);
        assert_eq!(repo.get_balance(&bob()), 0);
    }

    #[test]
    fn test_signed_sender_is_caller() {
        let key = PrivateKey::from_slice(&[0x42; 32]).unwrap();
        let signer = public_key_to_address(key.verifying_key());

        let unsigned = ContractTransaction::create(carrier(9), wallet_code(), 100_000);
        let signature = sign(&unsigned.signing_hash(), &key).unwrap();
        let tx = ContractTransaction::from_signed(unsigned, &signature).unwrap();
        assert_eq!(tx.sender, signer);

        let mut repo = StateRepository::new();
        assert!(executor().execute(&mut repo, &tx, &block()).success);
        let owner = executor().execute(
            &mut repo,
            &ContractTransaction::call(carrier(10), tx.new_contract_address(), "owner", 100_000),
            &block(),
        );
        assert_eq!(owner.return_value, Some(Value::from(signer)));
    }
}
