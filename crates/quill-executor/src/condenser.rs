//! Transfer condenser
//!
//! Nets the transfers a contract made into one settlement transaction.
//! Transfers are replayed in recorded order against running balances, so
//! an account that is briefly short in the middle of the list is caught
//! even if it ends up net positive.

use crate::error::{CondenseError, CondenseResult};
use quill_primitives::{Address, Amount, H256};
use quill_types::{Transaction, TransferRecord, TxIn, TxOut};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Default)]
struct Movement {
    running: Amount,
    credited: Amount,
    debited: Amount,
}

struct Ledger<'a> {
    opening: &'a BTreeMap<Address, Amount>,
    /// Accounts in first-seen order
    seen: Vec<Address>,
    movements: HashMap<Address, Movement>,
}

impl Ledger<'_> {
    fn account(&mut self, account: Address) -> &mut Movement {
        let opening = self.opening;
        let seen = &mut self.seen;
        self.movements.entry(account).or_insert_with(|| {
            seen.push(account);
            Movement {
                running: opening.get(&account).copied().unwrap_or(0),
                ..Movement::default()
            }
        })
    }
}

/// Transfer condenser
#[derive(Debug, Clone, Copy, Default)]
pub struct Condenser;

impl Condenser {
    /// Net `transfers` into a settlement for `origin`.
    ///
    /// `opening_balances` seeds each account's running balance; accounts
    /// missing from it start at zero.
    pub fn condense(
        transfers: &[TransferRecord],
        origin: H256,
        opening_balances: &BTreeMap<Address, Amount>,
    ) -> CondenseResult<Transaction> {
        let mut ledger = Ledger {
            opening: opening_balances,
            seen: Vec::new(),
            movements: HashMap::new(),
        };

        for (index, record) in transfers.iter().enumerate() {
            let payer = ledger.account(record.from);
            if payer.running < record.amount {
                return Err(CondenseError::Overdraft {
                    index,
                    account: record.from,
                    required: record.amount,
                    available: payer.running,
                });
            }
            payer.running -= record.amount;
            payer.debited = payer
                .debited
                .checked_add(record.amount)
                .ok_or(CondenseError::Overflow(record.from))?;

            let payee = ledger.account(record.to);
            payee.running = payee
                .running
                .checked_add(record.amount)
                .ok_or(CondenseError::Overflow(record.to))?;
            payee.credited = payee
                .credited
                .checked_add(record.amount)
                .ok_or(CondenseError::Overflow(record.to))?;
        }

        let mut settlement = Transaction::new(origin);
        for account in &ledger.seen {
            let Some(movement) = ledger.movements.get(account) else {
                continue;
            };
            if movement.debited > movement.credited {
                settlement.inputs.push(TxIn {
                    source: *account,
                    value: movement.debited - movement.credited,
                });
            } else if movement.credited > movement.debited {
                settlement.outputs.push(TxOut {
                    destination: *account,
                    value: movement.credited - movement.debited,
                });
            }
        }

        debug!(
            origin = %origin,
            transfers = transfers.len(),
            inputs = settlement.inputs.len(),
            outputs = settlement.outputs.len(),
            "Condensed transfers"
        );
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn balances(entries: &[(u8, Amount)]) -> BTreeMap<Address, Amount> {
        entries.iter().map(|(b, v)| (addr(*b), *v)).collect()
    }

    fn origin() -> H256 {
        H256::from_bytes([0x77; 32])
    }

    // ==================== Netting ====================

    #[test]
    fn test_two_payments_from_one_account() {
        let transfers = vec![
            TransferRecord::new(addr(0xA), addr(0xB), 5),
            TransferRecord::new(addr(0xA), addr(0xC), 3),
        ];
        let tx = Condenser::condense(&transfers, origin(), &balances(&[(0xA, 8)])).unwrap();

        assert_eq!(tx.origin, origin());
        assert_eq!(tx.inputs, vec![TxIn { source: addr(0xA), value: 8 }]);
        assert_eq!(
            tx.outputs,
            vec![
                TxOut { destination: addr(0xB), value: 5 },
                TxOut { destination: addr(0xC), value: 3 },
            ]
        );
    }

    #[test]
    fn test_round_trip_nets_to_nothing() {
        let transfers = vec![
            TransferRecord::new(addr(1), addr(2), 4),
            TransferRecord::new(addr(2), addr(1), 4),
        ];
        let tx = Condenser::condense(&transfers, origin(), &balances(&[(1, 4)])).unwrap();
        assert!(tx.inputs.is_empty());
        assert!(tx.outputs.is_empty());
    }

    #[test]
    fn test_pass_through_account_omitted() {
        let transfers = vec![
            TransferRecord::new(addr(1), addr(2), 6),
            TransferRecord::new(addr(2), addr(3), 6),
        ];
        let tx = Condenser::condense(&transfers, origin(), &balances(&[(1, 6)])).unwrap();
        assert_eq!(tx.input_from(&addr(1)), Some(6));
        assert_eq!(tx.output_to(&addr(3)), Some(6));
        assert_eq!(tx.output_to(&addr(2)), None);
        assert_eq!(tx.input_from(&addr(2)), None);
    }

    #[test]
    fn test_empty_transfer_list() {
        let tx = Condenser::condense(&[], origin(), &BTreeMap::new()).unwrap();
        assert_eq!(tx, Transaction::new(origin()));
    }

    // ==================== Ordering ====================

    #[test]
    fn test_order_decides_overdraft() {
        // B can forward A's payment only after receiving it
        let forward = vec![
            TransferRecord::new(addr(1), addr(2), 5),
            TransferRecord::new(addr(2), addr(3), 5),
        ];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();
        let opening = balances(&[(1, 5)]);

        assert!(Condenser::condense(&forward, origin(), &opening).is_ok());
        assert_eq!(
            Condenser::condense(&backward, origin(), &opening),
            Err(CondenseError::Overdraft {
                index: 0,
                account: addr(2),
                required: 5,
                available: 0
            })
        );
    }

    #[test]
    fn test_first_seen_order() {
        let transfers = vec![
            TransferRecord::new(addr(9), addr(5), 1),
            TransferRecord::new(addr(9), addr(2), 1),
            TransferRecord::new(addr(9), addr(7), 1),
        ];
        let tx = Condenser::condense(&transfers, origin(), &balances(&[(9, 3)])).unwrap();
        let order: Vec<_> = tx.outputs.iter().map(|o| o.destination).collect();
        assert_eq!(order, vec![addr(5), addr(2), addr(7)]);
    }

    #[test]
    fn test_zero_amount_ignored() {
        let transfers = vec![TransferRecord::new(addr(1), addr(2), 0)];
        let tx = Condenser::condense(&transfers, origin(), &BTreeMap::new()).unwrap();
        assert!(tx.outputs.is_empty());
    }

    // ==================== Conservation ====================

    proptest! {
        #[test]
        fn prop_outputs_match_recorded_transfers(
            amounts in proptest::collection::vec((1u8..6, 1u128..1_000), 1..20)
        ) {
            let payer = addr(0);
            let transfers: Vec<_> = amounts
                .iter()
                .map(|(to, amount)| TransferRecord::new(payer, addr(*to), *amount))
                .collect();
            let total: Amount = amounts.iter().map(|(_, a)| a).sum();
            let tx = Condenser::condense(&transfers, origin(), &balances(&[(0, total)])).unwrap();

            for to in 1u8..6 {
                let expected: Amount = amounts.iter().filter(|(t, _)| *t == to).map(|(_, a)| a).sum();
                prop_assert_eq!(tx.output_to(&addr(to)).unwrap_or(0), expected);
            }
            prop_assert_eq!(tx.total_in(), Some(total));
            prop_assert_eq!(tx.total_out(), Some(total));
        }

        #[test]
        fn prop_inputs_equal_outputs(
            moves in proptest::collection::vec((0u8..4, 0u8..4, 0u128..50), 0..30)
        ) {
            let opening = balances(&[(0, 10_000), (1, 10_000), (2, 10_000), (3, 10_000)]);
            let transfers: Vec<_> = moves
                .iter()
                .map(|(from, to, amount)| TransferRecord::new(addr(*from), addr(*to), *amount))
                .collect();
            let tx = Condenser::condense(&transfers, origin(), &opening).unwrap();
            let recorded: Amount = moves.iter().map(|(_, _, a)| a).sum();

            prop_assert_eq!(tx.total_in(), tx.total_out());
            prop_assert!(tx.total_out().unwrap_or(0) <= recorded);
        }
    }
}
