//! Property-based tests for the period closing plan.

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::balance::derive_balance;
use super::closing::{ClosingBalance, ClosingPlan};
use super::types::AccountType;
use super::validation::validate_amounts;

/// Strategy for signed scale-2 balances, zero included.
fn arb_balance() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        1 => Just(Decimal::ZERO),
        4 => (-100_000i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2)),
    ]
}

fn arb_balances() -> impl Strategy<Value = Vec<ClosingBalance>> {
    prop::collection::vec(
        (
            prop_oneof![Just(AccountType::Revenue), Just(AccountType::Expense)],
            arb_balance(),
        ),
        1..10,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (account_type, balance))| ClosingBalance {
                account_id: AccountId::new(),
                code: format!("{}{:03}", if account_type == AccountType::Revenue { 4 } else { 6 }, i),
                account_type,
                balance,
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 10: Closing law**
    ///
    /// *For any* revenue/expense balances, applying the closing lines SHALL
    /// bring every temporary account to zero and move exactly net income into
    /// retained earnings.
    #[test]
    fn prop_closing_zeroes_temporary_accounts(balances in arb_balances()) {
        let re = AccountId::new();
        let plan = ClosingPlan::build(&balances, re);

        let mut applied: HashMap<AccountId, Vec<(Decimal, Decimal)>> = HashMap::new();
        for line in &plan.lines {
            applied.entry(line.account_id).or_default().push((line.debit, line.credit));
        }

        for b in &balances {
            let change = derive_balance(
                b.account_type,
                applied.get(&b.account_id).cloned().unwrap_or_default(),
            );
            prop_assert_eq!(b.balance + change, Decimal::ZERO, "account {} not zeroed", b.code);
        }

        let re_change = derive_balance(
            AccountType::Equity,
            applied.get(&re).cloned().unwrap_or_default(),
        );
        prop_assert_eq!(re_change, plan.net_income);
        prop_assert_eq!(plan.net_income, plan.total_revenue - plan.total_expense);
    }

    /// **Property 11: The closing entry is balanced and has no zero lines**
    #[test]
    fn prop_closing_entry_is_valid(balances in arb_balances()) {
        let plan = ClosingPlan::build(&balances, AccountId::new());
        prop_assume!(plan.lines.len() >= 2);

        let result = validate_amounts(&plan.lines);
        prop_assert!(result.is_ok(), "closing entry rejected: {:?}", result);

        let nonzero = balances.iter().filter(|b| !b.balance.is_zero()).count();
        let re_lines = usize::from(!plan.net_income.is_zero());
        prop_assert_eq!(plan.lines.len(), nonzero + re_lines);
    }
}
