//! Property-based tests for journal entry validation rules.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::entry::JournalLineInput;
use super::error::LedgerError;
use super::validation::{EntryTotals, validate_amounts};

/// Strategy to generate a valid positive amount (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a balanced set of lines: random debits, one or more credits summing to them.
fn balanced_lines() -> impl Strategy<Value = Vec<JournalLineInput>> {
    (prop::collection::vec(positive_amount(), 1..6), 1usize..4).prop_map(|(debits, splits)| {
        let total: Decimal = debits.iter().copied().sum();
        let mut lines: Vec<_> = debits
            .into_iter()
            .map(|amount| JournalLineInput::debit(AccountId::new(), amount, ""))
            .collect();

        // split the total into `splits` credits, remainder on the last one
        let cents = (total * Decimal::ONE_HUNDRED).trunc();
        let share = (cents / Decimal::from(splits as u64)).trunc() / Decimal::ONE_HUNDRED;
        let mut remaining = total;
        for _ in 1..splits {
            if share.is_zero() {
                break;
            }
            lines.push(JournalLineInput::credit(AccountId::new(), share, ""));
            remaining -= share;
        }
        lines.push(JournalLineInput::credit(AccountId::new(), remaining, ""));
        lines
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Balanced entries are accepted**
    ///
    /// *For any* set of positive scale-2 lines whose debits equal credits,
    /// validation SHALL accept the entry and report equal totals.
    #[test]
    fn prop_balanced_entries_accepted(lines in balanced_lines()) {
        let totals = validate_amounts(&lines);
        prop_assert!(totals.is_ok(), "balanced entry rejected: {:?}", totals);
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
        prop_assert_eq!(totals, EntryTotals::of(&lines));
    }

    /// **Property 2: Any imbalance of one minor unit or more is rejected**
    #[test]
    fn prop_unbalanced_entries_rejected(
        lines in balanced_lines(),
        skew in positive_amount(),
    ) {
        let mut lines = lines;
        lines[0].debit += skew;

        let result = validate_amounts(&lines);
        prop_assert!(
            matches!(result, Err(LedgerError::UnbalancedEntry { .. })),
            "unbalanced entry should be rejected, got: {:?}",
            result
        );
    }

    /// **Property 3: A zero line is rejected wherever it appears**
    #[test]
    fn prop_zero_line_rejected(
        lines in balanced_lines(),
        position in any::<prop::sample::Index>(),
    ) {
        let mut lines = lines;
        let at = position.index(lines.len() + 1);
        lines.insert(at, JournalLineInput::debit(AccountId::new(), Decimal::ZERO, ""));

        let result = validate_amounts(&lines);
        prop_assert!(
            matches!(result, Err(LedgerError::ZeroAmount { line }) if line == at + 1),
            "zero line {} should be rejected, got: {:?}",
            at + 1,
            result
        );
    }

    /// **Property 4: Negative amounts are rejected even when the entry balances**
    #[test]
    fn prop_negative_amount_rejected(amount in positive_amount()) {
        let lines = vec![
            JournalLineInput::debit(AccountId::new(), -amount, ""),
            JournalLineInput::credit(AccountId::new(), -amount, ""),
        ];

        let result = validate_amounts(&lines);
        prop_assert!(
            matches!(result, Err(LedgerError::NegativeAmount { line: 1 })),
            "negative amount should be rejected, got: {:?}",
            result
        );
    }
}
