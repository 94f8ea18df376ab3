//! Property-based tests for reversal entries.

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalEntryId};

use super::balance::derive_balance;
use super::entry::{JournalLineInput, number_lines};
use super::posting::PostingRules;
use super::types::AccountType;
use super::validation::{EntryTotals, validate_amounts};

/// Strategy for generating random positive Decimal amounts.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Strategy for a balanced entry over a small pool of accounts.
///
/// Each generated pair debits one account and credits another for the same
/// amount, so accounts repeat across lines.
fn arb_balanced_lines(pool: Vec<AccountId>) -> impl Strategy<Value = Vec<JournalLineInput>> {
    let n = pool.len();
    prop::collection::vec((0..n, 0..n, arb_amount()), 1..5).prop_map(move |pairs| {
        pairs
            .into_iter()
            .flat_map(|(d, c, amount)| {
                [
                    JournalLineInput::debit(pool[d], amount, "debit"),
                    JournalLineInput::credit(pool[c], amount, "credit"),
                ]
            })
            .collect()
    })
}

fn per_account(lines: &[JournalLineInput]) -> HashMap<AccountId, Vec<(Decimal, Decimal)>> {
    let mut map: HashMap<AccountId, Vec<(Decimal, Decimal)>> = HashMap::new();
    for line in lines {
        map.entry(line.account_id).or_default().push((line.debit, line.credit));
    }
    map
}

fn pool() -> Vec<AccountId> {
    (0..4).map(|_| AccountId::new()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 8: Reversal law**
    ///
    /// *For any* posted entry e and its reversal e', every account's derived
    /// balance over {e, e'} SHALL be zero, regardless of account type.
    #[test]
    fn prop_reversal_nets_to_zero(lines in arb_balanced_lines(pool())) {
        let stored = number_lines(JournalEntryId::new(), &lines);
        let reversal = PostingRules::reversal_lines(&stored);

        let mut combined = lines.clone();
        combined.extend(reversal);

        for (_, account_lines) in per_account(&combined) {
            for account_type in AccountType::ALL {
                prop_assert_eq!(
                    derive_balance(account_type, account_lines.iter().copied()),
                    Decimal::ZERO
                );
            }
        }
    }

    /// **Property 9: A reversal of a valid entry is itself valid**
    ///
    /// *For any* balanced entry, the mirrored lines SHALL pass validation with
    /// the original's totals swapped.
    #[test]
    fn prop_reversal_is_balanced(lines in arb_balanced_lines(pool())) {
        let stored = number_lines(JournalEntryId::new(), &lines);
        let reversal = PostingRules::reversal_lines(&stored);

        let original = EntryTotals::of(&lines);
        let mirrored = validate_amounts(&reversal);
        prop_assert!(mirrored.is_ok(), "reversal rejected: {:?}", mirrored);
        let mirrored = mirrored.unwrap();
        prop_assert_eq!(mirrored.debit, original.credit);
        prop_assert_eq!(mirrored.credit, original.debit);
        prop_assert_eq!(reversal.len(), lines.len());
    }
}
