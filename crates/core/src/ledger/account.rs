//! Chart of accounts.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use super::types::AccountType;

/// A chart-of-accounts entry.
///
/// `balance` is a derived cache. Only balance synchronization writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub id: AccountId,
    /// Unique code among live accounts, e.g. `1101`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account type; fixes the normal balance side.
    pub account_type: AccountType,
    /// Parent header account, if any.
    pub parent_id: Option<AccountId>,
    /// Depth in the hierarchy, roots are level 1.
    pub level: i32,
    /// Header (group) accounts never receive journal lines.
    pub is_header: bool,
    /// Cached balance. Leaf: derived from posted lines. Header: roll-up of children.
    pub balance: Decimal,
    /// Inactive accounts reject new lines.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Soft-delete tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Returns true if journal lines may reference this account.
    #[must_use]
    pub fn is_postable(&self) -> bool {
        !self.is_header && self.is_active && !self.is_deleted()
    }

    /// Returns true if the account was soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Unique account code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Code of the parent header account.
    pub parent_code: Option<String>,
    /// Whether this is a header (group) account.
    pub is_header: bool,
}

impl NewAccount {
    /// A postable account without a parent.
    #[must_use]
    pub fn leaf(code: &str, name: &str, account_type: AccountType) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            parent_code: None,
            is_header: false,
        }
    }

    /// A header account without a parent.
    #[must_use]
    pub fn header(code: &str, name: &str, account_type: AccountType) -> Self {
        Self {
            is_header: true,
            ..Self::leaf(code, name, account_type)
        }
    }

    /// Places the account under a header.
    #[must_use]
    pub fn under(mut self, parent_code: &str) -> Self {
        self.parent_code = Some(parent_code.to_string());
        self
    }
}

/// Read-only view over a set of accounts for hierarchy walks.
#[derive(Debug)]
pub struct Chart<'a> {
    by_id: HashMap<AccountId, &'a Account>,
    children: HashMap<AccountId, Vec<AccountId>>,
}

impl<'a> Chart<'a> {
    /// Indexes live accounts. Deleted accounts are skipped.
    #[must_use]
    pub fn new(accounts: &'a [Account]) -> Self {
        let mut by_id = HashMap::with_capacity(accounts.len());
        let mut children: HashMap<AccountId, Vec<AccountId>> = HashMap::new();
        for account in accounts.iter().filter(|a| !a.is_deleted()) {
            by_id.insert(account.id, account);
            if let Some(parent_id) = account.parent_id {
                children.entry(parent_id).or_default().push(account.id);
            }
        }
        Self { by_id, children }
    }

    /// Looks up an account.
    #[must_use]
    pub fn get(&self, id: AccountId) -> Option<&'a Account> {
        self.by_id.get(&id).copied()
    }

    /// Direct live children of an account.
    #[must_use]
    pub fn children(&self, id: AccountId) -> &[AccountId] {
        self.children.get(&id).map_or(&[][..], Vec::as_slice)
    }

    /// All header ancestors of an account, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: AccountId) -> Vec<AccountId> {
        let mut ancestors = Vec::new();
        let mut current = self.get(id).and_then(|a| a.parent_id);
        while let Some(parent_id) = current {
            // guards against a corrupted cycle
            if ancestors.contains(&parent_id) {
                break;
            }
            ancestors.push(parent_id);
            current = self.get(parent_id).and_then(|a| a.parent_id);
        }
        ancestors
    }

    /// All leaf accounts at or below an account.
    #[must_use]
    pub fn descendant_leaves(&self, id: AccountId) -> Vec<AccountId> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            match self.get(current) {
                Some(account) if !account.is_header => leaves.push(current),
                Some(_) => stack.extend(self.children(current).iter().copied()),
                None => {}
            }
        }
        leaves.sort_unstable();
        leaves
    }

    /// The given accounts plus all of their ancestors, ascending by id.
    #[must_use]
    pub fn with_ancestors(&self, ids: impl IntoIterator<Item = AccountId>) -> Vec<AccountId> {
        let mut set = BTreeSet::new();
        for id in ids {
            set.insert(id);
            set.extend(self.ancestors(id));
        }
        set.into_iter().collect()
    }

    /// Header accounts, deepest first.
    #[must_use]
    pub fn headers_bottom_up(&self) -> Vec<&'a Account> {
        let mut headers: Vec<_> = self.by_id.values().copied().filter(|a| a.is_header).collect();
        headers.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.code.cmp(&b.code)));
        headers
    }

    /// Live leaf accounts.
    pub fn leaves(&self) -> impl Iterator<Item = &'a Account> + '_ {
        self.by_id.values().copied().filter(|a| !a.is_header)
    }
}
