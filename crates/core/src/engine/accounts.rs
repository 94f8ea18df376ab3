//! Account registry operations.

use chrono::Utc;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;
use tracing::info;

use super::LedgerEngine;
use super::balances::derive_in_tx;
use crate::ledger::{Account, Chart, LedgerError, NewAccount};
use crate::store::{LedgerStore, LedgerTx};

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates an account with a zero balance.
    ///
    /// # Errors
    ///
    /// - `EmptyAccountCode`, `DuplicateAccountCode`
    /// - `InvalidParent` if the parent is missing, not a header, or of another type
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        self.bounded("create_account", async move {
            let mut tx = self.store.begin().await?;

            let code = input.code.trim().to_string();
            if code.is_empty() {
                return Err(LedgerError::EmptyAccountCode);
            }
            if tx.find_account_by_code(&code).await?.is_some() {
                return Err(LedgerError::DuplicateAccountCode(code));
            }

            let (parent_id, level) = match input.parent_code.as_deref() {
                Some(parent_code) => {
                    let parent = tx
                        .find_account_by_code(parent_code)
                        .await?
                        .filter(|p| p.is_header && p.account_type == input.account_type)
                        .ok_or_else(|| LedgerError::InvalidParent(parent_code.to_string()))?;
                    (Some(parent.id), parent.level + 1)
                }
                None => (None, 1),
            };

            let account = Account {
                id: AccountId::new(),
                code,
                name: input.name,
                account_type: input.account_type,
                parent_id,
                level,
                is_header: input.is_header,
                balance: Decimal::ZERO,
                is_active: true,
                created_at: Utc::now(),
                deleted_at: None,
            };
            tx.insert_account(&account).await?;
            tx.commit().await?;

            info!(
                account_code = %account.code,
                account_type = %account.account_type,
                is_header = account.is_header,
                "account created"
            );
            Ok(account)
        })
        .await
    }

    /// Reads a live account.
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.bounded("get_account", async move {
            let mut tx = self.store.begin().await?;
            tx.find_account(account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound(account_id))
        })
        .await
    }

    /// Reads the live account carrying `code`.
    pub async fn get_account_by_code(&self, code: &str) -> Result<Account, LedgerError> {
        self.bounded("get_account_by_code", async move {
            let mut tx = self.store.begin().await?;
            tx.find_account_by_code(code)
                .await?
                .ok_or_else(|| LedgerError::AccountCodeNotFound(code.to_string()))
        })
        .await
    }

    /// Every live account, ordered by code.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.bounded("list_accounts", async move {
            let mut tx = self.store.begin().await?;
            tx.list_accounts().await
        })
        .await
    }

    /// Marks an account inactive so it rejects new lines.
    ///
    /// # Errors
    ///
    /// `AccountHasBalance` while the derived balance is non-zero.
    pub async fn deactivate_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.bounded("deactivate_account", async move {
            let mut tx = self.store.begin().await?;
            let mut account = tx
                .lock_accounts(&[account_id])
                .await?
                .pop()
                .ok_or(LedgerError::AccountNotFound(account_id))?;

            let balance = derive_in_tx(&mut tx, account_id, None).await?;
            if !balance.is_zero() {
                return Err(LedgerError::AccountHasBalance {
                    code: account.code,
                    balance,
                });
            }
            if !account.is_active {
                return Ok(account);
            }

            account.is_active = false;
            tx.update_account(&account).await?;
            tx.commit().await?;

            info!(account_code = %account.code, "account deactivated");
            Ok(account)
        })
        .await
    }

    /// Soft-deletes an account.
    ///
    /// # Errors
    ///
    /// - `AccountInUse` if any journal line references it
    /// - `AccountHasChildren` for a header with live children
    pub async fn delete_account(&self, account_id: AccountId) -> Result<(), LedgerError> {
        self.bounded("delete_account", async move {
            let mut tx = self.store.begin().await?;
            let mut account = tx
                .lock_accounts(&[account_id])
                .await?
                .pop()
                .ok_or(LedgerError::AccountNotFound(account_id))?;

            if tx.account_has_lines(account_id).await? {
                return Err(LedgerError::AccountInUse(account.code));
            }
            if account.is_header {
                let accounts = tx.list_accounts().await?;
                if !Chart::new(&accounts).children(account_id).is_empty() {
                    return Err(LedgerError::AccountHasChildren(account.code));
                }
            }

            account.is_active = false;
            account.deleted_at = Some(Utc::now());
            tx.update_account(&account).await?;
            tx.commit().await?;

            info!(account_code = %account.code, "account deleted");
            Ok(())
        })
        .await
    }
}
