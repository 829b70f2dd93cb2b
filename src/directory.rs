//! Account registry: upline references and role sets.
//!
//! The ledger never mutates roles; they change only through the
//! administrative calls here. An account's upline is fixed at
//! registration.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use thiserror::Error;

use crate::model::{AccountId, Role};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("account {0} is already registered")]
    AlreadyRegistered(AccountId),

    #[error("upline account {0} not found")]
    UplineNotFound(AccountId),

    #[error("account {0} not found")]
    NotFound(AccountId),
}

/// One registered participant.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    upline: Option<AccountId>,
    roles: HashSet<Role>,
}

impl Account {
    pub fn upline(&self) -> Option<AccountId> {
        self.upline
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// In-memory account registry.
#[derive(Default)]
pub struct Directory {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, optionally under an existing upline. The
    /// upline reference is immutable afterwards.
    pub fn register(
        &self,
        id: AccountId,
        upline: Option<AccountId>,
    ) -> Result<Account, DirectoryError> {
        let mut accounts = self.accounts.write().expect("directory lock poisoned");
        if accounts.contains_key(&id) {
            return Err(DirectoryError::AlreadyRegistered(id));
        }
        if let Some(upline) = upline {
            if !accounts.contains_key(&upline) {
                return Err(DirectoryError::UplineNotFound(upline));
            }
        }

        let account = Account {
            id,
            upline,
            roles: HashSet::from([Role::User]),
        };
        accounts.insert(id, account.clone());
        Ok(account)
    }

    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.accounts
            .read()
            .expect("directory lock poisoned")
            .get(&id)
            .cloned()
    }

    /// The account that referred `id`, if any.
    pub fn upline_of(&self, id: AccountId) -> Option<AccountId> {
        self.get(id)?.upline
    }

    pub fn grant_role(&self, id: AccountId, role: Role) -> Result<(), DirectoryError> {
        let mut accounts = self.accounts.write().expect("directory lock poisoned");
        let account = accounts.get_mut(&id).ok_or(DirectoryError::NotFound(id))?;
        account.roles.insert(role);
        Ok(())
    }

    pub fn revoke_role(&self, id: AccountId, role: Role) -> Result<(), DirectoryError> {
        let mut accounts = self.accounts.write().expect("directory lock poisoned");
        let account = accounts.get_mut(&id).ok_or(DirectoryError::NotFound(id))?;
        account.roles.remove(&role);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let directory = Directory::new();
        directory.register(1, None).unwrap();
        let account = directory.get(1).unwrap();
        assert_eq!(account.id, 1);
        assert_eq!(account.upline(), None);
        assert!(account.has_role(Role::User));
    }

    #[test]
    fn duplicate_registration_fails() {
        let directory = Directory::new();
        directory.register(1, None).unwrap();
        assert!(matches!(
            directory.register(1, None),
            Err(DirectoryError::AlreadyRegistered(1))
        ));
    }

    #[test]
    fn register_under_unknown_upline_fails() {
        let directory = Directory::new();
        assert!(matches!(
            directory.register(2, Some(1)),
            Err(DirectoryError::UplineNotFound(1))
        ));
    }

    #[test]
    fn two_hop_chain_resolves() {
        let directory = Directory::new();
        directory.register(1, None).unwrap();
        directory.register(2, Some(1)).unwrap();
        directory.register(3, Some(2)).unwrap();

        assert_eq!(directory.upline_of(3), Some(2));
        assert_eq!(directory.upline_of(2), Some(1));
        assert_eq!(directory.upline_of(1), None);
    }

    #[test]
    fn roles_change_administratively() {
        let directory = Directory::new();
        directory.register(1, None).unwrap();
        assert!(!directory.get(1).unwrap().has_role(Role::Ambassador));

        directory.grant_role(1, Role::Ambassador).unwrap();
        assert!(directory.get(1).unwrap().has_role(Role::Ambassador));

        directory.revoke_role(1, Role::Ambassador).unwrap();
        assert!(!directory.get(1).unwrap().has_role(Role::Ambassador));
    }

    #[test]
    fn role_change_on_unknown_account_fails() {
        let directory = Directory::new();
        assert!(matches!(
            directory.grant_role(9, Role::Ambassador),
            Err(DirectoryError::NotFound(9))
        ));
    }
}
