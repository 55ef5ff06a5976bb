//! # Role Table
//!
//! An [`Authorizer`] backed by an explicit grant table, plus an
//! `allow_all` switch for tests that are not about authorization.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use basin_core::ports::{Authorizer, Operation};
use basin_core::Address;

/// Explicit per-caller operation grants.
#[derive(Default)]
pub struct RoleTable {
    grants: RwLock<HashMap<Address, HashSet<Operation>>>,
    allow_all: RwLock<bool>,
}

impl RoleTable {
    /// An empty table: everything is refused until granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table that says yes to everyone. For tests about other things.
    pub fn permissive() -> Self {
        let table = Self::default();
        *table.allow_all.write() = true;
        table
    }

    /// Grants one operation to one caller.
    pub fn grant(&self, caller: Address, operation: Operation) {
        self.grants.write().entry(caller).or_default().insert(operation);
    }

    /// Revokes one operation from one caller.
    pub fn revoke(&self, caller: Address, operation: Operation) {
        if let Some(ops) = self.grants.write().get_mut(&caller) {
            ops.remove(&operation);
        }
    }
}

impl Authorizer for RoleTable {
    fn may_call(&self, caller: Address, operation: Operation) -> bool {
        if *self.allow_all.read() {
            return true;
        }
        self.grants
            .read()
            .get(&caller)
            .is_some_and(|ops| ops.contains(&operation))
    }
}
