// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Write transactions against a record store
//!
//! An auto-commit transaction applies every write immediately. An explicit
//! transaction stages writes until the catalog commits it; rollback discards
//! the staged writes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::types::{Record, StoreError, StoreResult};
use crate::filter::Filter;

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionMode {
    AutoCommit,
    Explicit,
}

/// Transaction lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

/// A write waiting in an explicit transaction
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Add {
        type_name: String,
        records: Vec<Record>,
    },
    Remove {
        type_name: String,
        filter: Filter,
    },
}

impl PendingWrite {
    pub fn type_name(&self) -> &str {
        match self {
            PendingWrite::Add { type_name, .. } | PendingWrite::Remove { type_name, .. } => {
                type_name
            }
        }
    }
}

#[derive(Debug)]
struct TransactionState {
    status: TransactionStatus,
    staged: Vec<PendingWrite>,
}

/// Write transaction handle passed to catalog mutations
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    mode: TransactionMode,
    state: Mutex<TransactionState>,
}

impl Transaction {
    fn with_mode(mode: TransactionMode) -> Self {
        Self {
            id: TransactionId::new(),
            mode,
            state: Mutex::new(TransactionState {
                status: TransactionStatus::Active,
                staged: Vec::new(),
            }),
        }
    }

    pub fn auto_commit() -> Self {
        Self::with_mode(TransactionMode::AutoCommit)
    }

    pub fn explicit() -> Self {
        Self::with_mode(TransactionMode::Explicit)
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn is_auto_commit(&self) -> bool {
        self.mode == TransactionMode::AutoCommit
    }

    pub fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    pub fn staged_len(&self) -> usize {
        self.state.lock().staged.len()
    }

    /// Stage a write; fails once the transaction has finished
    pub fn stage(&self, write: PendingWrite) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.status != TransactionStatus::Active {
            return Err(StoreError::TransactionClosed(self.id.to_string()));
        }
        state.staged.push(write);
        Ok(())
    }

    /// Take the staged writes for commit
    ///
    /// The transaction stays active; call [`Transaction::mark_committed`] once
    /// the store accepted the batch.
    pub fn take_staged(&self) -> StoreResult<Vec<PendingWrite>> {
        let mut state = self.state.lock();
        if state.status != TransactionStatus::Active {
            return Err(StoreError::TransactionClosed(self.id.to_string()));
        }
        Ok(std::mem::take(&mut state.staged))
    }

    /// Put writes back after a failed commit so a retry sees them
    pub fn restore_staged(&self, mut writes: Vec<PendingWrite>) {
        let mut state = self.state.lock();
        writes.append(&mut state.staged);
        state.staged = writes;
    }

    pub fn mark_committed(&self) {
        let mut state = self.state.lock();
        if !self.is_auto_commit() {
            state.status = TransactionStatus::Committed;
        }
    }

    /// Discard staged writes
    pub fn rollback(&self) {
        let mut state = self.state.lock();
        state.staged.clear();
        if !self.is_auto_commit() {
            state.status = TransactionStatus::RolledBack;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_transaction_stages_until_taken() {
        let txn = Transaction::explicit();
        txn.stage(PendingWrite::Remove {
            type_name: "tiles".into(),
            filter: Filter::Include,
        })
        .unwrap();
        assert_eq!(txn.staged_len(), 1);

        let writes = txn.take_staged().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].type_name(), "tiles");
        txn.mark_committed();
        assert_eq!(txn.status(), TransactionStatus::Committed);
        assert!(txn
            .stage(PendingWrite::Remove {
                type_name: "tiles".into(),
                filter: Filter::Include,
            })
            .is_err());
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let txn = Transaction::explicit();
        txn.stage(PendingWrite::Add {
            type_name: "tiles".into(),
            records: vec![Record::new()],
        })
        .unwrap();
        txn.rollback();
        assert_eq!(txn.staged_len(), 0);
        assert_eq!(txn.status(), TransactionStatus::RolledBack);
    }
}
