// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record store contract
//!
//! The catalog never owns granule records; it reads and writes them through a
//! [`RecordStore`]. Persistent stores live outside this crate and implement
//! the same trait.
//!
//! # Architecture
//!
//! ```text
//! StoreGranuleCatalog (granule semantics)
//!     ↓
//! RecordStore (typed records + filters)
//!     ↓
//! Concrete implementations (MemoryRecordStore, external backends)
//! ```

pub mod memory;
pub mod traits;
pub mod transaction;
pub mod types;

pub use memory::MemoryRecordStore;
pub use traits::{RecordIter, RecordStore, StoreQuery};
pub use transaction::{PendingWrite, Transaction, TransactionId, TransactionMode, TransactionStatus};
pub use types::{
    sort_records, AttributeDescriptor, AttributeKind, Record, Schema, SortBy, SortOrder,
    StoreError, StoreResult, Value,
};
