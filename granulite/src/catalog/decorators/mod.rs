// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog decorators
//!
//! Each decorator wraps an inner [`GranuleCatalog`](crate::catalog::GranuleCatalog)
//! and forwards what it does not handle through a [`DelegatingCatalog`].
//! The factory composes them outermost first:
//!
//! ```text
//! LockingCatalog
//!     ↓
//! HintMergingCatalog
//!     ↓
//! CachingCatalog          (caching enabled)
//!     ↓
//! StrTreeGranuleCatalog   (caching enabled)
//!     ↓
//! StoreGranuleCatalog
//! ```

pub mod caching;
pub mod delegating;
pub mod hints;
pub mod locking;

pub use caching::CachingCatalog;
pub use delegating::DelegatingCatalog;
pub use hints::HintMergingCatalog;
pub use locking::LockingCatalog;
