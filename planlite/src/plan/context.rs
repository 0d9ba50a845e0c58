// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-query analysis context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::optimizer::{OptimizerError, OptimizerResult};

/// Context of one query analysis. Clones share the cancellation flag, so the
/// connection that owns the query can cancel an analysis running elsewhere.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with `Cancelled` once `cancel` was called on any clone
    pub fn check_cancelled(&self) -> OptimizerResult<()> {
        if self.is_cancelled() {
            Err(OptimizerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
