// Copyright 2025 The NativeLink Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use tracing::{debug, warn};

use crate::constants::IMPERATIVE_BORROWER_PREFIX;
use crate::context::PoolContext;
use crate::instance::{BorrowResult, InstanceId, ResourceHandle};

/// Imperative borrower with explicit, idempotent `borrow` and `release`.
///
/// Whatever is still held is released on drop.
#[derive(Debug)]
pub struct PooledWebViewHandle {
    pool: PoolContext,
    held: Option<BorrowResult>,
}

impl PooledWebViewHandle {
    pub fn new(pool: &PoolContext) -> Self {
        Self {
            pool: pool.clone(),
            held: None,
        }
    }

    /// Borrows any instance, or returns the one already held.
    pub fn borrow(&mut self) -> Option<BorrowResult> {
        self.acquire(None)
    }

    /// Like [`Self::borrow`], preferring an instance warmed for `url`.
    pub fn borrow_for_url(&mut self, url: &str) -> Option<BorrowResult> {
        self.acquire(Some(url))
    }

    fn acquire(&mut self, url: Option<&str>) -> Option<BorrowResult> {
        if let Some(held) = &self.held {
            return Some(held.clone());
        }
        let borrower_id = self.pool.next_borrower_id(IMPERATIVE_BORROWER_PREFIX);
        let result = self.pool.borrow(&borrower_id, url)?;
        self.held = Some(result.clone());
        Some(result)
    }

    /// Returns the held instance, if any.
    pub fn release(&mut self) {
        if let Some(held) = self.held.take() {
            debug!(instance_id = %held.instance_id, "handle released");
            self.pool.release(&held.instance_id);
        }
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.held.as_ref().map(|held| &held.instance_id)
    }

    pub fn resource(&self) -> Option<&ResourceHandle> {
        self.held.as_ref().map(|held| &held.resource)
    }
}

impl Drop for PooledWebViewHandle {
    fn drop(&mut self) {
        if let Some(held) = &self.held {
            warn!(
                instance_id = %held.instance_id,
                "handle dropped while holding an instance, releasing it"
            );
        }
        self.release();
    }
}
