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

use core::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::surface::WebSurface;

/// Stable identifier of a pooled instance, `webview-pool-<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn for_index(index: usize) -> Self {
        Self(format!("webview-pool-{index}"))
    }

    /// Identifier used for a private surface created when the pool had
    /// nothing to lend.
    pub fn unpooled(borrower_id: &str) -> Self {
        Self(format!("unpooled-{borrower_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle phase of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Free to be borrowed or warmed.
    Idle,
    /// Held exclusively by one borrower.
    Borrowed,
    /// Returned and being wiped; unavailable until marked idle.
    Cleaning,
    /// Preloading a URL for an anticipated borrow.
    Warming,
}

impl InstanceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Borrowed => "borrowed",
            Self::Cleaning => "cleaning",
            Self::Warming => "warming",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared cell holding the surface of an instance once it has been created.
///
/// The slot that renders an instance fills the cell the first time the
/// instance is borrowed or warmed. Every clone observes the same surface, so
/// a borrower can hold on to the handle it got from `borrow` and read the
/// surface later.
#[derive(Clone, Default)]
pub struct ResourceHandle(Arc<RwLock<Option<Arc<dyn WebSurface>>>>);

impl ResourceHandle {
    pub fn get(&self) -> Option<Arc<dyn WebSurface>> {
        self.0.read().clone()
    }

    pub fn is_materialized(&self) -> bool {
        self.0.read().is_some()
    }

    /// Stores `surface` unless one is already present. Returns whether the
    /// cell was filled by this call.
    pub(crate) fn materialize(&self, surface: Arc<dyn WebSurface>) -> bool {
        let mut cell = self.0.write();
        if cell.is_some() {
            return false;
        }
        *cell = Some(surface);
        true
    }

    /// True when both handles refer to the same cell.
    pub fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

/// One entry of the pool registry.
#[derive(Debug, Clone)]
pub struct PoolInstance {
    pub id: InstanceId,
    pub status: InstanceStatus,
    pub resource: ResourceHandle,
    /// Present while borrowed, and kept through cleaning until the instance
    /// is marked idle.
    pub borrower_id: Option<String>,
    pub created_at: SystemTime,
    pub borrowed_at: Option<SystemTime>,
    /// URL preloaded by a warm-up. Kept after a matching borrow so the
    /// renderer knows the page is already loaded.
    pub warmed_url: Option<String>,
}

impl PoolInstance {
    pub(crate) fn new(id: InstanceId, created_at: SystemTime) -> Self {
        Self {
            id,
            status: InstanceStatus::Idle,
            resource: ResourceHandle::default(),
            borrower_id: None,
            created_at,
            borrowed_at: None,
            warmed_url: None,
        }
    }

    pub(crate) fn lend(&mut self, borrower_id: &str, now: SystemTime) {
        self.status = InstanceStatus::Borrowed;
        self.borrower_id = Some(borrower_id.to_string());
        self.borrowed_at = Some(now);
    }

    pub(crate) fn start_cleaning(&mut self) {
        self.status = InstanceStatus::Cleaning;
        self.warmed_url = None;
    }

    pub(crate) fn reset_to_idle(&mut self) {
        self.status = InstanceStatus::Idle;
        self.borrower_id = None;
        self.borrowed_at = None;
        self.warmed_url = None;
    }
}

/// Snapshot of the registry handed to observers and callers of `get_state`.
#[derive(Debug, Clone, Default)]
pub struct PoolState {
    /// Instances in registry (id) order.
    pub instances: Vec<PoolInstance>,
    pub available_count: usize,
    pub borrowed_count: usize,
    pub warming_count: usize,
    pub cleaning_count: usize,
    pub initialized: bool,
}

impl PoolState {
    pub(crate) fn new(instances: Vec<PoolInstance>, initialized: bool) -> Self {
        let count = |status: InstanceStatus| {
            instances
                .iter()
                .filter(|instance| instance.status == status)
                .count()
        };
        Self {
            available_count: count(InstanceStatus::Idle),
            borrowed_count: count(InstanceStatus::Borrowed),
            warming_count: count(InstanceStatus::Warming),
            cleaning_count: count(InstanceStatus::Cleaning),
            instances,
            initialized,
        }
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&PoolInstance> {
        self.instances.iter().find(|instance| &instance.id == id)
    }

    pub fn pool_size(&self) -> usize {
        self.instances.len()
    }
}

/// Outcome of a successful borrow.
#[derive(Debug, Clone)]
pub struct BorrowResult {
    pub instance_id: InstanceId,
    pub resource: ResourceHandle,
    /// True when the borrow claimed an instance already warmed for the
    /// requested URL.
    pub warm_hit: bool,
}
