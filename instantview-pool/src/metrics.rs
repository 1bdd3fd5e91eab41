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

use core::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how the pool is being used.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Successful borrows, warm hits included.
    pub borrows: AtomicU64,
    /// Borrows that claimed an instance already warmed for their URL.
    pub warm_hits: AtomicU64,
    /// Borrows that found no instance available.
    pub exhaustions: AtomicU64,
    pub releases: AtomicU64,
    pub warm_ups_started: AtomicU64,
    /// Warm-ups returned to the pool because nobody claimed them in time.
    pub warm_ups_expired: AtomicU64,
    pub warm_ups_cancelled: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        PoolMetricsSnapshot {
            borrows: load(&self.borrows),
            warm_hits: load(&self.warm_hits),
            exhaustions: load(&self.exhaustions),
            releases: load(&self.releases),
            warm_ups_started: load(&self.warm_ups_started),
            warm_ups_expired: load(&self.warm_ups_expired),
            warm_ups_cancelled: load(&self.warm_ups_cancelled),
        }
    }
}

/// Plain copy of [`PoolMetrics`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    pub borrows: u64,
    pub warm_hits: u64,
    pub exhaustions: u64,
    pub releases: u64,
    pub warm_ups_started: u64,
    pub warm_ups_expired: u64,
    pub warm_ups_cancelled: u64,
}
