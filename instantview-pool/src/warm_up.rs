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

use crate::context::PoolContext;
use crate::manager::{WarmUpHandle, WarmUpOptions};

/// Warm-up-only access to the pool. Never borrows.
#[derive(Debug, Clone)]
pub struct WarmUpController {
    pool: PoolContext,
}

impl WarmUpController {
    pub fn new(pool: &PoolContext) -> Self {
        Self { pool: pool.clone() }
    }

    pub fn warm_up(&self, url: &str, options: WarmUpOptions) -> Option<WarmUpHandle> {
        self.pool.warm_up(url, options)
    }

    pub fn cancel_warm_up(&self, url: &str) {
        self.pool.cancel_warm_up(url);
    }
}
