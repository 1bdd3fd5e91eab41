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

use core::fmt::Debug;
use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use futures::future::BoxFuture;
use mock_instant::thread_local::{Instant as MockInstant, MockClock as MockInstantClock};

/// Source of timestamps and delays for the pool.
///
/// Kept object safe so components can share one `Arc<dyn Clock>` and tests
/// can swap in [`MockClock`].
pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> SystemTime;

    /// Resolves once `duration` has elapsed on this clock, counted from this
    /// call. Must not require a runtime until the future is polled.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let deadline = tokio::time::Instant::now() + duration;
        // Creating a tokio `Sleep` needs a runtime, so defer it to first poll.
        async move { tokio::time::sleep_until(deadline).await }.boxed()
    }
}

/// Clock driven by `mock_instant`'s thread-local clock.
///
/// Time only moves when the test calls `MockClock::advance`. Sleeping tasks
/// poll cooperatively, so they must run on the thread that advances the
/// clock (the default current-thread test runtime does).
#[derive(Debug, Default, Clone, Copy)]
pub struct MockClock;

impl MockClock {
    pub fn advance(duration: Duration) {
        MockInstantClock::advance(duration);
    }
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + MockInstantClock::time()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let start = MockInstant::now();
        async move {
            loop {
                tokio::task::yield_now().await;
                if start.elapsed() >= duration {
                    break;
                }
            }
        }
        .boxed()
    }
}
