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
use core::hash::Hash;
use core::time::Duration;
use std::collections::HashMap;
use std::sync::Arc;

use instantview_error::{Code, Error, make_err};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::background_spawn;
use crate::clock::Clock;

/// Identifies one particular schedule of a key.
///
/// Rescheduling a key yields a new token, so a callback from an older
/// schedule can never claim the newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct PendingTimer {
    token: TimerToken,
    abort: AbortHandle,
}

/// One-shot callbacks keyed by a stable identifier, at most one per key.
///
/// The owner keeps this inside the same lock as the state the callbacks
/// mutate. A fired callback must call [`KeyedTimers::claim`] under that lock
/// before acting; whichever of claim, [`KeyedTimers::cancel`] or teardown
/// reaches the entry first wins and the others become no-ops.
///
/// Timers run on the tokio runtime current when the set was created, so
/// scheduling works from any thread afterwards. A set created outside of a
/// runtime falls back to whichever runtime is current at `schedule` time.
#[derive(Debug)]
pub struct KeyedTimers<K: Eq + Hash> {
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
    pending: HashMap<K, PendingTimer>,
    next_token: u64,
}

impl<K> KeyedTimers<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            runtime: Handle::try_current().ok(),
            pending: HashMap::new(),
            next_token: 0,
        }
    }

    /// Runs `on_fire` after `delay`, replacing (and aborting) any timer
    /// already pending for `key`.
    ///
    /// Fails with `FailedPrecondition`, leaving every pending timer as it
    /// was, when there is no runtime to run the timer on.
    pub fn schedule<F>(
        &mut self,
        key: K,
        delay: Duration,
        on_fire: F,
    ) -> Result<TimerToken, Error>
    where
        F: FnOnce(K, TimerToken) + Send + 'static,
    {
        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|e| {
                make_err!(
                    Code::FailedPrecondition,
                    "No tokio runtime to run timer for {key:?} on: {e}"
                )
            })?,
        };
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        let sleep = self.clock.sleep(delay);
        let fire_key = key.clone();
        let handle = background_spawn!(
            on: &runtime,
            "keyed_timer",
            async move {
                sleep.await;
                on_fire(fire_key, token);
            },
            delay_ms = delay.as_millis() as u64
        );
        if let Some(previous) = self.pending.insert(
            key,
            PendingTimer {
                token,
                abort: handle.abort_handle(),
            },
        ) {
            previous.abort.abort();
        }
        Ok(token)
    }

    /// Claims a fired timer. Returns true only if `token` is still the
    /// pending schedule for `key`, and removes the entry when it is.
    pub fn claim(&mut self, key: &K, token: TimerToken) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.token == token => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Cancels the pending timer for `key`. Returns false if there was none.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some_and(|pending| {
            pending.abort.abort();
            true
        })
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.abort.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K: Eq + Hash> Drop for KeyedTimers<K> {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.abort.abort();
        }
    }
}
