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
use core::time::Duration;
use std::sync::{Arc, Weak};

use instantview_config::PoolConfig;
use instantview_error::{Error, ResultExt};
use instantview_util::clock::{Clock, SystemClock};
use instantview_util::keyed_timers::{KeyedTimers, TimerToken};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::instance::{BorrowResult, InstanceId, InstanceStatus, PoolInstance, PoolState};
use crate::metrics::PoolMetrics;

/// Observer of pool state changes.
pub type PoolListener = Arc<dyn Fn(&PoolState) + Send + Sync>;

/// Options for [`PoolManager::warm_up`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmUpOptions {
    /// Overrides the configured warm-up timeout.
    pub timeout: Option<Duration>,
}

impl WarmUpOptions {
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Owns the instance registry and every transition between states.
///
/// Every operation mutates the registry under one lock, releases it, and only
/// then notifies subscribers in subscription order with a single shared
/// snapshot. Listeners may therefore call back into the manager.
#[derive(Clone)]
pub struct PoolManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
    listeners: Mutex<Listeners>,
    metrics: PoolMetrics,
}

struct Registry {
    config: PoolConfig,
    initialized: bool,
    instances: Vec<PoolInstance>,
    /// Expiry timers of warming instances, keyed by warmed URL.
    warm_up_timers: KeyedTimers<String>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, PoolListener)>,
}

impl Registry {
    fn snapshot(&self) -> PoolState {
        PoolState::new(self.instances.clone(), self.initialized)
    }

    fn position(&self, id: &InstanceId) -> Option<usize> {
        self.instances.iter().position(|instance| &instance.id == id)
    }

    /// First instance in `status`, in ascending id order.
    fn first_with_status(&self, status: InstanceStatus) -> Option<usize> {
        self.instances
            .iter()
            .position(|instance| instance.status == status)
    }

    fn warming_for(&self, url: &str) -> Option<usize> {
        self.instances.iter().position(|instance| {
            instance.status == InstanceStatus::Warming
                && instance.warmed_url.as_deref() == Some(url)
        })
    }

    /// Returns a borrowed or warming instance to the pool.
    fn hand_back(&mut self, index: usize) {
        let cleanup = self.config.cleanup_on_return;
        let instance = &mut self.instances[index];
        if cleanup {
            instance.start_cleaning();
        } else {
            instance.reset_to_idle();
        }
    }
}

impl ManagerInner {
    fn notify(&self, snapshot: &PoolState) {
        let listeners: Vec<PoolListener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl PoolManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: Mutex::new(Registry {
                    config: PoolConfig::default(),
                    initialized: false,
                    instances: Vec::new(),
                    warm_up_timers: KeyedTimers::new(clock.clone()),
                }),
                clock,
                listeners: Mutex::new(Listeners::default()),
                metrics: PoolMetrics::default(),
            }),
        }
    }

    /// Creates the pool's instances. Only the first successful call has any
    /// effect; the pool size is fixed afterwards.
    pub fn initialize(&self, config: PoolConfig) -> Result<(), Error> {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            if registry.initialized {
                debug!("pool already initialized, keeping existing instances");
                return Ok(());
            }
            config
                .validate()
                .err_tip(|| "while initializing the pool")?;
            let now = self.inner.clock.now();
            registry.instances = (0..config.pool_size)
                .map(|index| PoolInstance::new(InstanceId::for_index(index), now))
                .collect();
            info!(
                pool_size = config.pool_size,
                cleanup_on_return = config.cleanup_on_return,
                "pool initialized"
            );
            registry.config = config;
            registry.initialized = true;
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
        Ok(())
    }

    /// Claims an instance for `borrower_id`.
    ///
    /// An instance already warming for `url` is preferred; otherwise the
    /// first idle instance is taken. Returns `None` when neither exists.
    pub fn borrow(&self, borrower_id: &str, url: Option<&str>) -> Option<BorrowResult> {
        let (result, snapshot) = {
            let mut registry = self.inner.registry.lock();
            if !registry.initialized {
                error!(borrower_id, "borrow called before the pool was initialized");
                return None;
            }
            let warm_match = url.and_then(|url| {
                let index = registry.warming_for(url)?;
                registry.warm_up_timers.cancel(&url.to_string());
                Some(index)
            });
            let (index, warm_hit) = match warm_match {
                Some(index) => (index, true),
                None => {
                    let Some(index) = registry.first_with_status(InstanceStatus::Idle) else {
                        PoolMetrics::incr(&self.inner.metrics.exhaustions);
                        debug!(borrower_id, ?url, "pool exhausted");
                        return None;
                    };
                    (index, false)
                }
            };
            let now = self.inner.clock.now();
            let instance = &mut registry.instances[index];
            instance.lend(borrower_id, now);
            PoolMetrics::incr(&self.inner.metrics.borrows);
            if warm_hit {
                PoolMetrics::incr(&self.inner.metrics.warm_hits);
            }
            debug!(borrower_id, instance_id = %instance.id, warm_hit, "instance borrowed");
            let result = BorrowResult {
                instance_id: instance.id.clone(),
                resource: instance.resource.clone(),
                warm_hit,
            };
            (result, registry.snapshot())
        };
        self.inner.notify(&snapshot);
        Some(result)
    }

    /// Returns a borrowed instance. Anything else is ignored.
    pub fn release(&self, instance_id: &InstanceId) {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            let Some(index) = registry.position(instance_id) else {
                debug!(%instance_id, "release of unknown instance ignored");
                return;
            };
            let status = registry.instances[index].status;
            if status != InstanceStatus::Borrowed {
                debug!(%instance_id, %status, "release of instance that is not borrowed ignored");
                return;
            }
            registry.hand_back(index);
            PoolMetrics::incr(&self.inner.metrics.releases);
            debug!(
                %instance_id,
                status = %registry.instances[index].status,
                "instance released"
            );
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
    }

    /// Finishes the cleaning phase of an instance. Ignored unless the
    /// instance is cleaning.
    pub fn mark_idle(&self, instance_id: &InstanceId) {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            let Some(index) = registry.position(instance_id) else {
                debug!(%instance_id, "mark_idle of unknown instance ignored");
                return;
            };
            let instance = &mut registry.instances[index];
            if instance.status != InstanceStatus::Cleaning {
                debug!(%instance_id, status = %instance.status, "mark_idle ignored");
                return;
            }
            instance.reset_to_idle();
            debug!(%instance_id, "instance idle");
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
    }

    /// Preloads `url` into an idle instance so a later `borrow` with the same
    /// URL gets it already loaded.
    ///
    /// Warming a URL that is already warming returns a handle to the same
    /// instance. Returns `None` when no instance is idle, since warm-ups
    /// never preempt anything, and when there is no tokio runtime to run the
    /// expiry timer on.
    pub fn warm_up(&self, url: &str, options: WarmUpOptions) -> Option<WarmUpHandle> {
        let (handle, snapshot) = {
            let mut registry = self.inner.registry.lock();
            if !registry.initialized {
                error!(url, "warm_up called before the pool was initialized");
                return None;
            }
            if let Some(index) = registry.warming_for(url) {
                return Some(self.handle_for(url, &registry.instances[index].id));
            }
            let Some(index) = registry.first_with_status(InstanceStatus::Idle) else {
                debug!(url, "no idle instance to warm");
                return None;
            };
            let timeout = options
                .timeout
                .unwrap_or_else(|| registry.config.warm_up_timeout());

            // The expiry timer goes first so a failure leaves the instance idle.
            let weak_inner = Arc::downgrade(&self.inner);
            let scheduled = registry.warm_up_timers.schedule(
                url.to_string(),
                timeout,
                move |url, token| {
                    if let Some(inner) = weak_inner.upgrade() {
                        Self { inner }.expire_warm_up(&url, token);
                    }
                },
            );
            if let Err(err) = scheduled {
                error!(url, ?err, "could not schedule warm-up expiry, not warming");
                return None;
            }
            let instance = &mut registry.instances[index];
            instance.status = InstanceStatus::Warming;
            instance.warmed_url = Some(url.to_string());
            let handle = self.handle_for(url, &instance.id);
            PoolMetrics::incr(&self.inner.metrics.warm_ups_started);
            debug!(
                url,
                instance_id = %handle.instance_id,
                timeout_ms = timeout.as_millis() as u64,
                "warm-up started"
            );
            (handle, registry.snapshot())
        };
        self.inner.notify(&snapshot);
        Some(handle)
    }

    /// Returns the instance warming for `url` to the pool, exactly as an
    /// expiry would. No-op when nothing is warming for `url`.
    pub fn cancel_warm_up(&self, url: &str) {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            registry.warm_up_timers.cancel(&url.to_string());
            let Some(index) = registry.warming_for(url) else {
                debug!(url, "no warm-up to cancel");
                return;
            };
            registry.hand_back(index);
            PoolMetrics::incr(&self.inner.metrics.warm_ups_cancelled);
            debug!(url, "warm-up cancelled");
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
    }

    /// Cancels every pending warm-up.
    pub fn cancel_all_warm_ups(&self) {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            registry.warm_up_timers.cancel_all();
            let warming: Vec<usize> = (0..registry.instances.len())
                .filter(|&index| registry.instances[index].status == InstanceStatus::Warming)
                .collect();
            if warming.is_empty() {
                return;
            }
            for index in warming {
                registry.hand_back(index);
                PoolMetrics::incr(&self.inner.metrics.warm_ups_cancelled);
            }
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
    }

    fn expire_warm_up(&self, url: &str, token: TimerToken) {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            if !registry.warm_up_timers.claim(&url.to_string(), token) {
                return;
            }
            let Some(index) = registry.warming_for(url) else {
                return;
            };
            registry.hand_back(index);
            PoolMetrics::incr(&self.inner.metrics.warm_ups_expired);
            debug!(url, "warm-up expired unclaimed");
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
    }

    /// Destroys the registry. Pending warm-up timers are cancelled first and
    /// the pool must be initialized again before use.
    pub fn reset(&self) {
        let snapshot = {
            let mut registry = self.inner.registry.lock();
            registry.warm_up_timers.cancel_all();
            registry.instances.clear();
            registry.initialized = false;
            registry.config = PoolConfig::default();
            info!("pool reset");
            registry.snapshot()
        };
        self.inner.notify(&snapshot);
    }

    pub fn get_state(&self) -> PoolState {
        self.inner.registry.lock().snapshot()
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.registry.lock().config.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.registry.lock().initialized
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.inner.metrics
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Registers `listener` for every subsequent change. It stays registered
    /// until [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PoolState) + Send + Sync + 'static,
    {
        let mut listeners = self.inner.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            manager: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().entries.len()
    }

    fn handle_for(&self, url: &str, instance_id: &InstanceId) -> WarmUpHandle {
        WarmUpHandle {
            url: url.to_string(),
            instance_id: instance_id.clone(),
            manager: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("PoolManager")
            .field("initialized", &registry.initialized)
            .field("instances", &registry.instances)
            .field("pending_warm_ups", &registry.warm_up_timers.len())
            .finish_non_exhaustive()
    }
}

/// Registration returned by [`PoolManager::subscribe`].
///
/// Dropping it does not unsubscribe.
#[derive(Debug)]
#[must_use = "the listener stays registered until unsubscribe is called"]
pub struct Subscription {
    id: u64,
    manager: Weak<ManagerInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.manager.upgrade() {
            inner
                .listeners
                .lock()
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Reference to a pending (or already claimed) warm-up.
#[derive(Clone)]
pub struct WarmUpHandle {
    url: String,
    instance_id: InstanceId,
    manager: Weak<ManagerInner>,
}

impl WarmUpHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Same as [`PoolManager::cancel_warm_up`] for this handle's URL.
    pub fn cancel(&self) {
        if let Some(inner) = self.manager.upgrade() {
            PoolManager { inner }.cancel_warm_up(&self.url);
        }
    }
}

impl fmt::Debug for WarmUpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmUpHandle")
            .field("url", &self.url)
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}
