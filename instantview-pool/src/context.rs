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
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::collections::HashMap;
use std::sync::Arc;

use instantview_config::PoolConfig;
use instantview_error::{Error, ResultExt};
use instantview_util::keyed_timers::{KeyedTimers, TimerToken};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::detach::ViewDetacher;
use crate::instance::{BorrowResult, InstanceId, InstanceStatus, PoolInstance, PoolState};
use crate::layout::Rect;
use crate::manager::{PoolManager, Subscription, WarmUpHandle, WarmUpOptions};
use crate::slot::{CleaningEdge, SlotBinder, SlotFrame, SlotInputs};
use crate::surface::{ContentProps, SurfaceFactory, WebSurface};

/// Everything a renderer needs after a redistribution.
#[derive(Debug, Clone, Default)]
pub struct PoolView {
    pub state: PoolState,
    pub frames: Vec<SlotFrame>,
    /// Incremented on every publish.
    pub revision: u64,
}

/// Shares one [`PoolManager`] with any number of consumers and keeps the
/// per-instance layout and content maps the slots render from.
///
/// Every change to the pool or to either map re-evaluates all slots and
/// publishes a new [`PoolView`].
#[derive(Clone)]
pub struct PoolContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    manager: PoolManager,
    factory: Arc<dyn SurfaceFactory>,
    detacher: Arc<dyn ViewDetacher>,
    layouts: RwLock<HashMap<InstanceId, Rect>>,
    props: RwLock<HashMap<InstanceId, ContentProps>>,
    slots: Mutex<SlotTable>,
    /// Set when a redistribution was requested while one was running.
    dirty: AtomicBool,
    view: watch::Sender<PoolView>,
    subscription: Mutex<Option<Subscription>>,
    next_borrower: AtomicU64,
}

struct SlotTable {
    slots: Vec<SlotBinder>,
    /// Grace timers of cleaning instances.
    cleanup_timers: KeyedTimers<InstanceId>,
}

impl SlotTable {
    /// Rebuilds the slots when the registry's instances changed identity.
    fn sync(&mut self, instances: &[PoolInstance]) {
        let unchanged = self.slots.len() == instances.len()
            && self
                .slots
                .iter()
                .zip(instances)
                .all(|(slot, instance)| slot.instance_id() == &instance.id);
        if unchanged {
            return;
        }
        debug!(slots = instances.len(), "rebuilding slots");
        self.cleanup_timers.cancel_all();
        self.slots = instances.iter().map(SlotBinder::new).collect();
    }
}

impl PoolContext {
    /// Initializes `manager` with `config` (a no-op if it already is) and
    /// binds a slot to each of its instances.
    ///
    /// `detacher` is usually the result of
    /// [`select_detacher`](crate::detach::select_detacher).
    pub fn new(
        manager: PoolManager,
        config: PoolConfig,
        factory: Arc<dyn SurfaceFactory>,
        detacher: Arc<dyn ViewDetacher>,
    ) -> Result<Self, Error> {
        manager
            .initialize(config)
            .err_tip(|| "while creating the pool context")?;
        let (view, _) = watch::channel(PoolView::default());
        let inner = Arc::new(ContextInner {
            slots: Mutex::new(SlotTable {
                slots: Vec::new(),
                cleanup_timers: KeyedTimers::new(manager.clock()),
            }),
            manager,
            factory,
            detacher,
            layouts: RwLock::new(HashMap::new()),
            props: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            view,
            subscription: Mutex::new(None),
            next_borrower: AtomicU64::new(0),
        });
        let weak_inner = Arc::downgrade(&inner);
        let subscription = inner.manager.subscribe(move |_state| {
            if let Some(inner) = weak_inner.upgrade() {
                inner.redistribute();
            }
        });
        *inner.subscription.lock() = Some(subscription);
        inner.redistribute();
        Ok(Self { inner })
    }

    pub fn manager(&self) -> &PoolManager {
        &self.inner.manager
    }

    pub fn state(&self) -> PoolState {
        self.inner.manager.get_state()
    }

    /// Effective configuration of the shared pool.
    pub fn config(&self) -> PoolConfig {
        self.inner.manager.config()
    }

    pub fn borrow(&self, borrower_id: &str, url: Option<&str>) -> Option<BorrowResult> {
        self.inner.manager.borrow(borrower_id, url)
    }

    /// Forgets the layout and content of `instance_id`, then returns it to
    /// the pool.
    pub fn release(&self, instance_id: &InstanceId) {
        self.inner.layouts.write().remove(instance_id);
        self.inner.props.write().remove(instance_id);
        self.inner.manager.release(instance_id);
        self.inner.redistribute();
    }

    pub fn warm_up(&self, url: &str, options: WarmUpOptions) -> Option<WarmUpHandle> {
        self.inner.manager.warm_up(url, options)
    }

    pub fn cancel_warm_up(&self, url: &str) {
        self.inner.manager.cancel_warm_up(url);
    }

    /// Records where the holder of `instance_id` is drawn. `None` hides it.
    pub fn set_instance_layout(&self, instance_id: &InstanceId, layout: Option<Rect>) {
        {
            let mut layouts = self.inner.layouts.write();
            match layout {
                Some(rect) => layouts.insert(instance_id.clone(), rect),
                None => layouts.remove(instance_id),
            };
        }
        self.inner.redistribute();
    }

    pub fn set_instance_props(&self, instance_id: &InstanceId, props: ContentProps) {
        self.inner
            .props
            .write()
            .insert(instance_id.clone(), props);
        self.inner.redistribute();
    }

    pub fn instance_layout(&self, instance_id: &InstanceId) -> Option<Rect> {
        self.inner.layouts.read().get(instance_id).copied()
    }

    pub fn instance_props(&self, instance_id: &InstanceId) -> Option<ContentProps> {
        self.inner.props.read().get(instance_id).cloned()
    }

    /// Surface of `instance_id`, once its slot has created one.
    pub fn resource(&self, instance_id: &InstanceId) -> Option<Arc<dyn WebSurface>> {
        self.state()
            .instance(instance_id)
            .and_then(|instance| instance.resource.get())
    }

    pub fn surface_factory(&self) -> &Arc<dyn SurfaceFactory> {
        &self.inner.factory
    }

    /// Receiver of every published [`PoolView`].
    pub fn watch(&self) -> watch::Receiver<PoolView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> PoolView {
        self.inner.view.borrow().clone()
    }

    pub fn frames(&self) -> Vec<SlotFrame> {
        self.inner.view.borrow().frames.clone()
    }

    /// Cancels every pending warm-up, then stops following the manager.
    ///
    /// Warm-ups are cancelled while still subscribed so their surfaces get
    /// the cleanup script. Instances still cleaning then skip the rest of
    /// their grace period and go idle, leaving the manager fully available
    /// to whoever binds it next.
    pub fn shutdown(&self) {
        self.inner.manager.cancel_all_warm_ups();
        self.inner.unsubscribe();
        let cleaning: Vec<InstanceId> = {
            let mut table = self.inner.slots.lock();
            table.cleanup_timers.cancel_all();
            self.state()
                .instances
                .into_iter()
                .filter(|instance| instance.status == InstanceStatus::Cleaning)
                .map(|instance| instance.id)
                .collect()
        };
        for instance_id in &cleaning {
            self.inner.manager.mark_idle(instance_id);
        }
        debug!(skipped_grace = cleaning.len(), "pool context shut down");
    }

    pub(crate) fn next_borrower_id(&self, prefix: &str) -> String {
        let n = self.inner.next_borrower.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }
}

impl ContextInner {
    /// Re-evaluates every slot and publishes the result.
    ///
    /// Slots call into host code, which may change the pool again. Such a
    /// nested request only marks the context dirty; the outermost call loops
    /// until nothing is left to apply.
    fn redistribute(self: &Arc<Self>) {
        self.dirty.store(true, Ordering::Release);
        loop {
            let Some(mut table) = self.slots.try_lock() else {
                return;
            };
            while self.dirty.swap(false, Ordering::AcqRel) {
                self.render(&mut table);
            }
            drop(table);
            if !self.dirty.load(Ordering::Acquire) {
                return;
            }
        }
    }

    fn render(self: &Arc<Self>, table: &mut SlotTable) {
        let state = self.manager.get_state();
        let config = self.manager.config();
        table.sync(&state.instances);
        let layouts = self.layouts.read().clone();
        let props = self.props.read().clone();

        let SlotTable {
            slots,
            cleanup_timers,
        } = table;
        let mut frames = Vec::with_capacity(slots.len());
        let mut skip_grace = Vec::new();
        for (slot, instance) in slots.iter_mut().zip(&state.instances) {
            let edge = slot.apply(SlotInputs {
                instance,
                layout: layouts.get(&instance.id).copied(),
                props: props.get(&instance.id),
                config: &config,
                factory: self.factory.as_ref(),
                detacher: self.detacher.as_ref(),
            });
            match edge {
                Some(CleaningEdge::Entered) => {
                    let weak_inner = Arc::downgrade(self);
                    let scheduled = cleanup_timers.schedule(
                        instance.id.clone(),
                        config.cleanup_grace_delay(),
                        move |instance_id, token| {
                            if let Some(inner) = weak_inner.upgrade() {
                                inner.finish_cleanup(&instance_id, token);
                            }
                        },
                    );
                    if let Err(err) = scheduled {
                        error!(
                            instance_id = %instance.id,
                            ?err,
                            "could not schedule cleanup grace period, skipping it"
                        );
                        skip_grace.push(instance.id.clone());
                    }
                }
                Some(CleaningEdge::Left) => {
                    cleanup_timers.cancel(&instance.id);
                }
                None => {}
            }
            frames.push(slot.frame().clone());
        }

        self.view.send_modify(|view| {
            view.state = state;
            view.frames = frames;
            view.revision += 1;
        });

        // Re-enters through the subscription, which only marks us dirty.
        for instance_id in skip_grace {
            self.manager.mark_idle(&instance_id);
        }
    }

    fn finish_cleanup(self: &Arc<Self>, instance_id: &InstanceId, token: TimerToken) {
        let claimed = self.slots.lock().cleanup_timers.claim(instance_id, token);
        if claimed {
            debug!(%instance_id, "cleanup grace period over");
            self.manager.mark_idle(instance_id);
        }
        // Picks up a redistribution skipped while the claim held the lock.
        if self.dirty.load(Ordering::Acquire) {
            self.redistribute();
        }
    }

    fn unsubscribe(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for PoolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolContext")
            .field("manager", &self.inner.manager)
            .field("layouts", &self.inner.layouts.read().len())
            .field("props", &self.inner.props.read().len())
            .finish_non_exhaustive()
    }
}
