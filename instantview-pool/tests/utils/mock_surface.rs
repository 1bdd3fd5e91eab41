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

#![allow(dead_code, reason = "each test binary uses a subset of these helpers")]

use core::time::Duration;
use std::sync::Arc;

use instantview_config::PoolConfig;
use instantview_error::Error;
use instantview_pool::{
    InstanceId, InstanceStatus, NavigationSink, NavigationState, PoolContext, PoolManager, Source,
    SurfaceContent, SurfaceFactory, ViewDetacher, WebSurface,
};
use instantview_util::clock::MockClock;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SurfaceEvent {
    Render(SurfaceContent),
    Script(String),
}

#[derive(Debug)]
pub(crate) struct MockSurface {
    pub(crate) instance_id: InstanceId,
    pub(crate) initial: SurfaceContent,
    navigation: NavigationSink,
    events: Mutex<Vec<SurfaceEvent>>,
}

impl MockSurface {
    pub(crate) fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::Script(script) => Some(script),
                SurfaceEvent::Render(_) => None,
            })
            .collect()
    }

    pub(crate) fn renders(&self) -> Vec<SurfaceContent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::Render(content) => Some(content),
                SurfaceEvent::Script(_) => None,
            })
            .collect()
    }

    /// Content currently displayed.
    pub(crate) fn current(&self) -> SurfaceContent {
        self.renders()
            .pop()
            .unwrap_or_else(|| self.initial.clone())
    }

    pub(crate) fn current_source(&self) -> Source {
        self.current().source
    }

    pub(crate) fn navigate(&self, url: &str) {
        self.navigation.emit(&NavigationState {
            url: url.to_string(),
            ..NavigationState::default()
        });
    }
}

impl WebSurface for MockSurface {
    fn render(&self, content: &SurfaceContent) {
        self.events
            .lock()
            .push(SurfaceEvent::Render(content.clone()));
    }

    fn inject_script(&self, script: &str) {
        self.events
            .lock()
            .push(SurfaceEvent::Script(script.to_string()));
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockSurfaceFactory {
    created: Mutex<Vec<Arc<MockSurface>>>,
}

impl MockSurfaceFactory {
    pub(crate) fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub(crate) fn surface(&self, instance_id: &InstanceId) -> Option<Arc<MockSurface>> {
        self.created
            .lock()
            .iter()
            .find(|surface| &surface.instance_id == instance_id)
            .cloned()
    }
}

impl SurfaceFactory for MockSurfaceFactory {
    fn create(
        &self,
        instance_id: &InstanceId,
        content: &SurfaceContent,
        navigation: NavigationSink,
    ) -> Arc<dyn WebSurface> {
        let surface = Arc::new(MockSurface {
            instance_id: instance_id.clone(),
            initial: content.clone(),
            navigation,
            events: Mutex::new(Vec::new()),
        });
        self.created.lock().push(surface.clone());
        surface
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DetachEvent {
    Detach,
    Attach(InstanceId),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingDetacher {
    events: Mutex<Vec<DetachEvent>>,
}

impl RecordingDetacher {
    pub(crate) fn events(&self) -> Vec<DetachEvent> {
        self.events.lock().clone()
    }
}

impl ViewDetacher for RecordingDetacher {
    fn is_available(&self) -> bool {
        true
    }

    fn detach(&self, _surface: &Arc<dyn WebSurface>) {
        self.events.lock().push(DetachEvent::Detach);
    }

    fn attach(&self, _surface: &Arc<dyn WebSurface>, container: &InstanceId) {
        self.events
            .lock()
            .push(DetachEvent::Attach(container.clone()));
    }
}

pub(crate) struct TestPool {
    pub(crate) manager: PoolManager,
    pub(crate) context: PoolContext,
    pub(crate) factory: Arc<MockSurfaceFactory>,
    pub(crate) detacher: Arc<RecordingDetacher>,
}

pub(crate) fn make_manager(config: PoolConfig) -> Result<PoolManager, Error> {
    let manager = PoolManager::new(Arc::new(MockClock));
    manager.initialize(config)?;
    Ok(manager)
}

pub(crate) fn make_pool(config: PoolConfig) -> Result<TestPool, Error> {
    let manager = PoolManager::new(Arc::new(MockClock));
    let factory = Arc::new(MockSurfaceFactory::default());
    let detacher = Arc::new(RecordingDetacher::default());
    let context = PoolContext::new(
        manager.clone(),
        config,
        factory.clone(),
        detacher.clone(),
    )?;
    Ok(TestPool {
        manager,
        context,
        factory,
        detacher,
    })
}

pub(crate) fn pool_config(pool_size: usize, cleanup_on_return: bool) -> PoolConfig {
    PoolConfig {
        pool_size,
        cleanup_on_return,
        ..PoolConfig::default()
    }
}

/// Lets spawned timer tasks observe the mock clock.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub(crate) async fn advance(duration: Duration) {
    MockClock::advance(duration);
    settle().await;
}

pub(crate) fn status_of(manager: &PoolManager, instance_id: &str) -> Option<InstanceStatus> {
    manager
        .get_state()
        .instance(&InstanceId::from(instance_id))
        .map(|instance| instance.status)
}
