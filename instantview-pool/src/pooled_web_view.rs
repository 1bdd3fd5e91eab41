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

use tracing::{debug, warn};

use crate::constants::DECLARATIVE_BORROWER_PREFIX;
use crate::context::PoolContext;
use crate::instance::InstanceId;
use crate::layout::{LayoutProvider, Rect};
use crate::surface::{ContentProps, NavigationSink, SurfaceContent, WebSurface};

pub type PoolEventCallback = Arc<dyn Fn() + Send + Sync>;
pub type InstanceEventCallback = Arc<dyn Fn(&InstanceId) + Send + Sync>;

/// Mount options of a [`PooledWebView`].
#[derive(Clone, Default)]
pub struct PooledWebViewOptions {
    /// Borrower id to use. Generated when unset.
    pub pool_key: Option<String>,
    pub props: ContentProps,
    /// Fired when the pool had nothing to lend at mount time.
    pub on_pool_exhausted: Option<PoolEventCallback>,
    pub on_borrowed: Option<InstanceEventCallback>,
    pub on_returned: Option<InstanceEventCallback>,
}

impl PooledWebViewOptions {
    pub fn new(props: ContentProps) -> Self {
        Self {
            props,
            ..Self::default()
        }
    }
}

impl fmt::Debug for PooledWebViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledWebViewOptions")
            .field("pool_key", &self.pool_key)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

/// Unpooled surface used when the pool was exhausted at mount time.
#[derive(Debug)]
struct Fallback {
    surface: Arc<dyn WebSurface>,
    navigation: NavigationSink,
    rendered: SurfaceContent,
}

/// Declarative borrower: holds an instance from [`PooledWebView::mount`]
/// until it is dropped.
///
/// When the pool is exhausted it signals so and renders through a private
/// surface instead, with the same props.
pub struct PooledWebView {
    pool: PoolContext,
    borrower_id: String,
    instance_id: Option<InstanceId>,
    fallback: Option<Fallback>,
    on_returned: Option<InstanceEventCallback>,
}

impl PooledWebView {
    pub fn mount(pool: &PoolContext, options: PooledWebViewOptions) -> Self {
        let PooledWebViewOptions {
            pool_key,
            props,
            on_pool_exhausted,
            on_borrowed,
            on_returned,
        } = options;
        let borrower_id =
            pool_key.unwrap_or_else(|| pool.next_borrower_id(DECLARATIVE_BORROWER_PREFIX));
        let url = props.source.as_ref().and_then(|source| source.url());

        let mut view = Self {
            pool: pool.clone(),
            borrower_id,
            instance_id: None,
            fallback: None,
            on_returned,
        };
        match pool.borrow(&view.borrower_id, url) {
            Some(result) => {
                pool.set_instance_props(&result.instance_id, props);
                if let Some(on_borrowed) = &on_borrowed {
                    on_borrowed(&result.instance_id);
                }
                view.instance_id = Some(result.instance_id);
            }
            None => {
                warn!(
                    borrower_id = %view.borrower_id,
                    "pool exhausted, rendering with an unpooled surface"
                );
                if let Some(on_pool_exhausted) = &on_pool_exhausted {
                    on_pool_exhausted();
                }
                view.fallback = Some(view.create_fallback(&props));
            }
        }
        view
    }

    fn create_fallback(&self, props: &ContentProps) -> Fallback {
        let defaults = self.pool.config().default_content_props;
        let content = SurfaceContent::resolve(Some(props), &defaults);
        let navigation = NavigationSink::default();
        navigation.set(props.on_navigation_state_change.clone());
        let surface = self.pool.surface_factory().create(
            &InstanceId::unpooled(&self.borrower_id),
            &content,
            navigation.clone(),
        );
        Fallback {
            surface,
            navigation,
            rendered: content,
        }
    }

    pub fn borrower_id(&self) -> &str {
        &self.borrower_id
    }

    /// Pooled instance held by this view, if any.
    pub const fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    pub const fn is_pool_exhausted(&self) -> bool {
        self.fallback.is_some()
    }

    /// Surface currently showing this view's content.
    pub fn surface(&self) -> Option<Arc<dyn WebSurface>> {
        match (&self.instance_id, &self.fallback) {
            (Some(instance_id), _) => self.pool.resource(instance_id),
            (None, Some(fallback)) => Some(fallback.surface.clone()),
            (None, None) => None,
        }
    }

    /// Replaces this view's content properties.
    pub fn set_props(&mut self, props: ContentProps) {
        if let Some(instance_id) = &self.instance_id {
            self.pool.set_instance_props(instance_id, props);
            return;
        }
        let defaults = self.pool.config().default_content_props;
        if let Some(fallback) = &mut self.fallback {
            fallback
                .navigation
                .set(props.on_navigation_state_change.clone());
            let content = SurfaceContent::resolve(Some(&props), &defaults);
            if content != fallback.rendered {
                fallback.surface.render(&content);
                fallback.rendered = content;
            }
        }
    }

    /// Feeds a raw window measurement of the placeholder. Empty measurements
    /// are ignored.
    pub fn set_measurement(&self, x: f64, y: f64, width: f64, height: f64) {
        if let Some(rect) = Rect::from_measurement(x, y, width, height) {
            self.set_layout(rect);
        }
    }

    /// Measures the placeholder through `provider`.
    pub fn measure_with(&self, provider: &dyn LayoutProvider) {
        if let Some(rect) = provider.measure() {
            self.set_layout(rect);
        }
    }

    fn set_layout(&self, rect: Rect) {
        if let Some(instance_id) = &self.instance_id {
            self.pool.set_instance_layout(instance_id, Some(rect));
        }
    }

    /// Returns the instance to the pool. Same as dropping the view.
    pub fn unmount(mut self) {
        self.deactivate();
    }

    fn deactivate(&mut self) {
        if let Some(instance_id) = self.instance_id.take() {
            self.pool.set_instance_layout(&instance_id, None);
            self.pool.release(&instance_id);
            debug!(borrower_id = %self.borrower_id, %instance_id, "pooled view unmounted");
            if let Some(on_returned) = &self.on_returned {
                on_returned(&instance_id);
            }
        }
        self.fallback = None;
    }
}

impl Drop for PooledWebView {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for PooledWebView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledWebView")
            .field("borrower_id", &self.borrower_id)
            .field("instance_id", &self.instance_id)
            .field("pool_exhausted", &self.is_pool_exhausted())
            .finish_non_exhaustive()
    }
}
