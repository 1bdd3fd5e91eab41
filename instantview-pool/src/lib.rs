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

//! Fixed-size pool of embedded browser surfaces.
//!
//! A [`PoolManager`] owns the instances and their state machine (idle,
//! borrowed, cleaning, warming). A [`PoolContext`] shares one manager with
//! any number of consumers, keeps the layout and content each holder wants,
//! and binds every instance to a slot that creates its surface lazily,
//! positions it, picks its content and wipes it between borrowers.
//!
//! Borrowers use one of three facades: [`PooledWebView`] borrows for its
//! whole lifetime, [`PooledWebViewHandle`] borrows and releases on request,
//! and [`WarmUpController`] only preloads URLs.

pub mod constants;
pub mod context;
pub mod detach;
pub mod instance;
pub mod layout;
pub mod manager;
pub mod metrics;
pub mod pooled_handle;
pub mod pooled_web_view;
pub mod slot;
pub mod surface;
pub mod warm_up;

pub use context::{PoolContext, PoolView};
pub use detach::{NoopDetacher, ViewDetacher, select_detacher};
pub use instance::{
    BorrowResult, InstanceId, InstanceStatus, PoolInstance, PoolState, ResourceHandle,
};
pub use layout::{LayoutProvider, Rect};
pub use manager::{PoolListener, PoolManager, Subscription, WarmUpHandle, WarmUpOptions};
pub use metrics::{PoolMetrics, PoolMetricsSnapshot};
pub use pooled_handle::PooledWebViewHandle;
pub use pooled_web_view::{PooledWebView, PooledWebViewOptions};
pub use slot::{ContainerStyle, SlotFrame};
pub use surface::{
    ContentProps, NavigationCallback, NavigationSink, NavigationState, Source, SurfaceContent,
    SurfaceFactory, WebSurface,
};
pub use warm_up::WarmUpController;
