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

//! Pool of embedded browser surfaces that are created once and lent to
//! borrowers, so showing a page never pays for creating a browser.
//!
//! This crate bundles the workspace members. Most users only need the
//! re-exported pool types:
//!
//! ```ignore
//! let context = PoolContext::new(
//!     PoolManager::default(),
//!     PoolConfig::try_from_json5_file("pool.json5")?,
//!     factory,
//!     select_detacher(native_detacher),
//! )?;
//! let view = PooledWebView::mount(&context, PooledWebViewOptions::new(props));
//! ```

pub use instantview_config as config;
pub use instantview_config::PoolConfig;
pub use instantview_error as error;
pub use instantview_error::{Code, Error};
pub use instantview_pool as pool;
pub use instantview_pool::{
    BorrowResult, ContentProps, InstanceId, InstanceStatus, NoopDetacher, PoolContext,
    PoolManager, PoolState, PoolView, PooledWebView, PooledWebViewHandle, PooledWebViewOptions,
    Rect, Source, SurfaceContent, SurfaceFactory, ViewDetacher, WarmUpController, WarmUpHandle,
    WarmUpOptions, WebSurface, select_detacher,
};
pub use instantview_util as util;
pub use instantview_util::init_tracing;
