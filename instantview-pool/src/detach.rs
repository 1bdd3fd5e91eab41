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
use std::sync::Arc;

use tracing::debug;

use crate::instance::InstanceId;
use crate::surface::WebSurface;

/// Platform capability that moves a surface's native view out of and back
/// into the view tree without destroying it.
///
/// Both operations are fire-and-forget.
pub trait ViewDetacher: Debug + Send + Sync + 'static {
    fn is_available(&self) -> bool;

    fn detach(&self, surface: &Arc<dyn WebSurface>);

    /// Reinserts `surface` under the container of slot `container`.
    fn attach(&self, surface: &Arc<dyn WebSurface>, container: &InstanceId);
}

/// Used when the platform has no detach capability. Hidden surfaces then
/// stay in the tree, positioned off-screen.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDetacher;

impl ViewDetacher for NoopDetacher {
    fn is_available(&self) -> bool {
        false
    }

    fn detach(&self, _surface: &Arc<dyn WebSurface>) {}

    fn attach(&self, _surface: &Arc<dyn WebSurface>, _container: &InstanceId) {}
}

/// Picks the detacher once at startup.
pub fn select_detacher(native: Option<Arc<dyn ViewDetacher>>) -> Arc<dyn ViewDetacher> {
    match native {
        Some(detacher) if detacher.is_available() => detacher,
        _ => {
            debug!("native view detachment unavailable, using off-screen positioning only");
            Arc::new(NoopDetacher)
        }
    }
}
