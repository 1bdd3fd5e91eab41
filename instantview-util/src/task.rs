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

use core::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
pub use tracing::error_span as __error_span;
use tracing::{Instrument, Span};

pub fn __spawn_on_with_span<F, T>(runtime: &Handle, f: F, span: Span) -> JoinHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    runtime.spawn(f.instrument(span))
}

/// Spawns a detached task on `runtime`, wrapped in a named error span.
///
/// Taking the runtime explicitly lets callers spawn from threads that are
/// not part of it.
#[macro_export]
macro_rules! background_spawn {
    (on: $runtime:expr, $name:expr, $fut:expr) => {{
        $crate::task::__spawn_on_with_span($runtime, $fut, $crate::task::__error_span!($name))
    }};
    (on: $runtime:expr, $name:expr, $fut:expr, $($fields:tt)*) => {{
        $crate::task::__spawn_on_with_span(
            $runtime,
            $fut,
            $crate::task::__error_span!($name, $($fields)*),
        )
    }};
}
