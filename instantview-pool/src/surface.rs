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

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::instance::InstanceId;

/// What a surface displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Uri(String),
    Html(String),
}

impl Source {
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri(uri.into())
    }

    /// Empty document shown by instances nobody is using.
    pub const fn blank() -> Self {
        Self::Html(String::new())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Html(html) if html.is_empty())
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Uri(uri) => Some(uri),
            Self::Html(_) => None,
        }
    }
}

/// Navigation progress reported by a surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub url: String,
    pub title: String,
    pub loading: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

pub type NavigationCallback = Arc<dyn Fn(&NavigationState) + Send + Sync>;

/// Per-borrower content properties.
#[derive(Clone, Default)]
pub struct ContentProps {
    pub source: Option<Source>,
    pub on_navigation_state_change: Option<NavigationCallback>,
    /// Free-form surface properties. Merged over the pool defaults.
    pub extra: Map<String, Value>,
}

impl ContentProps {
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_uri(self, uri: impl Into<String>) -> Self {
        self.with_source(Source::uri(uri))
    }

    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn on_navigation_state_change(
        mut self,
        callback: impl Fn(&NavigationState) + Send + Sync + 'static,
    ) -> Self {
        self.on_navigation_state_change = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ContentProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentProps")
            .field("source", &self.source)
            .field(
                "on_navigation_state_change",
                &self.on_navigation_state_change.is_some(),
            )
            .field("extra", &self.extra)
            .finish()
    }
}

/// Fully resolved input for one render of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceContent {
    pub source: Source,
    pub props: Map<String, Value>,
}

impl SurfaceContent {
    pub fn blank(defaults: &Map<String, Value>) -> Self {
        Self {
            source: Source::blank(),
            props: defaults.clone(),
        }
    }

    /// Content for `props` layered over `defaults`. A missing source renders
    /// the blank document.
    pub fn resolve(props: Option<&ContentProps>, defaults: &Map<String, Value>) -> Self {
        let mut merged = defaults.clone();
        let mut source = None;
        if let Some(props) = props {
            merged.extend(props.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            source.clone_from(&props.source);
        }
        Self {
            source: source.unwrap_or_else(Source::blank),
            props: merged,
        }
    }
}

/// Forwards navigation events from a surface to whichever callback is
/// currently installed.
///
/// Surfaces keep the sink they were created with for their whole life; the
/// owner swaps the callback underneath as borrowers come and go.
#[derive(Clone, Default)]
pub struct NavigationSink {
    callback: Arc<RwLock<Option<NavigationCallback>>>,
}

impl NavigationSink {
    pub fn emit(&self, state: &NavigationState) {
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(state);
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.read().is_some()
    }

    pub(crate) fn set(&self, callback: Option<NavigationCallback>) {
        *self.callback.write() = callback;
    }
}

impl fmt::Debug for NavigationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationSink")
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

/// A platform browser surface.
pub trait WebSurface: fmt::Debug + Send + Sync + 'static {
    /// Shows `content`. Only called when it differs from the last render.
    fn render(&self, content: &SurfaceContent);

    /// Runs `script` in the currently loaded document.
    fn inject_script(&self, script: &str);
}

/// Creates platform surfaces on demand.
pub trait SurfaceFactory: fmt::Debug + Send + Sync + 'static {
    /// Creates a surface showing `content`. Navigation events must be
    /// reported through `navigation`.
    fn create(
        &self,
        instance_id: &InstanceId,
        content: &SurfaceContent,
        navigation: NavigationSink,
    ) -> Arc<dyn WebSurface>;
}
