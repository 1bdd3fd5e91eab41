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

use instantview_config::PoolConfig;
use tracing::{debug, trace};

use crate::constants::{CLEANUP_SCRIPT, HIDDEN_OFFSET};
use crate::detach::ViewDetacher;
use crate::instance::{InstanceId, InstanceStatus, PoolInstance, ResourceHandle};
use crate::layout::Rect;
use crate::surface::{ContentProps, NavigationSink, Source, SurfaceContent, SurfaceFactory};

/// Placement of a slot's container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerStyle {
    pub rect: Rect,
    pub opacity: f32,
    /// Whether the container may receive input.
    pub pointer_events: bool,
}

impl ContainerStyle {
    /// Off-screen, zero sized and transparent. The surface keeps running.
    pub const HIDDEN: Self = Self {
        rect: Rect::new(HIDDEN_OFFSET, HIDDEN_OFFSET, 0.0, 0.0),
        opacity: 0.0,
        pointer_events: false,
    };

    pub const fn visible(rect: Rect) -> Self {
        Self {
            rect,
            opacity: 1.0,
            pointer_events: true,
        }
    }

    pub const fn is_visible(&self) -> bool {
        self.pointer_events
    }
}

/// Rendering decision for one slot, published after every redistribution.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFrame {
    pub instance_id: InstanceId,
    pub status: InstanceStatus,
    pub container: ContainerStyle,
    pub materialized: bool,
    pub source: Source,
}

/// Transition of a slot across the cleaning phase boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningEdge {
    Entered,
    Left,
}

/// Everything a slot needs to re-evaluate itself.
#[derive(Debug, Clone, Copy)]
pub struct SlotInputs<'a> {
    pub instance: &'a PoolInstance,
    pub layout: Option<Rect>,
    pub props: Option<&'a ContentProps>,
    pub config: &'a PoolConfig,
    pub factory: &'a dyn SurfaceFactory,
    pub detacher: &'a dyn ViewDetacher,
}

/// Content an instance should display in its current state.
///
/// Warming instances show the warmed URL. Borrowed instances show their
/// borrower's source, or the warmed URL they were claimed with until the
/// borrower supplies one. Everything else shows the blank document.
/// Borrower properties only apply while borrowed and always override the
/// configured defaults.
pub fn select_content(
    instance: &PoolInstance,
    props: Option<&ContentProps>,
    config: &PoolConfig,
) -> SurfaceContent {
    let warmed = || instance.warmed_url.clone().map(Source::Uri);
    match instance.status {
        InstanceStatus::Warming => SurfaceContent {
            source: warmed().unwrap_or_else(Source::blank),
            props: config.default_content_props.clone(),
        },
        InstanceStatus::Borrowed => {
            let mut content = SurfaceContent::resolve(props, &config.default_content_props);
            if props.and_then(|props| props.source.as_ref()).is_none() {
                if let Some(source) = warmed() {
                    content.source = source;
                }
            }
            content
        }
        InstanceStatus::Idle | InstanceStatus::Cleaning => {
            SurfaceContent::blank(&config.default_content_props)
        }
    }
}

/// Binds one pool instance to its surface and placement.
///
/// The surface is created lazily, the first time the instance is borrowed or
/// warmed with a source to display, and then lives as long as the slot.
pub struct SlotBinder {
    instance_id: InstanceId,
    resource: ResourceHandle,
    navigation: NavigationSink,
    last_status: Option<InstanceStatus>,
    attached: bool,
    rendered: Option<SurfaceContent>,
    frame: SlotFrame,
}

impl SlotBinder {
    pub fn new(instance: &PoolInstance) -> Self {
        Self {
            instance_id: instance.id.clone(),
            resource: instance.resource.clone(),
            navigation: NavigationSink::default(),
            last_status: None,
            attached: false,
            rendered: None,
            frame: SlotFrame {
                instance_id: instance.id.clone(),
                status: instance.status,
                container: ContainerStyle::HIDDEN,
                materialized: instance.resource.is_materialized(),
                source: Source::blank(),
            },
        }
    }

    pub const fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub const fn frame(&self) -> &SlotFrame {
        &self.frame
    }

    pub const fn navigation(&self) -> &NavigationSink {
        &self.navigation
    }

    /// Re-evaluates the slot. Returns the cleaning edge crossed since the
    /// previous call, if any; the caller owns the grace timer.
    pub fn apply(&mut self, inputs: SlotInputs<'_>) -> Option<CleaningEdge> {
        let instance = inputs.instance;
        let status = instance.status;
        let content = select_content(instance, inputs.props, inputs.config);

        let wants_surface = matches!(status, InstanceStatus::Borrowed | InstanceStatus::Warming);
        // A surface is never created without real content to load.
        if wants_surface && !content.source.is_blank() && !self.resource.is_materialized() {
            let surface =
                inputs
                    .factory
                    .create(&self.instance_id, &content, self.navigation.clone());
            if self.resource.materialize(surface) {
                debug!(instance_id = %self.instance_id, %status, "surface materialized");
                self.rendered = Some(content.clone());
                self.attached = true;
            }
        }

        self.navigation.set(
            inputs
                .props
                .and_then(|props| props.on_navigation_state_change.clone()),
        );

        let was_cleaning = self.last_status == Some(InstanceStatus::Cleaning);
        let is_cleaning = status == InstanceStatus::Cleaning;
        let edge = match (was_cleaning, is_cleaning) {
            (false, true) => Some(CleaningEdge::Entered),
            (true, false) => Some(CleaningEdge::Left),
            _ => None,
        };

        if let Some(surface) = self.resource.get() {
            if edge == Some(CleaningEdge::Entered) {
                let script = inputs
                    .config
                    .custom_cleanup_script
                    .as_deref()
                    .unwrap_or(CLEANUP_SCRIPT);
                debug!(instance_id = %self.instance_id, "injecting cleanup script");
                surface.inject_script(script);
            }
            if self.rendered.as_ref() != Some(&content) {
                trace!(instance_id = %self.instance_id, source = ?content.source, "rendering");
                surface.render(&content);
                self.rendered = Some(content.clone());
            }
            if wants_surface && !self.attached {
                inputs.detacher.attach(&surface, &self.instance_id);
                self.attached = true;
            } else if !wants_surface && self.attached {
                inputs.detacher.detach(&surface);
                self.attached = false;
            }
        }

        let visible = status == InstanceStatus::Borrowed;
        self.frame = SlotFrame {
            instance_id: self.instance_id.clone(),
            status,
            container: match inputs.layout {
                Some(rect) if visible => ContainerStyle::visible(rect),
                _ => ContainerStyle::HIDDEN,
            },
            materialized: self.resource.is_materialized(),
            source: content.source,
        };
        self.last_status = Some(status);
        edge
    }
}

impl fmt::Debug for SlotBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotBinder")
            .field("instance_id", &self.instance_id)
            .field("last_status", &self.last_status)
            .field("attached", &self.attached)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}
