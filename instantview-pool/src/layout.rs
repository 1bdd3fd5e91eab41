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

use serde::{Deserialize, Serialize};

/// Placement of a surface in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Converts a raw `(x, y, width, height)` window measurement.
    ///
    /// Hosts report an empty or not-yet-laid-out view as zero sized, which
    /// means "no layout".
    pub fn from_measurement(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        let usable = [x, y, width, height].iter().all(|v| v.is_finite());
        if !usable || width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self::new(y, x, width, height))
    }
}

/// Reports where the holder of an instance is currently drawn.
pub trait LayoutProvider {
    /// Returns `None` until the host has a usable measurement.
    fn measure(&self) -> Option<Rect>;
}

impl<F> LayoutProvider for F
where
    F: Fn() -> Option<Rect>,
{
    fn measure(&self) -> Option<Rect> {
        self()
    }
}
