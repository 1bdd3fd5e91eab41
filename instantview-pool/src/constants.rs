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

/// Injected when an instance enters the cleaning phase and no custom script
/// is configured. Resets scrolling, clears pending timeouts and intervals,
/// and empties the document body. Errors are swallowed inside the page.
pub const CLEANUP_SCRIPT: &str = r"
(function() {
  try {
    window.scrollTo(0, 0);
    var highestTimeoutId = setTimeout(function(){}, 0);
    for (var i = 0; i < highestTimeoutId; i++) {
      clearTimeout(i);
    }
    var highestIntervalId = setInterval(function(){}, 0);
    for (var j = 0; j < highestIntervalId; j++) {
      clearInterval(j);
    }
    if (document.body) {
      document.body.innerHTML = '';
    }
  } catch (e) {}
  true;
})();
";

/// Coordinate used for both axes of a hidden slot container.
pub const HIDDEN_OFFSET: f64 = -9999.0;

/// Prefix of borrower ids generated for the declarative facade.
pub const DECLARATIVE_BORROWER_PREFIX: &str = "borrower";

/// Prefix of borrower ids generated for the imperative facade.
pub const IMPERATIVE_BORROWER_PREFIX: &str = "hook-borrower";
