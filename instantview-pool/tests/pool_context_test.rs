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

use core::time::Duration;
use std::sync::Arc;

mod utils {
    pub(crate) mod mock_surface;
}

use instantview_config::PoolConfig;
use instantview_error::Error;
use instantview_macro::instantview_test;
use instantview_pool::constants::CLEANUP_SCRIPT;
use instantview_pool::{
    ContainerStyle, ContentProps, InstanceId, InstanceStatus, NoopDetacher, PoolContext,
    PoolManager, Rect, Source, SurfaceContent, ViewDetacher, WarmUpOptions, select_detacher,
};
use instantview_util::clock::MockClock;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use utils::mock_surface::{
    DetachEvent, MockSurfaceFactory, RecordingDetacher, SurfaceEvent, advance, make_pool,
    pool_config, status_of,
};

const URL: &str = "https://x";

fn props_for(url: &str) -> ContentProps {
    ContentProps::default().with_uri(url)
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("json object")
}

#[instantview_test]
async fn surfaces_are_created_lazily_and_kept() -> Result<(), Error> {
    let pool = make_pool(pool_config(3, true))?;
    assert_eq!(pool.factory.created_count(), 0);
    let frames = pool.context.frames();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|frame| !frame.materialized));

    let result = pool.context.borrow("a", None).expect("instance available");
    assert_eq!(pool.factory.created_count(), 0);
    assert!(!result.resource.is_materialized());

    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    assert_eq!(pool.factory.created_count(), 1);
    assert!(result.resource.is_materialized());
    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");
    assert_eq!(surface.initial.source, Source::uri(URL));
    assert!(surface.renders().is_empty());
    assert!(pool.context.frames()[0].materialized);
    assert!(pool.context.resource(&result.instance_id).is_some());

    pool.context.release(&result.instance_id);
    pool.manager.mark_idle(&result.instance_id);
    let again = pool.context.borrow("b", None).expect("instance available");
    assert_eq!(again.instance_id, result.instance_id);
    pool.context
        .set_instance_props(&again.instance_id, props_for("https://y"));

    assert_eq!(pool.factory.created_count(), 1);
    assert_eq!(surface.current_source(), Source::uri("https://y"));
    Ok(())
}

#[instantview_test]
async fn only_borrowed_instances_with_layout_are_visible() -> Result<(), Error> {
    let pool = make_pool(pool_config(2, false))?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    assert_eq!(pool.context.frames()[0].container, ContainerStyle::HIDDEN);

    let rect = Rect::new(10.0, 20.0, 300.0, 400.0);
    pool.context
        .set_instance_layout(&result.instance_id, Some(rect));
    let frame = pool.context.frames()[0].clone();
    assert_eq!(frame.status, InstanceStatus::Borrowed);
    assert_eq!(frame.container, ContainerStyle::visible(rect));
    assert!(frame.container.is_visible());

    pool.context.set_instance_layout(&result.instance_id, None);
    assert_eq!(pool.context.frames()[0].container, ContainerStyle::HIDDEN);

    let warm = pool
        .context
        .warm_up(URL, WarmUpOptions::default())
        .expect("instance available");
    pool.context
        .set_instance_layout(warm.instance_id(), Some(rect));
    let frame = pool.context.frames()[1].clone();
    assert_eq!(frame.status, InstanceStatus::Warming);
    assert_eq!(frame.container, ContainerStyle::HIDDEN);
    Ok(())
}

#[instantview_test]
async fn hidden_container_is_offscreen_empty_and_transparent() -> Result<(), Error> {
    let hidden = ContainerStyle::HIDDEN;
    assert_eq!(hidden.rect, Rect::new(-9999.0, -9999.0, 0.0, 0.0));
    assert!(hidden.opacity.abs() < f32::EPSILON);
    assert!(!hidden.pointer_events);
    assert!(!hidden.is_visible());
    Ok(())
}

#[instantview_test]
async fn release_clears_layout_and_props() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, true))?;
    let result = pool.context.borrow("a", None).expect("instance available");
    let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    pool.context
        .set_instance_layout(&result.instance_id, Some(rect));
    assert_eq!(pool.context.instance_layout(&result.instance_id), Some(rect));
    assert_eq!(
        pool.context
            .instance_props(&result.instance_id)
            .and_then(|props| props.source),
        Some(Source::uri(URL))
    );

    pool.context.release(&result.instance_id);
    assert_eq!(pool.context.instance_layout(&result.instance_id), None);
    assert!(pool.context.instance_props(&result.instance_id).is_none());
    assert_eq!(pool.context.frames()[0].container, ContainerStyle::HIDDEN);

    let unknown = InstanceId::from("webview-pool-42");
    assert_eq!(pool.context.instance_layout(&unknown), None);
    assert!(pool.context.instance_props(&unknown).is_none());
    assert!(pool.context.resource(&unknown).is_none());
    Ok(())
}

#[instantview_test]
async fn warming_instance_loads_warmed_url() -> Result<(), Error> {
    let pool = make_pool(pool_config(2, true))?;
    let warm = pool
        .context
        .warm_up(URL, WarmUpOptions::default())
        .expect("instance available");
    assert_eq!(pool.factory.created_count(), 1);
    let surface = pool
        .factory
        .surface(warm.instance_id())
        .expect("surface created");
    assert_eq!(surface.initial.source, Source::uri(URL));
    assert_eq!(pool.context.frames()[0].source, Source::uri(URL));

    pool.context.cancel_warm_up(URL);
    assert_eq!(
        surface.events(),
        vec![
            SurfaceEvent::Script(CLEANUP_SCRIPT.to_string()),
            SurfaceEvent::Render(SurfaceContent::blank(&Map::new())),
        ]
    );
    assert!(pool.context.frames()[0].source.is_blank());
    Ok(())
}

#[instantview_test]
async fn warm_hit_keeps_loaded_page() -> Result<(), Error> {
    let pool = make_pool(pool_config(2, true))?;
    let warm = pool
        .context
        .warm_up(URL, WarmUpOptions::default())
        .expect("instance available");
    let result = pool
        .context
        .borrow("reader", Some(URL))
        .expect("warm hit");
    assert!(result.warm_hit);
    assert_eq!(&result.instance_id, warm.instance_id());
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));

    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");
    assert!(surface.renders().is_empty());
    assert_eq!(pool.context.frames()[0].status, InstanceStatus::Borrowed);
    assert_eq!(pool.factory.created_count(), 1);
    Ok(())
}

#[instantview_test]
async fn default_props_are_merged_under_borrower_props() -> Result<(), Error> {
    let pool = make_pool(PoolConfig {
        pool_size: 1,
        default_content_props: object(json!({
            "javascript_enabled": true,
            "cache_mode": "default",
        })),
        ..PoolConfig::default()
    })?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context.set_instance_props(
        &result.instance_id,
        props_for(URL).with_prop("cache_mode", json!("no-cache")),
    );
    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");
    assert_eq!(
        surface.current().props,
        object(json!({
            "javascript_enabled": true,
            "cache_mode": "no-cache",
        }))
    );

    // Borrower props stop applying once the instance is returned.
    pool.context.release(&result.instance_id);
    assert_eq!(
        surface.current().props,
        object(json!({
            "javascript_enabled": true,
            "cache_mode": "default",
        }))
    );
    Ok(())
}

#[instantview_test]
async fn cleanup_script_runs_once_per_cleaning_phase() -> Result<(), Error> {
    let pool = make_pool(pool_config(2, true))?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");

    pool.context.release(&result.instance_id);
    assert_eq!(surface.scripts(), vec![CLEANUP_SCRIPT.to_string()]);
    assert_eq!(surface.current_source(), Source::blank());

    // Unrelated changes re-evaluate the slot without re-entering cleaning.
    let other = InstanceId::for_index(1);
    pool.context
        .set_instance_layout(&other, Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    pool.context.set_instance_layout(&other, None);
    assert_eq!(surface.scripts().len(), 1);

    advance(Duration::from_millis(99)).await;
    assert_eq!(
        status_of(&pool.manager, "webview-pool-0"),
        Some(InstanceStatus::Cleaning)
    );
    advance(Duration::from_millis(1)).await;
    assert_eq!(
        status_of(&pool.manager, "webview-pool-0"),
        Some(InstanceStatus::Idle)
    );
    assert_eq!(surface.scripts().len(), 1);

    let again = pool.context.borrow("b", None).expect("instance available");
    pool.context
        .set_instance_props(&again.instance_id, props_for(URL));
    pool.context.release(&again.instance_id);
    assert_eq!(surface.scripts().len(), 2);
    advance(Duration::from_millis(100)).await;
    assert_eq!(pool.context.state().available_count, 2);
    Ok(())
}

#[instantview_test]
async fn custom_cleanup_script_replaces_default() -> Result<(), Error> {
    let pool = make_pool(PoolConfig {
        pool_size: 1,
        custom_cleanup_script: Some("window.resetApp();".to_string()),
        ..PoolConfig::default()
    })?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    pool.context.release(&result.instance_id);
    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");
    assert_eq!(surface.scripts(), vec!["window.resetApp();".to_string()]);
    Ok(())
}

#[instantview_test]
async fn release_without_cleanup_blanks_without_script() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, false))?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    pool.context.release(&result.instance_id);

    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");
    assert!(surface.scripts().is_empty());
    assert_eq!(surface.current_source(), Source::blank());
    assert_eq!(pool.context.state().available_count, 1);
    Ok(())
}

#[instantview_test]
async fn expired_warm_up_without_cleanup_skips_script() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, false))?;
    let warm = pool
        .context
        .warm_up(URL, WarmUpOptions::with_timeout(Duration::from_millis(100)))
        .expect("instance available");
    advance(Duration::from_millis(100)).await;

    assert_eq!(
        status_of(&pool.manager, "webview-pool-0"),
        Some(InstanceStatus::Idle)
    );
    let surface = pool
        .factory
        .surface(warm.instance_id())
        .expect("surface created");
    assert!(surface.scripts().is_empty());
    assert_eq!(surface.current_source(), Source::blank());
    Ok(())
}

#[instantview_test]
async fn detaches_idle_surfaces_and_reattaches_on_borrow() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, true))?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    assert!(pool.detacher.events().is_empty());

    pool.context.release(&result.instance_id);
    assert_eq!(pool.detacher.events(), vec![DetachEvent::Detach]);
    advance(Duration::from_millis(100)).await;
    assert_eq!(pool.detacher.events(), vec![DetachEvent::Detach]);

    pool.context.borrow("b", None).expect("instance available");
    assert_eq!(
        pool.detacher.events(),
        vec![
            DetachEvent::Detach,
            DetachEvent::Attach(InstanceId::for_index(0))
        ]
    );
    Ok(())
}

#[instantview_test]
async fn missing_detach_capability_falls_back_to_noop() -> Result<(), Error> {
    assert!(!select_detacher(None).is_available());
    let available: Arc<dyn ViewDetacher> = Arc::new(RecordingDetacher::default());
    assert!(select_detacher(Some(available)).is_available());
    let unavailable: Arc<dyn ViewDetacher> = Arc::new(NoopDetacher);
    assert!(!select_detacher(Some(unavailable)).is_available());

    // Same logical behavior without the capability.
    let manager = PoolManager::new(Arc::new(MockClock));
    let factory = Arc::new(MockSurfaceFactory::default());
    let context = PoolContext::new(
        manager.clone(),
        pool_config(1, true),
        factory.clone(),
        select_detacher(None),
    )?;
    let result = context.borrow("a", None).expect("instance available");
    context.set_instance_props(&result.instance_id, props_for(URL));
    context.release(&result.instance_id);
    advance(Duration::from_millis(100)).await;
    assert_eq!(status_of(&manager, "webview-pool-0"), Some(InstanceStatus::Idle));
    assert_eq!(factory.created_count(), 1);
    Ok(())
}

#[instantview_test]
async fn navigation_events_reach_current_borrower_only() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, false))?;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let first_calls = calls.clone();
    let first = pool.context.borrow("one", None).expect("instance available");
    pool.context.set_instance_props(
        &first.instance_id,
        props_for(URL).on_navigation_state_change(move |state| {
            first_calls.lock().push(format!("one:{}", state.url));
        }),
    );
    let surface = pool
        .factory
        .surface(&first.instance_id)
        .expect("surface created");
    surface.navigate("https://a");

    pool.context.release(&first.instance_id);
    surface.navigate("https://b");

    let second_calls = calls.clone();
    let second = pool.context.borrow("two", None).expect("instance available");
    pool.context.set_instance_props(
        &second.instance_id,
        props_for(URL).on_navigation_state_change(move |state| {
            second_calls.lock().push(format!("two:{}", state.url));
        }),
    );
    surface.navigate("https://c");

    assert_eq!(
        *calls.lock(),
        vec!["one:https://a".to_string(), "two:https://c".to_string()]
    );
    Ok(())
}

#[instantview_test]
async fn every_change_publishes_a_view() -> Result<(), Error> {
    let pool = make_pool(pool_config(2, true))?;
    let mut rx = pool.context.watch();
    let start = rx.borrow_and_update().revision;

    let result = pool.context.borrow("a", None).expect("instance available");
    assert!(rx.has_changed().expect("context alive"));
    let view = rx.borrow_and_update().clone();
    assert!(view.revision > start);
    assert_eq!(view.state.borrowed_count, 1);
    assert_eq!(view.frames.len(), 2);
    assert_eq!(view.frames[0].status, InstanceStatus::Borrowed);

    pool.context
        .set_instance_layout(&result.instance_id, Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
    assert!(rx.has_changed().expect("context alive"));
    assert!(pool.context.view().revision > view.revision);
    Ok(())
}

#[instantview_test]
async fn context_keeps_existing_pool_configuration() -> Result<(), Error> {
    let manager = PoolManager::new(Arc::new(MockClock));
    manager.initialize(pool_config(2, false))?;
    let context = PoolContext::new(
        manager,
        pool_config(5, true),
        Arc::new(MockSurfaceFactory::default()),
        Arc::new(NoopDetacher),
    )?;
    assert_eq!(context.state().pool_size(), 2);
    assert_eq!(context.frames().len(), 2);
    assert!(!context.config().cleanup_on_return);
    Ok(())
}

#[instantview_test]
async fn context_rejects_invalid_configuration() -> Result<(), Error> {
    let err = PoolContext::new(
        PoolManager::new(Arc::new(MockClock)),
        pool_config(0, true),
        Arc::new(MockSurfaceFactory::default()),
        Arc::new(NoopDetacher),
    )
    .expect_err("empty pool rejected");
    assert_eq!(
        err.messages.last().map(String::as_str),
        Some("while creating the pool context")
    );
    Ok(())
}

#[instantview_test]
async fn shutdown_cancels_timers_and_stops_following() -> Result<(), Error> {
    let pool = make_pool(pool_config(2, true))?;
    assert_eq!(pool.manager.subscriber_count(), 1);
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    pool.context.release(&result.instance_id);
    pool.context
        .warm_up(URL, WarmUpOptions::default())
        .expect("instance available");

    pool.context.shutdown();
    assert_eq!(pool.manager.subscriber_count(), 0);
    // The cancelled warm-up was still wiped before the context let go.
    let warmed = pool
        .factory
        .surface(&InstanceId::for_index(1))
        .expect("warmed surface created");
    assert_eq!(warmed.scripts(), vec![CLEANUP_SCRIPT.to_string()]);
    let state = pool.manager.get_state();
    assert_eq!(state.cleaning_count, 0);
    assert_eq!(state.available_count, 2);

    advance(Duration::from_secs(10)).await;
    assert_eq!(pool.manager.get_state().available_count, 2);
    assert!(pool.manager.borrow("b", None).is_some());
    Ok(())
}

#[test]
fn release_without_runtime_skips_grace_period() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, true))?;
    let result = pool.context.borrow("a", None).expect("instance available");
    pool.context
        .set_instance_props(&result.instance_id, props_for(URL));
    pool.context.release(&result.instance_id);

    let surface = pool
        .factory
        .surface(&result.instance_id)
        .expect("surface created");
    assert_eq!(surface.scripts(), vec![CLEANUP_SCRIPT.to_string()]);
    assert_eq!(
        status_of(&pool.manager, "webview-pool-0"),
        Some(InstanceStatus::Idle)
    );
    assert!(pool.context.borrow("b", None).is_some());
    Ok(())
}

#[instantview_test]
async fn dropping_context_unsubscribes() -> Result<(), Error> {
    let pool = make_pool(pool_config(1, true))?;
    let manager = pool.manager.clone();
    assert_eq!(manager.subscriber_count(), 1);
    drop(pool);
    assert_eq!(manager.subscriber_count(), 0);
    assert!(manager.borrow("a", None).is_some());
    Ok(())
}
