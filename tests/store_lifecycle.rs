//! Store-level behavior: projections, error slots and teardown.

use effect_store::{state_record, Callbacks, ConcurrencyPolicy, InvokeError, Store, StoreConfig};
use futures::{FutureExt, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

state_record! {
    struct Profile {
        name: String,
        age: u32,
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
struct Failure(String);

state_record! {
    struct Member {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nick: Option<String>,
    }
}

fn john() -> Profile {
    Profile {
        name: "John".into(),
        age: 20,
    }
}

fn error_messages(store: &Store<Profile>) -> Vec<Option<String>> {
    store
        .errors_snapshot()
        .iter()
        .map(|slot| slot.as_ref().map(|e| e.to_string()))
        .collect()
}

#[tokio::test]
async fn patch_round_trips_through_projection() {
    let store = Store::new(john()).unwrap();
    let mut age = store.pluck("age").unwrap().subscribe();

    assert_eq!(age.next().await, Some(json!(20)));
    store.patch(json!({ "age": 21 })).unwrap();
    assert_eq!(age.next().await, Some(json!(21)));
}

#[tokio::test]
async fn typed_updates_may_clear_skipped_fields() {
    let store = Store::new(Member {
        name: "John".into(),
        nick: Some("Johnny".into()),
    })
    .unwrap();
    let mut nicks = store.pick(|m| m.nick.clone()).subscribe();

    let cleared = store
        .update(|m| Member {
            nick: None,
            ..m.clone()
        })
        .unwrap();

    assert_eq!(cleared.nick, None);
    assert_eq!(nicks.next().await, Some(Some("Johnny".to_string())));
    assert_eq!(nicks.next().await, Some(None));
}

#[tokio::test]
async fn projections_restart_from_the_current_value() {
    let store = Store::new(john()).unwrap();
    let names = store.pick(|p| p.name.clone());

    store.patch(json!({ "name": "Jane" })).unwrap();

    let mut late = names.subscribe();
    assert_eq!(late.next().await, Some("Jane".to_string()));
    assert!(late.next().now_or_never().is_none());
}

#[tokio::test]
async fn errors_are_isolated_per_effect() {
    let store = Store::new(john()).unwrap();
    let failing = store.effect(
        |_: ()| async { Err::<(), _>(Failure("Error for effect 1".into())) },
        ConcurrencyPolicy::Switch,
    );
    let passing = store.effect(
        |_: ()| async { Ok::<_, Failure>(()) },
        ConcurrencyPolicy::Switch,
    );

    let _ = failing.invoke(()).await;
    let _ = passing.invoke(()).await;
    assert_eq!(
        error_messages(&store),
        vec![Some("Error for effect 1".to_string()), None]
    );

    store.clear_error(failing.index());
    assert_eq!(error_messages(&store), vec![None, None]);
}

#[tokio::test]
async fn clear_all_errors_broadcasts_one_snapshot() {
    let store = Store::new(john()).unwrap();
    let effects: Vec<_> = (0..2)
        .map(|_| {
            store.effect(
                |n: u32| async move { Err::<(), _>(Failure(format!("failed {}", n))) },
                ConcurrencyPolicy::Concat,
            )
        })
        .collect();
    for (n, effect) in effects.iter().enumerate() {
        let _ = effect.invoke(n as u32).await;
    }

    let mut errors = store.errors();
    let _current = errors.next().await;
    store.clear_all_errors();

    let cleared = errors.next().await.unwrap();
    assert!(cleared.iter().all(Option::is_none));
    assert!(errors.next().now_or_never().is_none());
    assert!(store.error(0).is_none());
}

#[tokio::test]
async fn effect_builder_hooks_see_each_settlement() {
    let store = Store::new(john()).unwrap();
    let renames = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&renames);
    let cell = store.cell();

    let rename = store
        .effect_builder()
        .name("rename")
        .policy(ConcurrencyPolicy::Concat)
        .trigger(move |name: String| {
            let cell = cell.clone();
            async move {
                cell.write(|p| Profile {
                    name: name.clone(),
                    ..p.clone()
                })
                .map(|p| p.name)
                .map_err(|e| Failure(e.to_string()))
            }
        })
        .on_success(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    rename.invoke("Jane".into()).await.unwrap();
    rename.invoke("Joe".into()).await.unwrap();

    assert_eq!(renames.load(Ordering::SeqCst), 2);
    assert_eq!(store.value().name, "Joe");
    assert_eq!(rename.name(), "rename");
}

#[tokio::test]
async fn auto_loading_can_be_disabled() {
    let store = Store::with_config(john(), StoreConfig::default().auto_loading(false)).unwrap();
    let stuck = store.effect(
        |_: ()| futures::future::pending::<Result<(), Failure>>(),
        ConcurrencyPolicy::Merge,
    );

    let _pending = stuck.invoke(());
    assert!(stuck.is_busy());
    assert!(!store.is_loading());

    store.start_loading();
    assert!(store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn destroy_ends_everything() {
    let store = Store::new(john()).unwrap();
    let slow = store.effect(
        |ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, Failure>(ms)
        },
        ConcurrencyPolicy::Concat,
    );
    let mut states = store.state();
    let mut loading = store.loading();
    let mut errors = store.errors();
    let mut successes = slow.successes();
    let called = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&called);

    let running = slow.invoke_with(
        1_000,
        Callbacks::new().on_success(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let queued = slow.invoke(10);
    tokio::time::sleep(Duration::from_millis(100)).await;

    store.destroy();

    assert_eq!(running.await, Err(InvokeError::Destroyed));
    assert_eq!(queued.await, Err(InvokeError::Destroyed));
    assert_eq!(slow.invoke(5).await, Err(InvokeError::Destroyed));
    assert_eq!(called.load(Ordering::SeqCst), 0);

    assert_eq!(states.by_ref().count().await, 1);
    assert_eq!(loading.by_ref().collect::<Vec<_>>().await, vec![false, true]);
    assert_eq!(errors.by_ref().count().await, 1);
    assert_eq!(successes.next().await, None);

    // Writes still land, nobody is notified.
    store.patch(json!({ "age": 21 })).unwrap();
    assert_eq!(store.value().age, 21);
    assert!(store.state().next().await.is_none());
}
