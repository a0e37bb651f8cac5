//! Stillwater Effect
//!
//! This example demonstrates effects whose bodies are Stillwater effects
//! run against an injected environment.
//!
//! Key concepts:
//! - Environment pattern for dependency injection
//! - EffectBuilder with a named effect, a policy and hooks
//! - Per-effect error slots in the store
//! - Swapping the environment for a test double
//!
//! Run with: cargo run --example stillwater_effect

use effect_store::{state_record, ConcurrencyPolicy, Effect, Store};
use std::collections::HashMap;
use std::sync::Arc;
use stillwater::prelude::*;

state_record! {
    struct Directory {
        selected: Option<String>,
        lookups: u32,
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum LookupError {
    #[error("no user with id {0}")]
    NotFound(u32),
}

// Environment: where effect bodies find their dependencies
#[derive(Clone)]
struct Env {
    users: Arc<HashMap<u32, String>>,
}

fn lookup_effect(store: &Store<Directory>, env: Env) -> Effect<u32, String, LookupError> {
    let cell = store.cell();
    store
        .effect_builder()
        .name("lookup-user")
        .policy(ConcurrencyPolicy::Switch)
        .effect(env, |id: u32| {
            from_fn(move |env: &Env| env.users.get(&id).cloned().ok_or(LookupError::NotFound(id)))
                .boxed()
        })
        .on_success(move |id: &u32, user: &String| {
            println!("  [Hook] user {} is {}", id, user);
            let _ = cell.write(|d| Directory {
                selected: Some(user.clone()),
                lookups: d.lookups + 1,
            });
        })
        .on_error(|id: &u32, error: &LookupError| {
            println!("  [Hook] lookup {} failed: {}", id, error)
        })
        .build()
        .unwrap()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== Stillwater Effect Example ===\n");

    let store = Store::new(Directory {
        selected: None,
        lookups: 0,
    })
    .unwrap();

    let env = Env {
        users: Arc::new(HashMap::from([(1, "Ada".to_string()), (2, "Grace".to_string())])),
    };
    let lookup = lookup_effect(&store, env);

    println!("Looking up existing user:");
    println!("  Result: {:?}", lookup.invoke(1).await);

    println!("\nLooking up missing user:");
    println!("  Result: {:?}", lookup.invoke(42).await);
    println!(
        "  Error slot {}: {:?}",
        lookup.index(),
        store.error(lookup.index()).map(|e| e.to_string())
    );

    println!("\nA later success clears the slot:");
    println!("  Result: {:?}", lookup.invoke(2).await);
    println!("  Error slot: {:?}", store.error(lookup.index()).map(|e| e.to_string()));
    println!("  State: {:?}", store.value());

    // Same effect body, empty test environment
    let test_store = Store::new(Directory {
        selected: None,
        lookups: 0,
    })
    .unwrap();
    let offline = lookup_effect(
        &test_store,
        Env {
            users: Arc::new(HashMap::new()),
        },
    );
    println!("\nWith an empty test environment:");
    println!("  Result: {:?}", offline.invoke(1).await);

    store.destroy();
    test_store.destroy();

    println!("\nKey Takeaways:");
    println!("- Effect bodies stay pure descriptions until run against an environment");
    println!("- Hooks see the parameter together with each outcome");
    println!("- Each effect owns one error slot, cleared by its next success");

    println!("\n=== Example Complete ===");
}
