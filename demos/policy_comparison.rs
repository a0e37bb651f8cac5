//! Policy Comparison
//!
//! This example runs the same pair of overlapping calls under each
//! concurrency policy on a paused clock.
//!
//! Key concepts:
//! - Switch keeps only the latest call
//! - Merge runs calls side by side, each result paired with its own call
//! - Concat queues calls in arrival order
//! - Exhaust ignores calls while one is running
//!
//! Run with: cargo run --example policy_comparison

use effect_store::{state_record, Callbacks, ConcurrencyPolicy, Store};
use std::time::Duration;
use tokio::time::{sleep, Instant};

state_record! {
    struct Profile {
        name: String,
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("rename failed: {0}")]
struct RenameError(String);

async fn run(policy: ConcurrencyPolicy) {
    println!("--- {} ---", policy);

    let store = Store::new(Profile {
        name: String::new(),
    })
    .unwrap();
    let cell = store.cell();
    let rename = store.effect(
        move |(label, delay): (&'static str, u64)| {
            let cell = cell.clone();
            async move {
                sleep(Duration::from_millis(delay)).await;
                cell.write(|_| Profile {
                    name: label.to_string(),
                })
                .map(|_| label)
                .map_err(|e| RenameError(e.to_string()))
            }
        },
        policy,
    );

    let clock = Instant::now();
    let report = |label: &'static str| {
        Callbacks::new().on_success(move |value: &'static str| {
            println!("  {} settled with {:?} at {}ms", label, value, clock.elapsed().as_millis())
        })
    };

    // X takes 300ms and starts at t=0; Y takes 150ms and starts at t=50
    let x = rename.invoke_with(("X", 300), report("X"));
    sleep(Duration::from_millis(50)).await;
    let y = rename.invoke_with(("Y", 150), report("Y"));

    let (x, y) = tokio::join!(x, y);
    println!("  handles: X = {:?}, Y = {:?}", x, y);
    println!("  final name: {:?}\n", store.value().name);

    store.destroy();
}

#[tokio::main(flavor = "current_thread", start_paused = true)]
async fn main() {
    println!("=== Policy Comparison Example ===\n");

    for policy in [
        ConcurrencyPolicy::Switch,
        ConcurrencyPolicy::Merge,
        ConcurrencyPolicy::Concat,
        ConcurrencyPolicy::Exhaust,
    ] {
        run(policy).await;
    }

    println!("Key Takeaways:");
    println!("- Discarded calls resolve as Dropped and never run callbacks");
    println!("- Every handle resolves, whatever the policy");

    println!("\n=== Example Complete ===");
}
