//! Basic Store
//!
//! This example demonstrates reading and writing a record-shaped store.
//!
//! Key concepts:
//! - Record state declared with the state_record macro
//! - Deduplicating projections and per-field plucks
//! - Partial writes with patch
//! - Fixed key-set for dynamic records
//!
//! Run with: cargo run --example basic_store

use effect_store::{state_record, Store};
use futures::StreamExt;
use serde_json::json;

state_record! {
    struct Profile {
        name: String,
        age: u32,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== Basic Store Example ===\n");

    let store = Store::new(Profile {
        name: "John".into(),
        age: 20,
    })
    .unwrap();

    // Distinct projection: repeated values are suppressed
    let ages = store.pick(|profile| profile.age);
    let mut age_changes = ages.subscribe();

    println!("Initial profile: {:?}", store.value());
    println!("Fields: {:?}", store.picker().field_names().collect::<Vec<_>>());

    store.patch(json!({ "age": 21 })).unwrap();
    store.patch(json!({ "name": "Jane" })).unwrap();
    store
        .update(|profile| Profile {
            age: profile.age + 1,
            ..profile.clone()
        })
        .unwrap();

    println!("\nAge projection saw:");
    for _ in 0..3 {
        if let Some(age) = age_changes.next().await {
            println!("  age = {}", age);
        }
    }
    println!("Name via pluck: {}", store.pluck("name").unwrap().current());

    // Unknown keys never reach the state
    match store.patch(json!({ "email": "jane@example.com" })) {
        Ok(_) => println!("\n  Unexpected: patch accepted"),
        Err(e) => println!("\n  Patch rejected: {}", e),
    }

    // Dynamic records have their key-set checked on every write
    let settings = Store::new(json!({ "theme": "dark", "volume": 7 })).unwrap();
    let result = settings.update(|current| {
        let mut next = current.clone();
        next["intruder"] = json!(true);
        next
    });
    match result {
        Ok(_) => println!("  Unexpected: update accepted"),
        Err(e) => println!("  Update rejected: {}", e),
    }
    println!("  Settings unchanged: {}", settings.value());

    store.destroy();
    settings.destroy();

    println!("\nKey Takeaways:");
    println!("- Projections emit the current value first, then only real changes");
    println!("- patch merges known fields and refuses the rest");
    println!("- Dynamic records keep the key-set they were created with");

    println!("\n=== Example Complete ===");
}
