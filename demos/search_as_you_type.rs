//! # Example: search_as_you_type
//!
//! Demonstrates keyed single-flight lookups with [`RegisterMode::Replace`].
//!
//! Shows how to:
//! - Register a lookup under a fixed key
//! - Supersede it with a newer query as the user keeps typing
//! - Observe that stale lookups settle as `Aborted("Replaced")` and never
//!   reach their continuations
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► register("search", "r")      ─► lookup starts
//!   ├─► register("search", "ru")     ─► cancels "r", waits for it to settle
//!   ├─► register("search", "rus")    ─► cancels "ru", waits for it to settle
//!   └─► await all three
//!         ├─► "r"   ─► Aborted("Replaced")
//!         ├─► "ru"  ─► Aborted("Replaced")
//!         └─► "rus" ─► Value(results)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example search_as_you_type
//! ```

use std::time::Duration;

use cancelvisor::{Operation, OperationRegistry, Outcome, RegisterMode, RegistryConfig};

const CATALOG: &[&str] = &["rust", "rustc", "rustup", "ruby", "russet"];

async fn lookup(query: String) -> Result<Vec<&'static str>, String> {
    tokio::time::sleep(Duration::from_millis(150)).await;
    Ok(CATALOG
        .iter()
        .copied()
        .filter(|item| item.starts_with(&query))
        .collect())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== search_as_you_type example ===\n");

    // 1. Every registration on the same key replaces the live one
    let config = RegistryConfig {
        default_mode: RegisterMode::Replace,
        ..RegistryConfig::default()
    };
    let registry: OperationRegistry<&'static str, Vec<&'static str>, String> =
        OperationRegistry::new(config)?;

    // 2. Simulate keystrokes arriving faster than lookups finish
    let mut pending: Vec<(String, Operation<Vec<&'static str>, String>)> = Vec::new();
    for query in ["r", "ru", "rus"] {
        println!("[typed] {query:?}");
        let q = query.to_string();
        let op = registry.register("search", move |_| lookup(q)).await?;
        pending.push((query.to_string(), op));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // 3. Only the last query produces results
    for (query, op) in pending {
        match op.await {
            Outcome::Value(hits) => println!("[result] {query:?} -> {hits:?}"),
            Outcome::Aborted(reason) => println!("[stale]  {query:?} -> {reason}"),
            other => println!("[other]  {query:?} -> {other:?}"),
        }
    }

    println!("\nlive lookups: {}", registry.len().await);
    Ok(())
}
