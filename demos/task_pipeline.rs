//! # Example: task_pipeline
//!
//! Demonstrates task composition, pause/resume and abort propagation.
//!
//! Shows how to:
//! - Build leaf tasks from futures with [`Task::from_future`]
//! - Run them in sequence and in parallel
//! - Pause and resume the parent, which pauses and resumes the running child
//! - Abort the parent and watch children settle as aborted
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► pipeline = sequence[ fetch, parallel[ resize, thumbnail ] ]
//!   ├─► pipeline.start()      ─► fetch starts
//!   ├─► pipeline.pause()      ─► fetch pauses
//!   ├─► pipeline.resume()     ─► fetch resumes, completes, parallel starts
//!   └─► pipeline.abort("shutdown")
//!         ├─► resize    ─► Abort
//!         └─► thumbnail ─► Abort
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example task_pipeline
//! ```

use std::time::Duration;

use cancelvisor::{
    tasks_in_parallel, tasks_in_sequence, ProgressMode, Task, TaskEvent,
};

fn step(name: &'static str, millis: u64) -> Task<String, String> {
    let task = Task::from_future(move |_| async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(format!("{name} done"))
    });
    task.on_any(move |n| match n.value() {
        TaskEvent::Progress(_) => {}
        other => println!("  [{name}] {}", other.kind().as_str()),
    });
    task
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== task_pipeline example ===\n");

    // 1. Compose
    let resize = step("resize", 500);
    let thumbnail = step("thumbnail", 800);
    let pipeline = tasks_in_sequence(vec![
        step("fetch", 100),
        tasks_in_parallel(vec![resize.clone(), thumbnail.clone()], ProgressMode::Count),
    ]);
    pipeline.on_any(|n| {
        if let TaskEvent::Progress(p) = n.value() {
            println!("[pipeline] progress {}/{}", p.loaded, p.total);
        }
    });
    let done = pipeline.to_future();

    // 2. Start, then pause briefly while the first step runs
    println!("[pipeline] start");
    let _ = pipeline.start();
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("[pipeline] pause");
    let _ = pipeline.pause();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("[pipeline] resume");
    let _ = pipeline.resume();

    // 3. Let the parallel stage begin, then shut everything down
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("[pipeline] abort");
    let _ = pipeline.abort("shutdown");

    println!("\n[pipeline] outcome: {:?}", done.await);
    println!("[resize]    state: {}", resize.state());
    println!("[thumbnail] state: {}", thumbnail.state());
}
