//! Submitting a render and polling for its result.
//!
//! Run with: cargo run --example async_render --features parallel

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::DateTime;
use latvis::{
    BoundingBox, Coordinate, Dispatcher, HistorySource, InMemoryBlobStore, LocationRecord, RayonTaskQueue,
    RecordHistorySource, RenderConfig, RenderEngine, RenderRequest, Task,
};

fn main() {
    // A loop around lower Manhattan, one fix per minute
    let records: Vec<LocationRecord> = (0..120)
        .map(|i| {
            let angle = i as f64 / 120.0 * std::f64::consts::TAU;
            LocationRecord::new(
                40.71 + 0.01 * angle.sin(),
                -74.00 + 0.01 * angle.cos(),
                Some(1_300_000_000_000 + i * 60_000),
            )
        })
        .collect();
    let source: Arc<dyn HistorySource> = Arc::new(RecordHistorySource::new(records));

    let engine = Arc::new(RenderEngine::new(
        RenderConfig::default(),
        Arc::new(InMemoryBlobStore::new()),
    ));

    let worker_engine = Arc::clone(&engine);
    let worker_source = Arc::clone(&source);
    let queue = RayonTaskQueue::new(Arc::new(move |task: Task| {
        if let Err(e) = worker_engine.run_task(&task, worker_source.as_ref()) {
            eprintln!("worker failed: {}", e);
        }
    }));
    let dispatcher = Dispatcher::new(Arc::clone(&engine), Arc::new(queue));

    let bounds = BoundingBox::new(Coordinate::new(40.69, -74.02), Coordinate::new(40.73, -73.98)).unwrap();
    let request = RenderRequest::new(
        bounds,
        DateTime::from_timestamp(1_300_000_000, 0).unwrap(),
        DateTime::from_timestamp(1_300_010_000, 0).unwrap(),
    );

    let job = dispatcher.submit(request).unwrap();
    println!("Submitted: poll {}", dispatcher.display_path(&job));

    let start = Instant::now();
    while !engine.is_ready(job.handle()) {
        if start.elapsed() > Duration::from_secs(10) {
            println!("Gave up waiting");
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }

    let blob = engine.fetch(job.handle()).unwrap().unwrap();
    println!(
        "Ready after {:?}: {} bytes of {} at {}",
        start.elapsed(),
        blob.data.len(),
        blob.content_type(),
        dispatcher.render_path(&job)
    );
}
