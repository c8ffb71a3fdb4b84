//! Tests for progress sinks

use render_lanes::core::{
    build_progress_event, shared_sink, InMemoryProgressSink, ProgressReporter, ProgressSink,
    TaggedLineSink, TracingProgressSink,
};

#[test]
fn test_in_memory_progress_sink() {
    let mut sink = InMemoryProgressSink::new(10);
    sink.record(build_progress_event("story", "A", 4, 1, 3));
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pool, "A");
    assert_eq!(events[0].scene, 4);
    assert_eq!(events[0].total, 3);
}

#[test]
fn test_progress_sink_overflow() {
    let mut sink = InMemoryProgressSink::new(2);
    for scene in 1..=3 {
        sink.record(build_progress_event("story", "A", scene, scene as usize, 3));
    }
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].scene, 2); // First one popped
    assert_eq!(events[1].scene, 3);
}

#[test]
fn test_tagged_lines_one_per_event() {
    let mut sink = TaggedLineSink::new(Vec::new());
    sink.record(build_progress_event("story", "A", 1, 1, 2));
    sink.record(build_progress_event("story", "A", 2, 2, 2));
    let out = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<_> = out.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(r#""current":2"#));
    assert!(lines[1].contains(r#""percentage":100.0"#));
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingProgressSink;
    sink.record(build_progress_event("story", "A", 1, 1, 1));
}

#[test]
fn test_reporter_shared_between_threads() {
    let sink = InMemoryProgressSink::new(100);
    let handle = sink.handle();
    let reporter = std::sync::Arc::new(ProgressReporter::new("story", "A", 40, Some(shared_sink(sink))));
    let threads: Vec<_> = (0..4)
        .map(|t| {
            let reporter = std::sync::Arc::clone(&reporter);
            std::thread::spawn(move || {
                for i in 0..10 {
                    reporter.job_completed(t * 10 + i);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(reporter.completed(), 40);
    let mut counts: Vec<_> = handle.events().iter().map(|e| e.completed).collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=40).collect::<Vec<_>>());
}
