use core_config::WorkerConfig;
use core_events::{Event, EventSink};
use core_hints::HintCache;
use core_state::Loader;
use core_syntax::{Language, SyntaxRegistry};
use core_text::{LayoutConfig, LayoutEnv, Linebreak};
use core_workers::WorkerPool;
use quire::{FileReport, LineLint, Previewer};
use std::sync::Arc;

// Loads a directory the way the binary does and checks the per-file reports
// and the starred preview rows.
#[test]
fn directory_load_reports_and_previews() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn main() {\n    let x = 1; \n}\n").unwrap();
    std::fs::write(dir.path().join("b.txt"), "one\r\ntwo\r\n").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    let (sink, events) = core_events::channel();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let pool = Arc::new(
        WorkerPool::with_sink(
            WorkerConfig {
                threads: 2,
                line_queue: 8,
                row_queue: 32,
            },
            sink.clone(),
        )
        .unwrap(),
    );
    let env = LayoutEnv::new(LayoutConfig {
        tab_width: 4,
        expand_tabs: true,
    })
    .into_shared();
    let loader = Loader::new(env)
        .with_pool(pool.clone())
        .with_syntax(Arc::new(SyntaxRegistry::with_builtin()));

    let loaded = loader.from_path(dir.path()).unwrap();
    assert_eq!(loaded.len(), 2);

    let rust = FileReport::build(&loaded[0], true);
    assert_eq!(rust.language, Language::Rust);
    assert_eq!(rust.lines, 3);
    assert_eq!(rust.linebreak, Linebreak::Lf);
    assert!(rust.digest.is_some());
    let text = FileReport::build(&loaded[1], false);
    assert_eq!(text.language, Language::Unknown);
    assert_eq!(text.linebreak, Linebreak::CrLf);
    assert_eq!(text.lines, 2);

    let hints = Arc::new(HintCache::new(0, sink.clone()));
    hints.register(Arc::new(LineLint::new(
        loaded.iter().map(|l| l.moment.clone()).collect(),
        80,
    )));
    let report = hints.collect_cycle();
    assert_eq!(report.generation, 1);
    assert_eq!(report.entries, 1);

    let previewer = Previewer::new(hints.clone(), 20, 3);
    let rows = previewer.lines(&loaded[0].moment, Some(&pool));
    assert_eq!(rows.len(), 3);
    assert!(!rows[0].starts_with('*'));
    assert!(rows[1].starts_with('*'));
    assert!(rows[1].ends_with("let x = 1;"));

    let seen: Vec<Event> = events.try_iter().collect();
    assert!(seen.contains(&Event::HintsChanged { generation: 1 }));
    assert!(seen.contains(&Event::RenderRequested));
    for event in &seen {
        previewer.on_event(event);
    }
    previewer.lines(&loaded[0].moment, Some(&pool));
    assert_eq!(previewer.stats().misses, 2);
}
