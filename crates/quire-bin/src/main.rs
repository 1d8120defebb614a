//! Quire entrypoint.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::load_from;
use core_events::{Event, EventSink};
use core_hints::HintCache;
use core_state::{Loaded, Loader};
use core_syntax::SyntaxRegistry;
use core_text::LayoutEnv;
use core_workers::{LayoutProgress, WorkerPool};
use crossbeam_channel::Receiver;
use quire::report::aligned;
use quire::{FileReport, LineLint, Previewer};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "quire", version, about = "Load text files into quire Moments and report on them")]
struct Args {
    /// File or directory to load. Defaults to the current directory.
    pub path: Option<PathBuf>,
    /// Optional configuration file path (overrides discovery of `quire.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Tab stop override, clamped like the configured value.
    #[arg(long = "tab-width", value_name = "N")]
    pub tab_width: Option<u16>,
    /// Print the whole-document digest of each file.
    #[arg(long)]
    pub hash: bool,
    /// Render the first ROWS rows of each file.
    #[arg(long, value_name = "ROWS")]
    pub preview: Option<u16>,
    /// Preview width in columns; also the long-line lint limit.
    #[arg(long, default_value_t = 80)]
    pub width: u16,
    /// 1-based line the preview keeps in view.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub line: usize,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("quire.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "quire.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global subscriber already installed; dropping the guard stops the writer.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");
    let result = run(&args);
    info!(target: "runtime", ok = result.is_ok(), "shutdown");
    result
}

fn run(args: &Args) -> Result<()> {
    let mut config = load_from(args.config.clone())?;
    if let Some(tab_width) = args.tab_width {
        config.set_tab_width(tab_width);
    }
    let progress = Arc::new(LayoutProgress::new());
    let env = LayoutEnv::new(config.layout())
        .with_observer(progress.clone())
        .into_shared();

    let (sink, events) = core_events::channel();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let pool = Arc::new(
        WorkerPool::with_sink(config.workers(), sink.clone()).context("spawning worker pool")?,
    );
    let loader = Loader::new(env)
        .with_pool(pool.clone())
        .with_syntax(Arc::new(SyntaxRegistry::with_builtin()));

    let path = args.path.clone().unwrap_or_else(|| PathBuf::from("."));
    let loaded = loader
        .from_path(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!(target: "runtime", path = %path.display(), files = loaded.len(), "path_loaded");

    let hints = Arc::new(HintCache::new(config.initial_generation(), sink.clone()));
    hints.register(Arc::new(LineLint::new(
        loaded.iter().map(|l| l.moment.clone()).collect(),
        args.width as usize,
    )));

    let mut out = io::stdout().lock();
    let reports: Vec<FileReport> = loaded.iter().map(|file| FileReport::build(file, args.hash)).collect();
    for row in aligned(&reports) {
        writeln!(out, "{row}")?;
    }

    if let Some(rows) = args.preview {
        let report = hints.collect_cycle();
        debug!(target: "runtime", generation = report.generation, entries = report.entries, "hints_collected");
        for file in &loaded {
            let previewer =
                Previewer::new(hints.clone(), args.width, rows).with_cursor(args.line.saturating_sub(1));
            drain_events(&events, Some(&previewer));
            write_preview(&mut out, file, &previewer, &pool)?;
        }
    }

    sink.emit(Event::Shutdown);
    drain_events(&events, None);
    let workers = core_workers::telemetry_snapshot();
    let sent = core_events::telemetry_snapshot();
    let layouts = progress.snapshot();
    info!(
        target: "runtime",
        batches_enqueued = workers.batches_enqueued,
        batches_dropped = workers.batches_dropped,
        lines_initialized = workers.lines_initialized,
        rows_rendered = workers.rows_rendered,
        layouts_background = layouts.background,
        layouts_on_demand = layouts.on_demand,
        events_sent = sent.sent,
        events_dropped = sent.dropped_full + sent.dropped_closed,
        "pipeline_telemetry"
    );
    Ok(())
}

fn write_preview(out: &mut impl Write, file: &Loaded, previewer: &Previewer, pool: &WorkerPool) -> Result<()> {
    let name = file
        .moment
        .file_info()
        .map(|info| info.path.display().to_string())
        .unwrap_or_default();
    writeln!(out, "--- {name}")?;
    for line in previewer.lines(&file.moment, Some(pool)) {
        writeln!(out, "{line}")?;
    }
    let stats = previewer.stats();
    debug!(target: "runtime", misses = stats.misses, render_ns = stats.last_render_ns, "preview_rendered");
    Ok(())
}

/// Consume pending events without blocking.
fn drain_events(events: &Receiver<Event>, previewer: Option<&Previewer>) {
    for event in events.try_iter() {
        match &event {
            Event::LinesReady { count } => {
                debug!(target: "runtime.events", count, "lines_ready");
            }
            Event::Shutdown => {
                info!(target: "runtime.events", "shutdown_requested");
            }
            _ => {}
        }
        if let Some(previewer) = previewer {
            previewer.on_event(&event);
        }
    }
}
