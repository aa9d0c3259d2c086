//! mate-rr - MATE RandR display configuration tool
//!
//! Entry point for the command-line binary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use mate_rr::backend::{MemoryBackend, RandrBackend};
use mate_rr::config::Config;
use mate_rr::monitors::{self, Configuration};
use mate_rr::screen::Screen;
use mate_rr::{Labeler, RandrError};

/// Command-line arguments for mate-rr
#[derive(Parser, Debug)]
#[command(name = "mate-rr")]
#[command(version, about = "MATE RandR display configuration", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "MATE_RR_CONFIG")]
    pub config: Option<String>,

    /// Display backend (x11|memory)
    #[arg(long, env = "MATE_RR_BACKEND")]
    pub backend: Option<String>,

    /// Hardware description for the memory backend (implies --backend memory)
    #[arg(long, env = "MATE_RR_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// X display to open
    #[arg(long)]
    pub display: Option<String>,

    /// Stored layout file (default: ~/.config/monitors.xml)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "compact")]
    pub log_format: String,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List outputs, CRTCs and modes
    Show,
    /// Print the current layout as monitors.xml
    Current,
    /// Store the current layout
    Save,
    /// Apply the stored layout for the attached monitors
    Apply,
    /// Check which stored layouts fit the hardware
    Check,
    /// Print the identification label of each output
    Identify,
    /// Re-apply the stored layout whenever monitors are plugged or unplugged
    Watch {
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Only report changes, never apply
        #[arg(long)]
        no_apply: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration before logging so the configured level applies
    let config_path = args
        .config
        .clone()
        .or_else(|| Config::default_path().map(|p| p.to_string_lossy().into_owned()));
    let (config, load_error) = match config_path.as_deref().map(Config::load) {
        Some(Ok(config)) => (config, None),
        Some(Err(e)) => (Config::default_config()?, Some(e)),
        None => (Config::default_config()?, None),
    };
    let config = config.with_overrides(args.backend.clone(), args.fixture.clone(), args.file.clone());

    let _guard = init_logging(&args, &config)?;

    if let Some(e) = load_error {
        debug!("Failed to load config: {:#}, using defaults", e);
    }

    debug!("mate-rr v{} ({} {}, {})", env!("CARGO_PKG_VERSION"), env!("BUILD_DATE"), env!("BUILD_TIME"), env!("GIT_HASH"));
    if args.verbose >= 2 {
        mate_rr::utils::log_startup_diagnostics();
    }

    if let Err(e) = run(&args, config).await {
        eprintln!("{}", mate_rr::utils::format_user_error(&e));
        return Err(e);
    }
    Ok(())
}

async fn run(args: &Args, mut config: Config) -> Result<()> {
    if args.display.is_some() {
        config.backend.display = args.display.clone();
    }
    config.validate()?;
    debug!("Config: {:?}", config);

    let path = config.monitors_path()?;
    let mut screen = open_screen(&config)?;
    if args.verbose >= 1 {
        mate_rr::utils::log_screen_summary(&screen.info());
    }

    match &args.command {
        Command::Show => show(&screen),
        Command::Current => {
            let current = Configuration::new_current(&screen.info());
            print!("{}", monitors::xml::serialize([&current]));
        }
        Command::Save => {
            let mut current = Configuration::new_current(&screen.info());
            current.ensure_primary(&screen.info());
            monitors::save(&current, &path)
                .with_context(|| format!("Failed to save layout to {}", path.display()))?;
            println!("Saved: {}", current.describe());
        }
        Command::Apply => {
            let applied = Configuration::apply_stored(&mut screen, &path, 0)
                .context("Failed to apply stored layout")?;
            println!("Applied: {}", applied.describe());
        }
        Command::Check => check(&screen, &path)?,
        Command::Identify => {
            let current = Configuration::new_current(&screen.info());
            let labeler = Labeler::new(&current);
            for label in labeler.labels() {
                println!("{} {:<10} +{}+{} {}", label.color, label.output, label.x, label.y, label.text);
            }
        }
        Command::Watch {
            interval_ms,
            no_apply,
        } => {
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.watch.interval_ms));
            let auto_apply = config.watch.auto_apply && !no_apply;
            watch(screen, path, interval, auto_apply).await?;
        }
    }

    Ok(())
}

fn open_screen(config: &Config) -> Result<Screen> {
    let backend: Box<dyn RandrBackend> = match config.backend.kind.as_str() {
        "memory" => {
            let fixture = config
                .backend
                .fixture
                .as_deref()
                .context("Memory backend requires a fixture")?;
            Box::new(MemoryBackend::from_fixture(fixture)?)
        }
        #[cfg(feature = "x11")]
        "x11" => Box::new(mate_rr::backend::X11Backend::connect(config.backend.display.as_deref())?),
        other => anyhow::bail!("Backend '{}' is not available in this build", other),
    };

    Ok(Screen::new(backend)?)
}

fn show(screen: &Screen) {
    let info = screen.info();
    let range = info.size_range();
    println!(
        "Screen: minimum {}x{}, maximum {}x{}",
        range.min_width, range.min_height, range.max_width, range.max_height
    );

    for output in info.outputs() {
        if !output.connected {
            println!("{} disconnected", output.name);
            continue;
        }

        let crtc = info.output_crtc(output);
        let current = crtc.and_then(|c| info.crtc_mode(c));
        print!(
            "{} connected{} \"{}\" {} 0x{:04x} 0x{:08x}",
            output.name,
            if output.is_primary { " primary" } else { "" },
            output.display_name(),
            output.vendor,
            output.product,
            output.serial
        );
        match (crtc, current) {
            (Some(crtc), Some(mode)) => {
                println!(" {}+{}+{} {} (CRTC {})", mode, crtc.x, crtc.y, crtc.current_rotation, crtc.id)
            }
            _ => println!(" off"),
        }

        let preferred = output.preferred_modes();
        for mode in info.output_modes(output) {
            println!(
                "   {:>12} {:>3}Hz{}{}",
                format!("{}x{}", mode.width, mode.height),
                mode.refresh_rate(),
                if Some(mode) == current { " *" } else { "" },
                if preferred.contains(&mode.id) { " +" } else { "" }
            );
        }
    }

    let clone_modes: Vec<String> = info.clone_modes().iter().map(ToString::to_string).collect();
    println!("Clone modes: {}", if clone_modes.is_empty() { "none".to_string() } else { clone_modes.join(", ") });
}

fn check(screen: &Screen, path: &std::path::Path) -> Result<()> {
    let info = screen.info();
    let current = Configuration::new_current(&info);
    let stored = monitors::load_all(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    for (index, config) in stored.iter().enumerate() {
        let verdict = if !config.matches(&current) {
            "other monitors".to_string()
        } else {
            match config.applicable(&info) {
                Ok(()) => "applicable".to_string(),
                Err(e) => format!("not applicable: {}", e),
            }
        };
        println!("{}: {} [{}]", index, config.describe(), verdict);
    }

    Ok(())
}

async fn watch(mut screen: Screen, path: PathBuf, interval: Duration, auto_apply: bool) -> Result<()> {
    info!(
        "Watching for display changes every {:?} (auto-apply: {})",
        interval, auto_apply
    );

    let mut hardware_stamp = screen.info().config_timestamp();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let step_path = path.clone();
        let last_stamp = hardware_stamp;
        let (returned, stamp) = tokio::task::spawn_blocking(move || {
            let stamp = poll_once(&mut screen, &step_path, last_stamp, auto_apply);
            (screen, stamp)
        })
        .await
        .context("Watch task panicked")?;

        screen = returned;
        hardware_stamp = stamp;
    }
}

/// Refresh, and on a hardware change apply the stored layout
///
/// Returns the hardware timestamp seen. Only hotplugs trigger an apply; our
/// own configuration changes move the other timestamp.
fn poll_once(screen: &mut Screen, path: &std::path::Path, last_stamp: u32, auto_apply: bool) -> u32 {
    if let Err(e) = screen.refresh() {
        warn!("Failed to refresh screen: {}", e);
        return last_stamp;
    }

    let stamp = screen.info().config_timestamp();
    if stamp == last_stamp {
        return stamp;
    }

    let current = Configuration::new_current(&screen.info());
    info!("Monitors changed: {}", current.describe());
    if !auto_apply {
        return stamp;
    }

    match Configuration::apply_stored(screen, path, 0) {
        Ok(applied) => info!("Applied stored layout: {}", applied.describe()),
        Err(e) if e.wants_current_fallback() => {
            info!("No stored layout for these monitors ({}), keeping current", e)
        }
        Err(RandrError::Assignment(e)) => warn!("Stored layout does not fit the hardware: {}", e.kind),
        Err(e) => warn!("Failed to apply stored layout: {}", e),
    }

    screen.info().config_timestamp()
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn format_layer<W>(format: &str, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        "json" => layer.json().boxed(),
        "pretty" => layer.pretty().boxed(),
        _ => layer.compact().boxed(),
    }
}

fn init_logging(
    args: &Args,
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("mate_rr={level},warn", level = log_level))
    });

    let mut layers: Vec<BoxedLayer> = vec![format_layer(&args.log_format, std::io::stderr, true)];
    let mut guard = None;

    // If log file is specified, write to both stderr and file
    if let Some(log_file_path) = &args.log_file {
        let file = File::create(log_file_path)
            .with_context(|| format!("Failed to create log file: {}", log_file_path))?;
        layers.push(format_layer(&args.log_format, std::sync::Mutex::new(file), false));
    } else if let Some(dir) = &config.logging.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "mate-rr.log");
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(format_layer(&args.log_format, writer, false));
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(log_file_path) = &args.log_file {
        info!("Logging to file: {}", log_file_path);
    }

    Ok(guard)
}
