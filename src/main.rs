use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use pdf_harvest::config::{default_config_path, load_config, Config, ConfigFile, LogFormat};
use pdf_harvest::models::{BackendSpec, ResultKind, SearchResult};
use pdf_harvest::pipeline::{Aggregator, BatchPackager, CollisionPolicy, Downloader};
use pdf_harvest::sources::SourceRegistry;
use pdf_harvest::ui::{self, BatchBar, DownloadBar, Status};
use pdf_harvest::utils::{format_file_size, is_terminal, terminal_width, truncate_with_ellipsis, HttpClient};
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// pdf-harvest - Search several sources for PDFs and bundle the ones you pick into one archive
#[derive(Parser, Debug)]
#[command(name = "pdf-harvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search several sources for PDFs and bundle the ones you pick into one archive", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Timeout in seconds for both backend searches and downloads
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table on a terminal, JSON otherwise
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search every enabled backend and list the merged results
    #[command(alias = "s")]
    Search {
        /// Search query
        query: String,

        /// Backend to query (repeatable; default: all configured)
        #[arg(long = "backend", short)]
        backends: Vec<String>,

        /// Maximum results per backend
        #[arg(long, short = 'n')]
        max_results: Option<usize>,

        /// Only list results that link straight to a file
        #[arg(long)]
        direct_only: bool,
    },

    /// Download a single URL
    #[command(alias = "f")]
    Fetch {
        /// URL of the file
        url: String,

        /// Directory to save into (default: downloads.work_dir)
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// What to do when the target file already exists
        #[arg(long)]
        collision: Option<CollisionPolicy>,
    },

    /// Download a selection and bundle it into one ZIP archive
    #[command(alias = "p")]
    Package {
        /// URLs to include as-is
        urls: Vec<String>,

        /// Search first and pick from the results
        #[arg(long, short = 'Q')]
        query: Option<String>,

        /// 1-based result numbers to include, e.g. 1,3,4
        #[arg(long, value_delimiter = ',', requires = "query")]
        select: Vec<usize>,

        /// Include every direct result of the search
        #[arg(long, requires = "query", conflicts_with = "select")]
        all_direct: bool,

        /// Backend to query (repeatable; default: all configured)
        #[arg(long = "backend", short)]
        backends: Vec<String>,

        /// Maximum results per backend
        #[arg(long, short = 'n')]
        max_results: Option<usize>,

        /// Directory for downloads and the archive (default: downloads.work_dir)
        #[arg(long, short)]
        work_dir: Option<PathBuf>,

        /// Archive file name
        #[arg(long)]
        archive_name: Option<String>,

        /// What to do when a downloaded file already exists
        #[arg(long)]
        collision: Option<CollisionPolicy>,
    },

    /// List the available backends and whether their credentials are set
    #[command(alias = "ls")]
    Backends,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a commented configuration template
    Init {
        /// Where to write it (default: user config directory)
        #[arg(long, short)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },

    /// Print the effective configuration with API keys redacted
    Show,
}

/// Everything a command needs besides its own arguments
struct App {
    config: Config,
    format: OutputFormat,
    quiet: bool,
    cancel: CancellationToken,
}

impl App {
    fn client(&self) -> Result<HttpClient> {
        HttpClient::with_settings(&self.config.http_settings()).context("Failed to build HTTP client")
    }

    fn show_progress(&self) -> bool {
        !self.quiet && is_terminal()
    }
}

fn init_tracing(verbose: u8, quiet: bool, config: &Config) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pdf_harvest={}", level)));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for JSON output
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(secs) = cli.timeout {
        config.override_timeout(secs);
    }

    init_tracing(cli.verbose, cli.quiet, &config);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });

    let app = App {
        config,
        format: cli.output.resolve(),
        quiet: cli.quiet,
        cancel,
    };

    match cli.command {
        Commands::Search {
            query,
            backends,
            max_results,
            direct_only,
        } => run_search(&app, &query, &backends, max_results, direct_only).await,
        Commands::Fetch {
            url,
            dir,
            collision,
        } => run_fetch(&app, &url, dir, collision).await,
        Commands::Package {
            urls,
            query,
            select,
            all_direct,
            backends,
            max_results,
            work_dir,
            archive_name,
            collision,
        } => {
            let selection = Selection {
                urls,
                query,
                select,
                all_direct,
                backends,
                max_results,
            };
            run_package(&app, selection, work_dir, archive_name, collision).await
        }
        Commands::Backends => run_backends(&app),
        Commands::Config { command } => match command {
            ConfigCommands::Init { path, force } => run_config_init(path, force),
            ConfigCommands::Show => run_config_show(&app),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pdf-harvest", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Backend specs for a command: the configured set, or exactly the named ones
fn backend_specs(config: &Config, registry: &SourceRegistry, names: &[String]) -> Vec<BackendSpec> {
    if names.is_empty() {
        return config.backend_specs(registry);
    }

    let mut config = config.clone();
    config.search.backends = names.to_vec();
    config
        .backend_specs(registry)
        .into_iter()
        .map(|spec| spec.enabled(true))
        .collect()
}

async fn search(
    app: &App,
    query: &str,
    backends: &[String],
    max_results: Option<usize>,
) -> Result<pdf_harvest::SearchReport> {
    let registry = SourceRegistry::new(&app.client()?);
    let aggregator = Aggregator::new(registry)
        .with_max_results(max_results.unwrap_or(app.config.search.max_results));
    let specs = backend_specs(&app.config, aggregator.registry(), backends);

    let report = aggregator
        .search(query, &specs, &app.config.credentials())
        .await?;

    if !app.quiet {
        ui::print_backend_warnings(&report);
    }
    Ok(report)
}

async fn run_search(
    app: &App,
    query: &str,
    backends: &[String],
    max_results: Option<usize>,
    direct_only: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut report = search(app, query, backends, max_results).await?;
    if direct_only {
        report.results.retain(SearchResult::is_direct);
    }

    match app.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => print!("{}", ui::plain_results(&report.results)),
        _ => {
            ui::print_search_header(query, report.results.len(), started.elapsed());
            if report.results.is_empty() {
                ui::print_status(Status::Warning, "No results");
            } else {
                println!("{}", ui::results_table(&report.results, terminal_width()));
            }
        }
    }
    Ok(())
}

async fn run_fetch(
    app: &App,
    url: &str,
    dir: Option<PathBuf>,
    collision: Option<CollisionPolicy>,
) -> Result<()> {
    let mut options = app.config.download_options();
    if let Some(collision) = collision {
        options.collision = collision;
    }
    let downloader = Downloader::with_options(app.client()?, options);
    let dir = dir.unwrap_or_else(|| app.config.downloads.work_dir.clone());

    let bar = if app.show_progress() {
        DownloadBar::new(&truncate_with_ellipsis(url, 40))
    } else {
        DownloadBar::hidden()
    };

    let file = match downloader
        .fetch_url(url, &dir, &|p| bar.update(p), &app.cancel)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            bar.finish_with_error(&format!("{}: {}", url, e));
            return Err(e).with_context(|| format!("Failed to download {}", url));
        }
    };

    let summary = format!(
        "{} ({})",
        file.path.display(),
        format_file_size(file.bytes_written)
    );
    bar.finish_with_success(&summary);

    match app.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "path": file.path,
                "bytes_written": file.bytes_written,
                "sha256": file.sha256,
                "reused_existing": file.reused_existing,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => println!("{}", file.path.display()),
        _ => {}
    }
    Ok(())
}

/// What `package` should download
#[derive(Debug, Default)]
struct Selection {
    urls: Vec<String>,
    query: Option<String>,
    select: Vec<usize>,
    all_direct: bool,
    backends: Vec<String>,
    max_results: Option<usize>,
}

/// Pick results by 1-based number
fn pick(results: &[SearchResult], numbers: &[usize]) -> Result<Vec<SearchResult>> {
    numbers
        .iter()
        .map(|&n| {
            n.checked_sub(1)
                .and_then(|i| results.get(i))
                .cloned()
                .with_context(|| format!("No result number {} (have {})", n, results.len()))
        })
        .collect()
}

fn manual_item(url: &str) -> SearchResult {
    SearchResult::new(url, url, "manual", ResultKind::DirectArtifact)
}

async fn resolve_selection(app: &App, selection: Selection) -> Result<Vec<SearchResult>> {
    let mut items: Vec<SearchResult> = selection.urls.iter().map(|u| manual_item(u)).collect();

    if let Some(query) = &selection.query {
        if selection.select.is_empty() && !selection.all_direct {
            bail!("--query needs --select or --all-direct");
        }

        let report = search(app, query, &selection.backends, selection.max_results).await?;
        if selection.all_direct {
            items.extend(report.direct_artifacts().cloned());
        } else {
            let picked = pick(&report.results, &selection.select)?;
            for item in &picked {
                if item.kind == ResultKind::LandingPage && !app.quiet {
                    ui::eprint_status(
                        Status::Warning,
                        &format!("{} is a landing page, not a file", item.link),
                    );
                }
            }
            items.extend(picked);
        }
    }

    if items.is_empty() {
        bail!("Nothing to package: pass URLs, or --query with --select or --all-direct");
    }
    Ok(items)
}

async fn run_package(
    app: &App,
    selection: Selection,
    work_dir: Option<PathBuf>,
    archive_name: Option<String>,
    collision: Option<CollisionPolicy>,
) -> Result<()> {
    let items = resolve_selection(app, selection).await?;

    let mut options = app.config.download_options();
    if let Some(collision) = collision {
        options.collision = collision;
    }
    let mut packager = BatchPackager::new(Downloader::with_options(app.client()?, options));
    if let Some(name) = archive_name.or_else(|| app.config.downloads.archive_name.clone()) {
        packager = packager.with_archive_name(name);
    }
    let work_dir = work_dir.unwrap_or_else(|| app.config.downloads.work_dir.clone());

    let bar = if app.show_progress() {
        BatchBar::new(items.len())
    } else {
        BatchBar::hidden(items.len())
    };
    let result = packager
        .package_selected(&items, &work_dir, &|p| bar.handle(&p), &app.cancel)
        .await;
    bar.finish();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(report) = e.report() {
                print_package_report(app, report)?;
            }
            return Err(e.into());
        }
    };

    print_package_report(app, &report)?;
    if report.archive_path.is_none() {
        bail!("None of the {} item(s) could be downloaded", report.outcomes.len());
    }
    Ok(())
}

fn print_package_report(app: &App, report: &pdf_harvest::BatchReport) -> Result<()> {
    match app.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Plain => {
            for outcome in &report.outcomes {
                match (&outcome.local_path, &outcome.error) {
                    (Some(path), _) => println!("ok\t{}\t{}", outcome.request.link, path.display()),
                    (None, Some(error)) => println!("failed\t{}\t{}", outcome.request.link, error),
                    (None, None) => println!("failed\t{}", outcome.request.link),
                }
            }
            if let Some(path) = &report.archive_path {
                println!("archive\t{}", path.display());
            }
        }
        _ if app.quiet => {}
        _ => ui::print_batch_report(report),
    }
    Ok(())
}

fn run_backends(app: &App) -> Result<()> {
    let registry = SourceRegistry::new(&app.client()?);
    let credentials = app.config.credentials();
    let specs = app.config.backend_specs(&registry);

    let rows: Vec<_> = specs
        .iter()
        .map(|spec| {
            let source = registry.get(&spec.name);
            let capabilities: Vec<String> = source
                .map(|s| {
                    s.capabilities()
                        .iter_names()
                        .map(|(name, _)| name.to_lowercase())
                        .collect()
                })
                .unwrap_or_default();
            let missing = credentials.missing(&spec.required_credentials);
            let status = if source.is_none() {
                "unknown".to_string()
            } else if !spec.enabled {
                "disabled".to_string()
            } else if !missing.is_empty() {
                format!("missing {}", missing.join(", "))
            } else {
                "ready".to_string()
            };
            (spec, source.map(|s| s.name().to_string()), capabilities, status)
        })
        .collect();

    match app.format {
        OutputFormat::Json => {
            let values: Vec<_> = rows
                .iter()
                .map(|(spec, name, capabilities, status)| {
                    serde_json::json!({
                        "id": spec.name,
                        "name": name,
                        "capabilities": capabilities,
                        "required_credentials": spec.required_credentials,
                        "timeout_secs": spec.timeout.as_secs(),
                        "status": status,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        OutputFormat::Plain => {
            for (spec, _, _, status) in &rows {
                println!("{}\t{}", spec.name, status);
            }
        }
        _ => {
            use comfy_table::{presets, Attribute, Cell, Color, Table};
            let mut table = Table::new();
            table.load_preset(presets::UTF8_FULL);
            table.set_header(vec!["Backend", "Name", "Capabilities", "Credentials", "Status"]);

            for (spec, name, capabilities, status) in &rows {
                let required: Vec<&str> = spec.required_credentials.iter().map(String::as_str).collect();
                let status_cell = match status.as_str() {
                    "ready" => Cell::new(status).fg(Color::Green),
                    "disabled" => Cell::new(status).fg(Color::DarkGrey),
                    _ => Cell::new(status).fg(Color::Yellow),
                };
                table.add_row(vec![
                    Cell::new(format!("{} {}", ui::source_icon(&spec.name), spec.name))
                        .add_attribute(Attribute::Bold),
                    Cell::new(name.as_deref().unwrap_or("-")),
                    Cell::new(capabilities.join(", ")),
                    Cell::new(if required.is_empty() { "-".to_string() } else { required.join(", ") }),
                    status_cell,
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn run_config_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path
        .or_else(default_config_path)
        .unwrap_or_else(|| PathBuf::from(pdf_harvest::config::LOCAL_CONFIG_FILE));
    let file = ConfigFile::new(path);

    if file.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            file.path().display()
        );
    }

    file.write_template()?;
    ui::print_status(
        Status::Success,
        &format!("Wrote configuration template to {}", file.path().display()),
    );
    Ok(())
}

/// Replace every configured API key with a placeholder
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for key in [
        &mut config.api_keys.serpapi,
        &mut config.api_keys.google_cse_key,
        &mut config.api_keys.google_cse_cx,
    ] {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    }
    config
}

fn run_config_show(app: &App) -> Result<()> {
    let config = redacted(&app.config);
    match app.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}
