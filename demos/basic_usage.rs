//! Basic usage example for the pdf-harvest library.
//!
//! Searches every configured backend, prints the merged results, then
//! packages the first few direct PDF links into one archive.
//!
//! ```text
//! cargo run --example basic_usage -- "atomic habits"
//! ```

use pdf_harvest::config::load_config;
use pdf_harvest::pipeline::{Aggregator, BatchPackager, Downloader};
use pdf_harvest::sources::SourceRegistry;
use pdf_harvest::utils::HttpClient;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter("pdf_harvest=info")
        .init();

    let query = std::env::args().nth(1).unwrap_or_else(|| "atomic habits".to_string());
    let config = load_config(None)?;
    let client = HttpClient::with_settings(&config.http_settings())?;

    let registry = SourceRegistry::new(&client);
    println!("Available backends: {}\n", registry.ids().collect::<Vec<_>>().join(", "));

    let specs = config.backend_specs(&registry);
    let aggregator = Aggregator::new(registry).with_max_results(config.search.max_results);
    let report = aggregator.search(&query, &specs, &config.credentials()).await?;

    for (name, error) in report.failures() {
        eprintln!("{} failed: {}", name, error.message);
    }
    for (name, missing) in report.skipped() {
        eprintln!("{} skipped, missing {}", name, missing.join(", "));
    }

    for (i, result) in report.results.iter().enumerate() {
        println!("{:>2}. [{}] {} ({})", i + 1, result.kind, result.title, result.source_name);
        println!("    {}", result.link);
    }

    let selected: Vec<_> = report.direct_artifacts().take(3).cloned().collect();
    if selected.is_empty() {
        println!("\nNo direct PDF links to package");
        return Ok(());
    }

    let packager = BatchPackager::new(Downloader::with_options(client, config.download_options()));
    let batch = packager
        .package_selected(
            &selected,
            &config.downloads.work_dir,
            &|p| {
                if let pdf_harvest::models::BatchEvent::Failed { reason } = &p.event {
                    eprintln!("  {} failed: {}", p.title, reason);
                }
            },
            &CancellationToken::new(),
        )
        .await?;

    println!(
        "\n{} of {} downloaded, archive: {}",
        batch.successful(),
        batch.outcomes.len(),
        batch
            .archive_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}
