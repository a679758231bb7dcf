use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use feed_importer::app::ImportUseCase;
use feed_importer::config::ProfileConfig;
use feed_importer::infra::{CatalogSnapshot, JsonFileImportEngine, ReqwestHttpClient};
use feed_importer::logging;
use feed_importer::pipeline::pipeline_config::Collaborators;
use feed_importer::pipeline::processing::UniqueSlugAllocator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "feed_importer")]
#[command(about = "Transforms product feeds into catalog import rows")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a profile's pipeline and export the rows
    Run {
        /// Profile TOML file
        #[arg(long)]
        config: PathBuf,
        /// JSON snapshot of the existing catalog (url rewrites, options, links, margins)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Load and validate a profile without running it
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the url key the allocator would assign
    Slug {
        #[arg(long)]
        url_key: String,
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long, default_value = ".html")]
        suffix: String,
    },
}

fn load_catalog(path: Option<&Path>) -> Result<CatalogSnapshot> {
    match path {
        Some(path) => CatalogSnapshot::load(path)
            .with_context(|| format!("failed to load catalog snapshot {}", path.display())),
        None => Ok(CatalogSnapshot::default()),
    }
}

async fn run_profile(config_path: &Path, catalog_path: Option<&Path>) -> Result<()> {
    let profile = ProfileConfig::load(config_path)?;
    let catalog = load_catalog(catalog_path)?.seed()?;
    let http = Arc::new(ReqwestHttpClient::new()?);
    let collaborators = Collaborators::from_catalog(catalog, http.clone(), http);

    let pipeline = profile.pipeline_config().build(&collaborators)?;
    info!("Stages: {}", pipeline.stage_names().join(" → "));

    let engine = JsonFileImportEngine::new(&profile.output_dir, &profile.profile);
    let use_case = ImportUseCase::new(pipeline, Box::new(engine));
    let run = use_case.run().await?;

    println!("\n📊 Import results for {} (run {}):", run.profile, run.run_id);
    for report in &run.reports {
        println!("   {:<18} {}", report.stage, report.message);
    }
    println!("   Rows exported: {}", run.rows);
    println!("   Output dir: {}", profile.output_dir.display());

    if !run.error_report.is_clean() {
        println!("\n⚠️  Import engine errors:");
        print!("{}", run.error_report);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, catalog } => {
            if let Err(e) = run_profile(&config, catalog.as_deref()).await {
                error!("Import failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::Validate { config } => {
            let profile = ProfileConfig::load(&config)?;
            profile.pipeline_config().validate()?;
            println!("✅ Profile '{}' is valid ({} stages)", profile.profile, profile.stages.len());
            for stage in &profile.stages {
                println!("   - {}", stage.type_name());
            }
        }
        Commands::Slug { url_key, identifier, catalog, suffix } => {
            let seeded = load_catalog(catalog.as_deref())?.seed()?;
            let mut allocator = UniqueSlugAllocator::new(&seeded.url_index, &suffix)?;
            match allocator.resolve(&url_key, &identifier)? {
                Some(slug) => println!("{slug}"),
                None => println!("⚠️  No unique url key available for {identifier}"),
            }
        }
    }

    Ok(())
}
