//! OncoScout - AI-powered cancer variant interpreter
//!
//! A CLI tool that annotates a patient's genomic variants, routes each
//! one past a skip/deep-research policy, investigates the hard ones
//! through a bounded reasoning-and-lookup loop, and writes one
//! normalized report row per variant.
//!
//! Exit codes:
//!   0 - Success (report written, possibly with error-marked rows)
//!   1 - Startup error (bad arguments, reasoning service unavailable)

mod annotator;
mod capability;
mod cli;
mod config;
mod engine;
mod error;
mod llm;
mod models;
mod report;

use anyhow::Result;
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use engine::Route;
use models::WorkItem;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("OncoScout v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the interpretation
    match run_interpretation(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Interpretation failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .oncoscout.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".oncoscout.toml");

    if path.exists() {
        eprintln!("⚠️  .oncoscout.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .map_err(|e| anyhow::anyhow!("Failed to write .oncoscout.toml: {}", e))?;

    println!("✅ Created .oncoscout.toml with default settings.");
    println!("   Edit it to customize the model, step bound, and annotator path.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete interpretation workflow.
async fn run_interpretation(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input_path = args.input_path().clone();

    // Step 1: Initialize the reasoning service. A missing key aborts the
    // run here, before any variant is processed; everything downstream
    // degrades per variant instead of failing the batch.
    let reasoner = if args.dry_run {
        None
    } else {
        println!("🤖 Initializing reasoning service...");
        println!("   Model: {}", config.llm.model);
        println!("   Endpoint: {}", config.llm.base_url);
        println!("   Timeout: {}s", config.llm.timeout_seconds);
        Some(llm::ReasoningClient::new(&config.llm)?)
    };

    // Step 2: Baseline annotation
    println!("\n🧬 Annotating variants: {}", input_path.display());
    let columns = annotator::InputColumns {
        gene: args.gene_col.clone(),
        protein_change: args.protein_change_col.clone(),
        cancer_type: args.cancer_type_col.clone(),
    };
    let (cancer_type, variants) = annotate_input(&config, &input_path, &columns).await;
    println!(
        "   {} variants annotated (tumor type: {})",
        variants.len(),
        if cancer_type.is_empty() {
            "unknown"
        } else {
            &cancer_type
        }
    );

    let items: Vec<WorkItem> = variants
        .into_iter()
        .map(|variant| WorkItem {
            variant,
            cancer_type: cancer_type.clone(),
        })
        .collect();

    // Handle --dry-run: route variants and exit
    if args.dry_run {
        return handle_dry_run(&items);
    }
    let reasoner = reasoner.expect("reasoner is initialized unless dry-run");

    // Step 3: Run the engine
    println!("\n🔬 Interpreting {} variants...", items.len());
    println!("   Research loop bound: {} steps per variant\n", config.research.max_steps);

    let catalog = capability::CapabilityCatalog::standard(&config.research)?;
    let options = engine::EngineOptions {
        max_steps: config.research.max_steps,
        show_progress: !args.quiet,
    };
    let scout = engine::Engine::new(&reasoner, catalog, options);

    let total = items.len();
    let reports = scout.run(items).await;

    // Step 4: Write the artifact. Whatever was accumulated gets written,
    // error-marked rows included.
    println!("\n📝 Writing report...");

    let skipped = reports.iter().filter(|r| r.is_placeholder()).count();
    let errors = reports.iter().filter(|r| r.is_error()).count();
    let metadata = models::RunMetadata {
        input_path: input_path.display().to_string(),
        cancer_type,
        model_used: config.llm.model.clone(),
        generated_at: Utc::now(),
        variants_total: total,
        deep_researched: total - skipped,
        skipped,
        errors,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let output = match args.format {
        OutputFormat::Tsv => report::generate_tsv_report(&reports),
        OutputFormat::Json => report::generate_json_report(&metadata, &reports)?,
    };
    report::write_report(&args.output, &output)?;

    // Print summary
    println!("\n📊 Run Summary:");
    println!(
        "   Variants: {} | Deep researched: {} | Skipped: {} | Errors: {}",
        metadata.variants_total, metadata.deep_researched, metadata.skipped, metadata.errors
    );
    println!("   Duration: {:.1}s", metadata.duration_seconds);
    println!(
        "\n✅ Interpretation complete! Report saved to: {}",
        args.output.display()
    );

    Ok(())
}

/// Read the tumor type and run the annotation service. Any failure here
/// degrades to an empty variant list with a warning; the run still
/// produces (an empty) report.
async fn annotate_input(
    config: &Config,
    input_path: &Path,
    columns: &annotator::InputColumns,
) -> (String, Vec<models::Variant>) {
    let cancer_type = match annotator::read_tumor_type(input_path, &columns.cancer_type) {
        Ok(tumor_type) => tumor_type,
        Err(e) => {
            warn!("Could not read tumor type: {}", e);
            return (String::new(), Vec::new());
        }
    };

    let service = match annotator::Annotator::from_env(config.annotator.script_path.as_deref()) {
        Ok(service) => service,
        Err(e) => {
            warn!("Annotation service unavailable: {}", e);
            return (cancer_type, Vec::new());
        }
    };

    match service.annotate(input_path, &cancer_type, columns).await {
        Ok(variants) => (cancer_type, variants),
        Err(e) => {
            warn!("Annotation failed: {}", e);
            (cancer_type, Vec::new())
        }
    }
}

/// Handle --dry-run: show each variant's routing decision, exit.
fn handle_dry_run(items: &[WorkItem]) -> Result<()> {
    println!("\n🔍 Dry run: routing variants (no reasoning calls)...\n");

    if items.is_empty() {
        println!("   No variants to route.");
    } else {
        for item in items {
            let decision = match engine::route(&item.variant) {
                Route::Skip(reason) => format!("skip ({})", reason),
                Route::DeepResearch => "deep research".to_string(),
            };
            println!("   📄 {} -> {}", item.variant.label(), decision);
        }
        println!("\n   Total: {} variants", items.len());
    }

    println!("\n✅ Dry run complete. No reasoning calls were made.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .oncoscout.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
