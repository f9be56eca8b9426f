//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// OncoScout - LLM-powered interpreter for cancer genomic variants
///
/// Annotates a tab-separated variant file, decides per variant whether a
/// deeper literature/trial investigation is warranted, runs a bounded
/// research loop for the variants that need it, and writes one
/// normalized report row per variant.
///
/// Examples:
///   oncoscout --input-txt variants.txt
///   oncoscout --input-txt variants.txt --model qwen-max --max-steps 20
///   oncoscout --input-txt variants.txt --output report.json --format json
///   oncoscout --input-txt variants.txt --dry-run
///   oncoscout --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to a tab-separated variant file for analysis
    ///
    /// Not required when using --init-config.
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "init_config"
    )]
    pub input_txt: Option<PathBuf>,

    /// Column name for the gene symbol in the input file
    #[arg(long, default_value = "Hugo_Symbol", value_name = "COL")]
    pub gene_col: String,

    /// Column name for the protein change (HGVSp) in the input file
    #[arg(long, default_value = "HGVSp_Short", value_name = "COL")]
    pub protein_change_col: String,

    /// Column name for the cancer type in the input file
    #[arg(long, default_value = "Cancer_Type", value_name = "COL")]
    pub cancer_type_col: String,

    /// Output file path for the report
    #[arg(
        short,
        long,
        default_value = "variant_interpretation_report.tsv",
        value_name = "FILE"
    )]
    pub output: PathBuf,

    /// Output format (tsv, json)
    #[arg(long, default_value = "tsv", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Reasoning model to use
    ///
    /// Can also be set via MODEL_NAME env var or .oncoscout.toml config.
    #[arg(short, long, env = "MODEL_NAME")]
    pub model: Option<String>,

    /// Reasoning service base URL (OpenAI-compatible chat completions)
    #[arg(long, env = "LLM_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .oncoscout.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum reasoning steps per research loop
    ///
    /// The loop is forced to complete once this bound is reached.
    #[arg(long, value_name = "COUNT")]
    pub max_steps: Option<usize>,

    /// Request timeout in seconds for the reasoning service
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: annotate and route variants without any reasoning calls
    ///
    /// Shows which variants would go through deep research and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .oncoscout.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated values (default)
    #[default]
    Tsv,
    /// JSON format, including run metadata
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the input path; validated to be present before use.
    pub fn input_path(&self) -> &PathBuf {
        self.input_txt
            .as_ref()
            .expect("input path validated at startup")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref input) = self.input_txt else {
            return Err("An input file is required".to_string());
        };
        if !input.exists() {
            return Err(format!("Input file does not exist: {}", input.display()));
        }
        if !input.is_file() {
            return Err(format!("Input path is not a file: {}", input.display()));
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(max_steps) = self.max_steps {
            if max_steps == 0 {
                return Err("Max steps must be at least 1".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
