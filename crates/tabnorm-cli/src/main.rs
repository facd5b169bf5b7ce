//! tabnorm CLI
//!
//! Command-line tool for merging row sources and previewing the normalized table.

mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use logging::{init_logging, LogConfig, LogFormat};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tabnorm_core::{
    detect_merge_fields, load_file, normalize, scan_sources, write_csv, write_json,
    NormalizeConfig, NormalizedTable, SourceSet,
};

#[derive(Parser)]
#[command(name = "tabnorm")]
#[command(about = "Merge row sources and infer table columns", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Where the rows come from
#[derive(Args)]
struct InputArgs {
    /// Root directories to scan for .csv/.json sources
    #[arg(short, long, required_unless_present = "input", conflicts_with = "input")]
    root: Vec<PathBuf>,

    /// A single .json (keyed or flat) or .csv input file
    #[arg(short, long)]
    input: Option<PathBuf>,
}

/// How the rows are merged and shown
#[derive(Args)]
struct ConfigArgs {
    /// Normalizer config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not auto-detect merge keys or preserve fields
    #[arg(long)]
    no_auto_merge: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merge keys and preserve fields detected for the sources
    Detect {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Merge the sources and write the normalized table to a file
    Merge {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the normalized table
    Show {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the inferred column definitions
    Columns {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Create a config file template
    InitConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose, cli.log_format));

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> tabnorm_core::Result<()> {
    match command {
        Commands::Detect { input } => cmd_detect(&input),
        Commands::Merge {
            input,
            config,
            format,
            output,
        } => cmd_merge(&input, &config, format, output.as_deref()),
        Commands::Show {
            input,
            config,
            limit,
        } => cmd_show(&input, &config, limit),
        Commands::Columns { input, config } => cmd_columns(&input, &config),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn load_sources(input: &InputArgs) -> tabnorm_core::Result<SourceSet> {
    let sources = match &input.input {
        Some(path) => load_file(path)?,
        None => scan_sources(&input.root)?,
    };
    tracing::info!(
        sources = sources.source_count(),
        rows = sources.row_count(),
        "loaded sources"
    );
    Ok(sources)
}

fn load_config(args: &ConfigArgs) -> tabnorm_core::Result<NormalizeConfig> {
    let mut config = match &args.config {
        Some(path) => NormalizeConfig::load(path)?,
        None => NormalizeConfig::default(),
    };
    if args.no_auto_merge {
        config.auto_merge = false;
    }
    Ok(config)
}

fn build_table(input: &InputArgs, args: &ConfigArgs) -> tabnorm_core::Result<NormalizedTable> {
    let sources = load_sources(input)?;
    let config = load_config(args)?;
    Ok(normalize(&sources, &config))
}

fn cmd_detect(input: &InputArgs) -> tabnorm_core::Result<()> {
    let sources = load_sources(input)?;

    let SourceSet::Keyed(keyed) = &sources else {
        println!("Input is a single flat row sequence; nothing to merge.");
        return Ok(());
    };

    let detected = detect_merge_fields(keyed);

    println!("Sources ({}):", keyed.len());
    for (name, rows) in keyed {
        println!("  {} ({} rows)", name, rows.len());
    }
    println!();
    println!("Common fields:   {}", list_or_none(&detected.common_fields));
    println!("Merge keys:      {}", list_or_none(&detected.merge_key_fields));
    println!("Preserve fields: {}", list_or_none(&detected.preserve_fields));
    println!(
        "Identity field:  {}",
        detected.identity_field.as_deref().unwrap_or("(composite key)")
    );

    Ok(())
}

fn cmd_merge(
    input: &InputArgs,
    args: &ConfigArgs,
    format: OutputFormat,
    output: Option<&Path>,
) -> tabnorm_core::Result<()> {
    let table = build_table(input, args)?;

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        OutputFormat::Csv => write_csv(&table, writer)?,
        OutputFormat::Json => write_json(&table, writer)?,
    }

    if let Some(path) = output {
        println!("Exported {} rows to {}", table.row_count(), path.display());
    }

    Ok(())
}

fn cmd_show(input: &InputArgs, args: &ConfigArgs, limit: Option<usize>) -> tabnorm_core::Result<()> {
    let table = build_table(input, args)?;

    // Print header
    let header: Vec<&str> = table.columns.iter().map(|c| c.title.as_str()).collect();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    // Print rows
    let row_limit = limit.unwrap_or(table.row_count());
    for row in table.rows.iter().take(row_limit) {
        let values: Vec<String> = table
            .columns
            .iter()
            .map(|col| {
                row.get(&col.key)
                    .map(|v| v.to_string_value())
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > row_limit {
        println!("... ({} more rows)", table.row_count() - row_limit);
    }

    Ok(())
}

fn cmd_columns(input: &InputArgs, args: &ConfigArgs) -> tabnorm_core::Result<()> {
    let table = build_table(input, args)?;

    println!("Mode: {:?}", table.mode);
    println!("Merge keys: {}", list_or_none(&table.merge_key_fields));
    println!("Preserve fields: {}", list_or_none(&table.preserve_fields));
    println!();
    println!("Columns ({}):", table.column_count());
    for col in &table.columns {
        let type_name = serde_json::to_value(col.column_type)?;
        println!(
            "  {:<24} {:<10} {}",
            col.key,
            type_name.as_str().unwrap_or_default(),
            col.title
        );
    }

    Ok(())
}

fn cmd_init_config(output: &Path) -> tabnorm_core::Result<()> {
    let config = NormalizeConfig::template();
    config.save(output)?;

    println!("Created config file: {}", output.display());
    println!();
    println!("Edit the file to set your merge keys and columns, then run:");
    println!("  tabnorm show --root <dir> --config {}", output.display());

    Ok(())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
