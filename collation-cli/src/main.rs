//! Collate CLI - Align textual witnesses into a collation table

use clap::{CommandFactory, Parser, Subcommand};
use collation_client::Collator;
use collation_core::config::DEFAULT_CONFIG;
use collation_core::{
    siglum_for_index, CollationTable, CollationTableData, Config, EngineKind, ErrorEnvelope,
    RunDetails, StringWitness, VariantTable,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "collate")]
#[command(about = "Automatic collation of textual witnesses", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "COLLATION_CONFIG")]
    config: Option<PathBuf>,

    /// CollateX server URL (e.g., http://127.0.0.1:7369); selects the HTTP engine
    #[arg(long, global = true, env = "COLLATEX_URL")]
    engine_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WitnessArgs {
    /// Witness text files, one per witness
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Sigla for the files, comma separated (default: A, B, C, ...)
    #[arg(long, value_delimiter = ',')]
    sigla: Vec<String>,

    /// Language of the witnesses (overrides [collation].lang)
    #[arg(long)]
    lang: Option<String>,

    /// Leave punctuation out of the collation
    #[arg(long)]
    ignore_punctuation: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Align witness files and print the collation table
    Align {
        #[command(flatten)]
        witnesses: WitnessArgs,

        /// Drop columns where no witness has a reading
        #[arg(long)]
        remove_empty_columns: bool,

        /// Siglum whose readings serve as lemmata for the apparatus
        #[arg(long)]
        base: Option<String>,

        /// Title of the collation table
        #[arg(long)]
        title: Option<String>,
    },

    /// Print the engine input for witness files without aligning them
    Input {
        #[command(flatten)]
        witnesses: WitnessArgs,
    },

    /// Check that the configured alignment engine can run
    Check,

    /// Print the default configuration
    DefaultConfig,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Align {
            witnesses,
            remove_empty_columns,
            base,
            title,
        } => cmd_align(
            &cli,
            witnesses,
            *remove_empty_columns,
            base.as_deref(),
            title.as_deref(),
        ),
        Commands::Input { witnesses } => cmd_input(&cli, witnesses),
        Commands::Check => cmd_check(&cli),
        Commands::DefaultConfig => {
            print!("{}", DEFAULT_CONFIG);
            Ok(())
        }
    };

    if let Err(e) = result {
        if cli.json {
            let envelope = ErrorEnvelope::from(&e);
            match serde_json::to_string_pretty(&envelope) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("Error: {}", e),
            }
        } else {
            eprintln!("Error: {}", e);
            if !e.hint().is_empty() {
                eprintln!("Hint: {}", e.hint());
            }
        }
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> collation_core::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.engine_url {
        config.engine.kind = EngineKind::Http;
        config.engine.url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> collation_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Pair each file with a siglum, generating the ones not given.
fn sigla_for(args: &WitnessArgs) -> Vec<String> {
    if args.sigla.len() > args.files.len() {
        Cli::command()
            .error(
                clap::error::ErrorKind::ArgumentConflict,
                format!(
                    "{} sigla given for {} files",
                    args.sigla.len(),
                    args.files.len()
                ),
            )
            .exit();
    }
    (0..args.files.len())
        .map(|i| args.sigla.get(i).cloned().unwrap_or_else(|| siglum_for_index(i)))
        .collect()
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build a table holding every file as a witness, not yet aligned.
fn build_table(
    collator: &Collator,
    args: &WitnessArgs,
) -> collation_core::Result<CollationTable> {
    let mut settings = collator.settings().clone();
    if let Some(lang) = &args.lang {
        settings.lang = lang.clone();
    }
    settings.ignore_punctuation |= args.ignore_punctuation;

    let mut table = collator.table_for(&settings)?;
    for (siglum, path) in sigla_for(args).iter().zip(&args.files) {
        let text = std::fs::read_to_string(path)?;
        let title = file_title(path);
        let witness = StringWitness::new(title.clone(), "", text);
        table.add_witness_with_title(siglum, &witness, &title, false)?;
        tracing::debug!(siglum = %siglum, path = %path.display(), "Loaded witness");
    }
    Ok(table)
}

#[derive(Serialize)]
struct AlignOutput {
    sigla: Vec<String>,
    variants: VariantTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    apparatus: Option<Vec<String>>,
    data: CollationTableData,
    engine: RunDetails,
}

fn cmd_align(
    cli: &Cli,
    args: &WitnessArgs,
    remove_empty_columns: bool,
    base: Option<&str>,
    title: Option<&str>,
) -> collation_core::Result<()> {
    let config = load_config(cli)?;
    let collator = Collator::from_config(&config)?;
    let mut table = build_table(&collator, args)?;
    if let Some(title) = title {
        table.set_title(title);
    }
    if let Some(base) = base {
        if !table.is_siglum_in_table(base) {
            return Err(collation_core::CollationError::UnknownSiglum(base.to_string()));
        }
    }

    let details = collator.align_with(
        &mut table,
        remove_empty_columns || config.collation.remove_empty_columns,
    )?;
    let apparatus = base.map(|b| table.apparatus_for_base(b)).transpose()?;

    if cli.json {
        return print_json(&AlignOutput {
            sigla: table.sigla().to_vec(),
            variants: table.variant_table(),
            apparatus,
            data: table.to_data(),
            engine: details,
        });
    }

    print_table(&table);
    if let Some(entries) = apparatus {
        print_apparatus(&entries);
    }
    print_details(&details, &table);
    Ok(())
}

fn print_table(table: &CollationTable) {
    use colored::Colorize;

    let rows = table.rows();
    let widths: Vec<usize> = (0..table.token_count())
        .map(|col| {
            rows.iter()
                .map(|(_, tokens)| tokens[col].text().chars().count())
                .max()
                .unwrap_or(0)
                .max(1)
        })
        .collect();
    let siglum_width = table.sigla().iter().map(|s| s.len()).max().unwrap_or(0);
    let variants = table.variant_table();

    for (siglum, tokens) in &rows {
        let ranks = variants.get(siglum).unwrap_or(&[]);
        let cells: Vec<String> = tokens
            .iter()
            .enumerate()
            .map(|(col, token)| {
                let cell = if token.is_empty() {
                    "-".to_string()
                } else {
                    token.text().to_string()
                };
                let padded = format!("{:<width$}", cell, width = widths[col]);
                match ranks.get(col) {
                    Some(-1) => padded.dimmed().to_string(),
                    Some(0) | None => padded,
                    Some(_) => padded.yellow().to_string(),
                }
            })
            .collect();
        println!(
            "{} | {}",
            format!("{:<width$}", siglum, width = siglum_width).cyan(),
            cells.join(" | ")
        );
    }
}

fn print_apparatus(entries: &[String]) {
    use colored::Colorize;

    println!();
    let mut any = false;
    for (col, entry) in entries.iter().enumerate() {
        if entry.is_empty() {
            continue;
        }
        any = true;
        println!("{} {}", format!("{:>4}", col).blue(), entry.trim_end());
    }
    if !any {
        println!("{}", "No variants".green());
    }
}

fn print_details(details: &RunDetails, table: &CollationTable) {
    use colored::Colorize;

    println!();
    println!(
        "{}: {} witnesses, {} columns ({} in {} ms)",
        "Aligned".green(),
        table.witness_count(),
        table.token_count(),
        details.engine,
        details.duration_ms
    );
}

fn cmd_input(cli: &Cli, args: &WitnessArgs) -> collation_core::Result<()> {
    let config = load_config(cli)?;
    let collator = Collator::from_config(&config)?;
    let table = build_table(&collator, args)?;
    // Engine input is JSON by nature; --json makes no difference here.
    print_json(&table.engine_input())
}

#[derive(Serialize)]
struct CheckOutput {
    engine: String,
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorEnvelope>,
}

fn cmd_check(cli: &Cli) -> collation_core::Result<()> {
    use colored::Colorize;

    let config = load_config(cli)?;
    let collator = Collator::from_config(&config)?;
    let check = collator.check_environment();

    if cli.json {
        print_json(&CheckOutput {
            engine: collator.engine_name().to_string(),
            ready: check.is_ok(),
            error: check.as_ref().err().map(ErrorEnvelope::from),
        })?;
        return check;
    }

    match &config.engine.kind {
        EngineKind::Http => println!("{}: {}", "Server".blue(), config.engine.url),
        EngineKind::Process => {
            println!("{}: {}", "Java".blue(), config.engine.java.display());
            println!("{}: {}", "Jar".blue(), config.engine.jar.display());
            println!("{}: {}", "Temp dir".blue(), config.engine.temp_dir.display());
        }
    }
    check?;
    println!("{}: {} is ready", "OK".green(), collator.engine_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sigla_are_generated_for_missing_names() {
        let args = WitnessArgs {
            files: vec!["a.txt".into(), "b.txt".into(), "c.txt".into()],
            sigla: vec!["L".into()],
            lang: None,
            ignore_punctuation: false,
        };
        assert_eq!(sigla_for(&args), vec!["L", "B", "C"]);
    }

    #[test]
    fn parses_align_flags() {
        let cli = Cli::try_parse_from([
            "collate",
            "align",
            "a.txt",
            "b.txt",
            "--sigla",
            "P,V",
            "--base",
            "P",
            "--remove-empty-columns",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Align {
                witnesses,
                remove_empty_columns,
                base,
                ..
            } => {
                assert_eq!(witnesses.sigla, vec!["P", "V"]);
                assert!(remove_empty_columns);
                assert_eq!(base.as_deref(), Some("P"));
            }
            _ => panic!("expected align"),
        }
    }

    #[test]
    fn build_table_reads_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("paris.txt");
        let b = dir.path().join("vatican.txt");
        std::fs::write(&a, "Gallia est omnis divisa").unwrap();
        std::fs::write(&b, "Gallia omnis divisa est").unwrap();

        let collator = Collator::from_config(&Config::default()).unwrap();
        let args = WitnessArgs {
            files: vec![a, b],
            sigla: Vec::new(),
            lang: None,
            ignore_punctuation: false,
        };
        let table = build_table(&collator, &args).unwrap();
        assert_eq!(table.sigla(), &["A".to_string(), "B".to_string()]);
        assert_eq!(table.witness_title("A"), Some("paris"));
        let input = table.engine_input();
        assert_eq!(input.witnesses[0].tokens[0].t, "gallia");
    }
}
