#![forbid(unsafe_code)]
//! # chat_cloud CLI
//!
//! Command-line front end of the `chat_cloud` crate: pick a chat-history
//! database export and a conversation, get a textual report plus a word
//! cloud. Results are printed as a JSON envelope on stdout; logs go to
//! stderr (set `RUST_LOG=info` or `debug` to see them).
//!
//! ## Example
//! ```bash
//! cargo run --release -- groups export.db
//! cargo run --release -- group export.db --group-id 12345@chatroom --png cloud.png
//! cat export.db | cargo run --release -- friend - --export-terms terms.csv --export-format csv
//! ```
//!
//! See `--help` for all available options.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use chat_cloud::tokenize::load_stopwords;
use chat_cloud::upload::stage_upload;
use chat_cloud::{
    AnalysisResult, CloudConfig, CloudPipeline, CloudRenderer, ExportFormat, FilterOptions,
    Response, SegmenterKind, TermFilter, Tokenizer, analyze_text, closest_contact, export_terms,
    group_activity, list_groups, open_export,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Optional path to additional stopword file (.txt, one word per line)
    #[arg(long, global = true)]
    stopwords: Option<PathBuf>,

    /// Shortest term kept, in characters
    #[arg(long, global = true, default_value_t = chat_cloud::config::MIN_TERM_CHARS)]
    min_chars: usize,

    /// Text segmentation strategy
    #[arg(long, global = true, value_enum, default_value = "auto")]
    segmenter: SegmenterKind,

    /// Font file used to draw the cloud (default: probe common CJK fonts)
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// Seed of the cloud layout
    #[arg(long, global = true, default_value_t = chat_cloud::config::RANDOM_SEED)]
    seed: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List group conversations of a database export
    Groups {
        /// Database export (.db), or '-' to read it from stdin
        database: String,
    },
    /// Report on the closest one-to-one contact
    Friend {
        /// Database export (.db), or '-' to read it from stdin
        database: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Report on one group conversation
    Group {
        /// Database export (.db), or '-' to read it from stdin
        database: String,
        /// Room id as listed by `groups`
        #[arg(long)]
        group_id: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Word cloud of a plain text file
    Cloud {
        /// UTF-8 text file
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Also write the cloud image to this PNG file
    #[arg(long)]
    png: Option<PathBuf>,

    /// Export the weighted terms to this file
    #[arg(long)]
    export_terms: Option<PathBuf>,

    /// Output format for --export-terms (txt, csv, tsv, json)
    #[arg(long, default_value = "csv")]
    export_format: ExportFormat,
}

fn build_pipeline(cli: &Cli) -> Result<CloudPipeline<CloudRenderer>, String> {
    let mut filter = FilterOptions {
        min_chars: cli.min_chars,
        ..FilterOptions::default()
    };
    if let Some(path) = &cli.stopwords {
        let extra = load_stopwords(path)
            .map_err(|e| format!("Failed to read stopwords {}: {e}", path.display()))?;
        info!("Loaded {} extra stopwords", extra.len());
        filter.stopwords.extend(extra);
    }
    let config = CloudConfig {
        font_path: cli.font.clone(),
        random_seed: cli.seed,
        ..CloudConfig::default()
    };
    Ok(CloudPipeline::new(
        Tokenizer::new(cli.segmenter, TermFilter::new(filter)),
        CloudRenderer::new(config),
    ))
}

/// Runs `f` on the export at `database`, staging stdin into a temporary file for '-'.
fn with_database<T>(
    database: &str,
    f: impl FnOnce(&Path) -> chat_cloud::Result<T>,
) -> Result<T, String> {
    if database == "-" {
        let staged = stage_upload(io::stdin().lock())
            .map_err(|e| format!("Failed to receive database: {e}"))?;
        f(staged.path()).map_err(|e| e.to_string())
    } else {
        f(Path::new(database)).map_err(|e| e.to_string())
    }
}

fn write_outputs(result: &AnalysisResult, output: &OutputArgs) -> Result<(), String> {
    let Some(cloud) = &result.cloud else {
        if output.png.is_some() || output.export_terms.is_some() {
            error!("No word cloud available; nothing written");
        }
        return Ok(());
    };
    if let Some(path) = &output.export_terms {
        export_terms(&cloud.terms, path, output.export_format).map_err(|e| e.to_string())?;
    }
    if let Some(path) = &output.png {
        match &cloud.png {
            Some(png) => fs::write(path, png)
                .map_err(|e| format!("Failed to write {}: {e}", path.display()))?,
            None => error!("Word cloud could not be rendered; {} not written", path.display()),
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<Response, String> {
    match &cli.command {
        Command::Groups { database } => {
            let groups = with_database(database, |path| list_groups(&open_export(path)?))?;
            Ok(Response::groups(groups))
        }
        Command::Friend { database, output } => {
            let pipeline = build_pipeline(cli)?;
            let result =
                with_database(database, |path| closest_contact(&open_export(path)?, &pipeline))?;
            write_outputs(&result, output)?;
            Ok(Response::result(result))
        }
        Command::Group {
            database,
            group_id,
            output,
        } => {
            let pipeline = build_pipeline(cli)?;
            let result = with_database(database, |path| {
                group_activity(&open_export(path)?, group_id, &pipeline)
            })?;
            write_outputs(&result, output)?;
            Ok(Response::result(result))
        }
        Command::Cloud { path, output } => {
            let pipeline = build_pipeline(cli)?;
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            let result = analyze_text(&pipeline, &text);
            write_outputs(&result, output)?;
            Ok(Response::result(result))
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let (response, failed) = match run(&cli) {
        Ok(response) => (response, false),
        Err(e) => {
            error!("Error: {e}");
            (Response::error(e), true)
        }
    };
    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("Failed to serialise response: {e}");
            process::exit(1);
        }
    }
    if failed {
        process::exit(1);
    }
}
