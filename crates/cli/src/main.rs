//! Gemini command-line interface.
//!
//! Three commands drive the engine: `hash` indexes a file tree, `query`
//! probes the index with one file, and `report` enumerates duplicate groups
//! and similarity communities across the whole index.
//!
//! Exit codes are part of the contract: 0 on success, 2 on argument parse
//! failure, 142 when an index build fails, 1 otherwise.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use gemini::config::GeminiConfig;
use gemini::{
    content_sha1, load_vocabulary, persist_vocabulary, FunctionFilter, HashPipeline,
    HttpAstService, HttpFeatureService, Mode, RepoFile, Report, Reporter, ReportStrategy, Store,
    WmhParams, DEFAULT_SEED,
};

const BUILD_FAILURE_EXIT: u8 = 142;

#[derive(Parser)]
#[command(name = "gemini")]
#[command(about = "Find duplicate and near-duplicate source files across repositories")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store host (wide-column drivers only)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Store port (wide-column drivers only)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Keyspace holding the hashtables
    #[arg(long, global = true)]
    keyspace: Option<String>,

    /// Similarity mode
    #[arg(long, global = true, value_parser = ["file", "func"])]
    mode: Option<String>,

    /// Document-frequency vocabulary file (json or json.zst)
    #[arg(long, global = true)]
    docfreq: Option<PathBuf>,

    /// AST service endpoint
    #[arg(long, global = true)]
    ast_endpoint: Option<String>,

    /// Feature-extraction service endpoint
    #[arg(long, global = true)]
    features_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index all files under a path
    Hash {
        /// File or directory to index
        path: PathBuf,

        /// Repository name recorded in provenance
        #[arg(long, default_value = "local")]
        repo: String,

        /// Commit recorded in provenance
        #[arg(long, default_value = "WORKDIR")]
        commit: String,

        /// Drop the band keyspace before indexing (full re-hash)
        #[arg(long)]
        rehash: bool,
    },

    /// Find duplicates and near-duplicates of one file
    Query {
        /// File to probe with
        file: PathBuf,

        /// Restrict to one function by name (func mode)
        #[arg(long)]
        function: Option<String>,

        /// Restrict to the function starting at this line (func mode)
        #[arg(long)]
        line: Option<u32>,
    },

    /// Enumerate duplicate groups and similarity communities
    Report {
        /// Output format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        output: String,

        /// Extraction strategy ("", "condensed", or "use-group-by")
        #[arg(long, default_value = "")]
        format: String,

        /// Directory for raw connected-component output
        #[arg(long)]
        cc_output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // clap exits 2 on parse failures, 0 for --help/--version.
        Err(err) => err.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let is_hash = matches!(cli.command, Commands::Hash { .. });
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_hash {
                ExitCode::from(BUILD_FAILURE_EXIT)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

struct Runtime {
    config: GeminiConfig,
    store: Arc<Store>,
    mode: Mode,
}

fn runtime(cli: &Cli) -> Result<Runtime> {
    let mut config = match &cli.config {
        Some(path) => GeminiConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeminiConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.store.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.store.port = port;
    }
    if let Some(keyspace) = &cli.keyspace {
        config.store.keyspace = keyspace.clone();
    }
    if let Some(mode) = &cli.mode {
        config.mode = mode.parse()?;
    }
    if let Some(path) = &cli.docfreq {
        config.vocabulary.path = Some(path.clone());
    }
    if let Some(endpoint) = &cli.ast_endpoint {
        config.services.ast_endpoint = endpoint.clone();
    }
    if let Some(endpoint) = &cli.features_endpoint {
        config.services.features_endpoint = endpoint.clone();
    }

    let backend = config.store.backend_config()?;
    let store = Arc::new(Store::new(backend)?);
    let mode = config.mode;
    Ok(Runtime {
        config,
        store,
        mode,
    })
}

fn pipeline(rt: &Runtime) -> Result<HashPipeline> {
    let vocab = load_vocabulary(
        rt.config.vocabulary.path.as_deref(),
        &rt.store,
        rt.mode,
    )?
    .context("no vocabulary available; pass --docfreq or index one into the store")?;

    let params = WmhParams::generate(rt.mode.params(), vocab.len(), DEFAULT_SEED)?;
    Ok(HashPipeline::new(
        rt.store.clone(),
        Arc::new(vocab),
        Arc::new(params),
        rt.mode,
        Arc::new(HttpAstService::new(rt.config.services.ast_endpoint.clone())),
        Arc::new(HttpFeatureService::new(
            rt.config.services.features_endpoint.clone(),
        )),
    ))
}

fn run(cli: Cli) -> Result<()> {
    let rt = runtime(&cli)?;
    match cli.command {
        Commands::Hash {
            path,
            repo,
            commit,
            rehash,
        } => hash(&rt, &path, &repo, &commit, rehash),
        Commands::Query {
            file,
            function,
            line,
        } => query(&rt, &file, function, line),
        Commands::Report {
            output,
            format,
            cc_output,
        } => report(&rt, &output, &format, cc_output.as_deref()),
    }
}

fn hash(rt: &Runtime, path: &Path, repo: &str, commit: &str, rehash: bool) -> Result<()> {
    let pipeline = pipeline(rt)?;

    if rehash {
        rt.store.drop_hashtables(rt.mode)?;
        info!(mode = %rt.mode, "band keyspace dropped for re-hash");
    }

    let mut units = Vec::new();
    collect_files(path, &mut |file_path| {
        let content = std::fs::read(file_path)
            .with_context(|| format!("reading {}", file_path.display()))?;
        let sha = content_sha1(&content);
        units.push((
            RepoFile {
                repo: repo.to_string(),
                commit: commit.to_string(),
                path: file_path.display().to_string(),
                sha,
            },
            content,
        ));
        Ok(())
    })?;

    info!(files = units.len(), mode = %rt.mode, "hashing corpus");
    let summary = pipeline.hash_batch(&units)?;
    if rt.config.vocabulary.path.is_some() {
        persist_vocabulary(&rt.store, rt.mode, &pipeline.vocabulary())?;
    }

    println!(
        "indexed {} units, {} empty, {} skipped",
        summary.indexed, summary.empty, summary.skipped
    );
    let skips = pipeline.skip_counts().snapshot();
    if !skips.is_empty() {
        println!("skipped files by cause:");
        for (class, count) in skips {
            println!("  {class}: {count}");
        }
    }
    Ok(())
}

fn query(rt: &Runtime, file: &Path, function: Option<String>, line: Option<u32>) -> Result<()> {
    let pipeline = pipeline(rt)?;
    let matcher = pipeline.matcher();

    let filter = match (function, line) {
        (Some(name), Some(start_line)) => Some(FunctionFilter { name, start_line }),
        (None, None) => None,
        _ => bail!("--function and --line must be given together"),
    };
    if filter.is_some() && rt.mode != Mode::Func {
        bail!("--function/--line require --mode func");
    }

    let content =
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let result = matcher.query(&file.display().to_string(), &content, filter.as_ref())?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn report(rt: &Runtime, output: &str, format: &str, cc_output: Option<&Path>) -> Result<()> {
    let strategy = match format {
        "" => ReportStrategy::Grouped,
        "condensed" | "use-group-by" => ReportStrategy::Condensed,
        other => bail!("unknown report format '{other}'"),
    };

    let reporter = Reporter::new(rt.store.clone(), rt.mode);

    if let Some(dir) = cc_output {
        std::fs::create_dir_all(dir)?;
        let communities = reporter.community_keys(strategy)?;
        let path = dir.join("communities.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&communities)?)?;
        info!(path = %path.display(), "raw connected components written");
    }

    let report = reporter.report(strategy)?;
    match output {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_report(&report),
    }
    Ok(())
}

fn print_text_report(report: &Report) {
    if report.duplicates.is_empty() {
        println!("no duplicate files");
    }
    for group in &report.duplicates {
        println!("duplicates ({}):", group.sha);
        for file in &group.files {
            println!("  {}/{} @ {}", file.repo, file.path, file.commit);
        }
    }

    if report.similarities.is_empty() {
        println!("no similar units");
    }
    for (i, community) in report.similarities.iter().enumerate() {
        println!("community {} ({} members):", i, community.len());
        for member in community {
            match member {
                gemini::MemberRef::File(file) => {
                    println!("  {}/{}", file.repo, file.path);
                }
                gemini::MemberRef::Func { file, name, line } => {
                    println!("  {}/{}:{} {}", file.repo, file.path, line, name);
                }
            }
        }
    }
    println!(
        "{} duplicate groups, {} communities",
        report.duplicates.len(),
        report.similarities.len()
    );
}

/// Depth-first walk over regular files, hidden entries skipped.
fn collect_files(
    path: &Path,
    visit: &mut dyn FnMut(&Path) -> Result<()>,
) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?;
    if metadata.is_file() {
        return visit(path);
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.starts_with('.'))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    for entry in entries {
        collect_files(&entry, visit)?;
    }
    Ok(())
}
