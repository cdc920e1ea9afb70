//! ask CLI: question answering over a local code index

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ask_core::index::ProgressEvent;
use ask_core::retrieve::RetrievalResult;
use ask_core::search::Answer;
use ask_core::{
    discover, store, AskError, Config, FastEmbedBackend, Indexer, OpenAiProvider, Searcher, ASK_DIR,
};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

#[derive(Parser)]
#[command(name = "ask")]
#[command(about = "Ask questions about your codebase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Question (when no subcommand is given)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new .ask repository
    Init,

    /// Build the index, replacing any previous one
    Build {
        /// Directory to index (default: repository root)
        path: Option<PathBuf>,
    },

    /// Answer a question from the index
    Query {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Show the chunks most similar to a query, without calling the LLM
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show configuration and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Some(Commands::Init) => cmd_init()?,
        Some(Commands::Build { path }) => cmd_build(path).await?,
        Some(Commands::Query { question }) => cmd_query(&question.join(" ")).await?,
        Some(Commands::Search { query, limit }) => cmd_search(&query.join(" "), limit).await?,
        Some(Commands::Status) => cmd_status()?,
        None => {
            if cli.query.is_empty() {
                println!("Usage: ask <question> or ask <command>");
                println!("Run 'ask --help' for more information.");
            } else {
                cmd_query(&cli.query.join(" ")).await?;
            }
        }
    }

    Ok(())
}

fn find_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    discover::find_ask_root(&cwd).context("Not in an ask repository. Run 'ask init' first.")
}

/// Load `.env` from the repository root, then the config.
///
/// Variables already set in the process environment win over `.env`.
fn load_config(root: &Path) -> Result<Config> {
    let env_file = root.join(".env");
    if env_file.is_file() {
        dotenvy::from_path(&env_file)
            .with_context(|| format!("Cannot load {}", env_file.display()))?;
    }
    Ok(Config::load(root)?)
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn cmd_init() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let ask_dir = cwd.join(ASK_DIR);

    if ask_dir.exists() {
        return Err(AskError::AlreadyInitialized(ask_dir).into());
    }

    std::fs::create_dir(&ask_dir)?;
    Config::default().save(&cwd)?;

    println!("Initialized ask repository in {}", ask_dir.display());
    println!("Run 'ask build' to index files.");

    Ok(())
}

/// Resolve a user-supplied directory to a path relative to the repository root.
fn relative_to_root(root: &Path, path: &Path) -> Result<PathBuf> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))?;
    let relative = absolute
        .strip_prefix(root)
        .with_context(|| format!("{} is outside the repository {}", path.display(), root.display()))?;
    Ok(relative.to_path_buf())
}

async fn cmd_build(path: Option<PathBuf>) -> Result<()> {
    let root = find_root()?;
    let config = load_config(&root)?;
    let relative = path.map(|p| relative_to_root(&root, &p)).transpose()?;

    let pb = spinner("Scanning files...")?;
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("█▓░");

    let backend = FastEmbedBackend::new(config.model.clone());
    let mut indexer = Indexer::new(root, config, backend);

    indexer.set_progress_callback(Box::new({
        let pb = pb.clone();
        move |event| match event {
            ProgressEvent::Loading => pb.set_message("Scanning files..."),
            ProgressEvent::Splitting { files } => {
                pb.set_message(format!("Splitting {} files...", files));
            }
            ProgressEvent::Embedding { current, total } => {
                pb.set_style(bar_style.clone());
                pb.set_length(total as u64);
                pb.set_position(current as u64);
                pb.set_message("Embedding chunks");
            }
            ProgressEvent::Saving { chunks } => {
                pb.set_message(format!("Saving {} chunks...", chunks));
            }
        }
    }));

    let stats = indexer.build(relative.as_deref()).await?;

    pb.finish_and_clear();

    println!("✓ Index built:");
    println!("  Files loaded:   {}", stats.files_loaded);
    println!("  Chunks created: {}", stats.chunks_created);
    match stats.dimension {
        Some(dim) => println!("  Dimension:      {}", dim),
        None => println!("  Dimension:      - (nothing indexed)"),
    }
    println!("  Index file:     {}", stats.index_path.display());

    Ok(())
}

async fn cmd_query(question: &str) -> Result<()> {
    let root = find_root()?;
    let config = load_config(&root)?;

    let searcher = Searcher::open(&root, &config, FastEmbedBackend::new(config.model.clone()))?;
    let provider = OpenAiProvider::from_config(&config.llm)?;

    let pb = spinner("Thinking...")?;
    let answer = searcher.ask(&provider, question).await;
    pb.finish_and_clear();

    print_answer(&answer?);
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);

    if answer.citations.is_empty() {
        return;
    }

    println!();
    println!("\x1b[1mSources:\x1b[0m");
    for citation in &answer.citations {
        println!(
            "  \x1b[1m{}\x1b[0m:\x1b[33m{}-{}\x1b[0m ({}) [{}/10]",
            citation.path,
            citation.start_line,
            citation.end_line,
            citation.label,
            citation.relevance_score
        );
    }
}

async fn cmd_search(query: &str, limit: usize) -> Result<()> {
    let root = find_root()?;
    let config = load_config(&root)?;

    let pb = spinner("Searching...")?;
    let searcher = Searcher::open(&root, &config, FastEmbedBackend::new(config.model.clone()))?;
    let results = searcher.search(query, limit).await;
    pb.finish_and_clear();
    let results = results?;

    if results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    let highlighter = SnippetHighlighter::new();

    println!("Results for: {}\n", query);

    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result, &highlighter);
    }

    Ok(())
}

fn cmd_status() -> Result<()> {
    let root = find_root()?;
    let config = load_config(&root)?;
    let index_path = config.index_path(&root);

    println!("ask repository: {}", root.display());
    println!();
    println!("Configuration:");
    println!("  Embedding model: {}", config.model);
    println!("  Chat model:      {} ({})", config.llm.model, config.llm.base_url);
    println!("  Recall top-n:    {}", config.top_n);
    println!("  Rerank top-k:    {}", config.top_k);
    println!("  Max file size:   {} bytes", config.max_file_size);
    println!();
    println!("Index ({}):", index_path.display());

    match store::load_store(&index_path) {
        Some(index) => {
            let files: BTreeSet<&str> = index
                .chunks
                .iter()
                .map(|c| c.chunk.file_path.as_str())
                .collect();
            println!("  Version:   {}", index.version);
            println!("  Built:     {}", index.created_at.to_rfc3339());
            println!("  Files:     {}", files.len());
            println!("  Chunks:    {}", index.chunks.len());
            if let Some(dim) = index.dimension() {
                println!("  Dimension: {}", dim);
            }
        }
        None => println!("  No usable index. Run 'ask build'."),
    }

    Ok(())
}

/// Print a recall result: header line, then the highlighted snippet.
fn print_result(index: usize, result: &RetrievalResult, highlighter: &SnippetHighlighter) {
    let chunk = &result.chunk.chunk;
    let score_color = match result.score {
        s if s > 0.7 => "\x1b[32m",
        s if s > 0.5 => "\x1b[33m",
        _ => "\x1b[31m",
    };

    println!(
        "\x1b[1;36m[{}]\x1b[0m {}{:.3}\x1b[0m  \x1b[1m{}\x1b[0m:\x1b[33m{}-{}\x1b[0m ({})",
        index,
        score_color,
        result.score,
        chunk.file_path,
        chunk.start_line,
        chunk.end_line,
        chunk.label(),
    );

    let snippet = numbered_snippet(&chunk.content, chunk.start_line);
    println!("{}\n", highlighter.render(&snippet, chunk.fence_language()));
}

/// Prefix each line of a chunk with its file line number. Chunks longer than
/// `MAX_LINES` keep their head and tail around an elision marker.
fn numbered_snippet(content: &str, start_line: usize) -> String {
    const MAX_LINES: usize = 12;
    const HEAD: usize = 5;
    const TAIL: usize = 3;

    let lines: Vec<&str> = content.lines().collect();
    let gutter = |(i, line): (usize, &&str)| format!("│ {:4} │ {}\n", start_line + i, line);

    if lines.len() <= MAX_LINES {
        return lines.iter().enumerate().map(gutter).collect();
    }

    let tail_from = lines.len() - TAIL;
    let mut out: String = lines.iter().enumerate().take(HEAD).map(gutter).collect();
    out.push_str(&format!(
        "\x1b[2m     ┊  ... {} more lines ...\x1b[0m\n",
        tail_from - HEAD
    ));
    out.extend(lines.iter().enumerate().skip(tail_from).map(gutter));
    out
}

/// Terminal syntax highlighting through syntect.
struct SnippetHighlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl SnippetHighlighter {
    const THEME: &'static str = "base16-ocean.dark";

    fn new() -> Self {
        let mut themes = ThemeSet::load_defaults();
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme: themes.themes.remove(Self::THEME).unwrap_or_default(),
        }
    }

    /// Highlight `code` by file extension; unknown extensions render as plain text.
    fn render(&self, code: &str, extension: &str) -> String {
        let syntax = self
            .syntaxes
            .find_syntax_by_extension(extension)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());
        let mut lines = HighlightLines::new(syntax, &self.theme);

        let mut out: String = LinesWithEndings::from(code)
            .map(|line| match lines.highlight_line(line, &self.syntaxes) {
                Ok(ranges) => as_24_bit_terminal_escaped(&ranges, false),
                Err(_) => line.to_string(),
            })
            .collect();
        out.push_str("\x1b[0m");
        out
    }
}
