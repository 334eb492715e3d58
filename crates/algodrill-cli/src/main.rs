//! algodrill CLI
//!
//! A command-line tool for drilling algorithm problems: browse the catalog,
//! judge solutions against a problem's tests and track progress.

use std::path::{Path, PathBuf};
use std::time::Duration;

use algodrill::runner::report;
use algodrill::{
    Catalog, Config, Difficulty, EXAMPLE_CONFIG, FileProgressStore, Judge, Problem,
    ProblemFilter, ProgressStore, RunReport, StaticCatalog, Status, SubmissionRequest, TestCase,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "algodrill")]
#[command(about = "Drill algorithm problems against a sandboxed judge")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: algodrill.toml)
        #[arg(short, long, default_value = "algodrill.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List catalog problems with their status
    List {
        /// Only problems of this category (substring match)
        #[arg(long)]
        category: Option<String>,

        /// Only problems of this difficulty (Easy, Medium, Hard)
        #[arg(long)]
        difficulty: Option<String>,

        /// Only problems whose name or a tag contains this text (any case)
        #[arg(short, long)]
        search: Option<String>,

        /// Only problems with this status (needs-work, comfortable, complete)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a problem's summary and starting code
    Show {
        /// Problem ID (e.g., binary-search)
        id: String,

        /// Print the reference solution instead of the stub
        #[arg(short, long)]
        reference: bool,
    },

    /// Judge a source file against a problem's tests
    Check {
        /// Problem ID whose tests are used
        id: String,

        /// Source file to judge
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Test cases file (JSON array of {input, expected}) replacing the problem's
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Deadline in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the wire JSON instead of text
        #[arg(long)]
        json: bool,

        /// Save the source as the problem's code
        #[arg(short, long)]
        save: bool,
    },

    /// Judge the saved code (or the reference solution) of a problem
    Run {
        /// Problem ID
        id: String,

        /// Judge the reference solution
        #[arg(short, long)]
        reference: bool,

        /// Print the wire JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show or set a problem's status
    Status {
        /// Problem ID
        id: String,

        /// needs-work, comfortable, complete, or clear
        status: Option<String>,
    },

    /// Forget all progress
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::from_env().context("failed to load configuration")?
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::List {
            category,
            difficulty,
            search,
            status,
        } => {
            let filter = ProblemFilter {
                category,
                difficulty: difficulty.as_deref().map(parse_difficulty).transpose()?,
                search,
                status: status.as_deref().map(str::parse::<Status>).transpose()?,
            };
            list_problems(&config, &filter)
        }
        Commands::Show { id, reference } => show_problem(&config, &id, reference),
        Commands::Check {
            id,
            source,
            cases,
            timeout_ms,
            json,
            save,
        } => {
            let options = CheckOptions {
                cases: cases.as_deref(),
                timeout_ms,
                json,
                save,
            };
            run_check(&config, &id, &source, options).await
        }
        Commands::Run {
            id,
            reference,
            json,
        } => run_saved(&config, &id, reference, json).await,
        Commands::Status { id, status } => set_status(&config, &id, status.as_deref()),
        Commands::Reset { yes } => reset_progress(&config, yes),
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

fn load_catalog(config: &Config) -> Result<StaticCatalog> {
    StaticCatalog::load(config.catalog_path.as_deref()).context("failed to load catalog")
}

fn find_problem<'a>(catalog: &'a StaticCatalog, id: &str) -> Result<&'a Problem> {
    catalog.require(id).context("run `algodrill list` to see problem IDs")
}

fn list_problems(config: &Config, filter: &ProblemFilter) -> Result<()> {
    let catalog = load_catalog(config)?;
    let progress = FileProgressStore::open(config.progress_dir());

    let rows = listing(&catalog, &progress, filter);
    if rows.is_empty() {
        println!("No problems match");
    }
    for row in rows {
        println!("{row}");
    }
    Ok(())
}

/// One line per problem that passes `filter`, in catalog order
fn listing(catalog: &impl Catalog, progress: &impl ProgressStore, filter: &ProblemFilter) -> Vec<String> {
    catalog
        .problems()
        .iter()
        .filter_map(|problem| {
            let status = progress.status(&problem.id);
            filter.matches(problem, status).then(|| {
                let status = status.map_or_else(|| "-".to_string(), |s| s.to_string());
                format!(
                    "  {:<22} {:<7} {:<12} {}",
                    problem.id, problem.difficulty, status, problem.name
                )
            })
        })
        .collect()
}

fn parse_difficulty(s: &str) -> Result<Difficulty> {
    match s.to_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => anyhow::bail!("unknown difficulty '{other}' (expected Easy, Medium or Hard)"),
    }
}

fn show_problem(config: &Config, id: &str, reference: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let problem = find_problem(&catalog, id)?;

    println!("{} [{}] ({})", problem.name, problem.difficulty, problem.category);
    println!("{}", problem.summary);
    if !problem.tags.is_empty() {
        println!("Tags: {}", problem.tags.join(", "));
    }
    let cases = problem.test_cases.as_ref().map_or(0, Vec::len);
    println!("Test cases: {cases}");
    println!();
    if reference {
        print!("{}", problem.reference);
    } else {
        print!("{}", problem.stub);
    }
    Ok(())
}

struct CheckOptions<'a> {
    cases: Option<&'a Path>,
    timeout_ms: Option<u64>,
    json: bool,
    save: bool,
}

async fn run_check(config: &Config, id: &str, source: &Path, options: CheckOptions<'_>) -> Result<()> {
    let catalog = load_catalog(config)?;
    let problem = find_problem(&catalog, id)?;

    let source_content = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let mut request = problem.request(source_content);
    if let Some(path) = options.cases {
        let content = tokio::fs::read_to_string(path)
            .await
            .context("failed to read test cases file")?;
        let cases: Vec<TestCase> =
            serde_json::from_str(&content).context("failed to parse test cases file")?;
        request.test_cases = cases;
    }
    if request.test_cases.is_empty() {
        anyhow::bail!("problem '{id}' has no test cases; pass --cases");
    }

    if options.save {
        let mut progress = FileProgressStore::open(config.progress_dir());
        progress
            .save_code(id, &request.source)
            .context("failed to save code")?;
        debug!(id, "saved code");
    }

    let timeout = options
        .timeout_ms
        .map_or_else(|| config.timeout(), Duration::from_millis);
    let judge = Judge::new(config.clone());
    let report = judge.run_with_timeout(&request, timeout).await;
    finish(&report, options.json)
}

async fn run_saved(config: &Config, id: &str, reference: bool, json: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let problem = find_problem(&catalog, id)?;
    if !problem.has_tests() {
        anyhow::bail!("problem '{id}' has no test cases");
    }

    let source = if reference {
        problem.reference.clone()
    } else {
        let progress = FileProgressStore::open(config.progress_dir());
        progress
            .code(id)
            .map(str::to_string)
            .with_context(|| format!("no saved code for '{id}'; use `algodrill check --save`"))?
    };

    info!(id, reference, "judging");
    let request: SubmissionRequest = problem.request(source);
    let report = Judge::new(config.clone()).run(&request).await;
    finish(&report, json)
}

/// Print the report; failed checks exit non-zero
fn finish(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let wire = report::to_wire(report);
        println!(
            "{}",
            serde_json::to_string_pretty(&wire).context("failed to render report")?
        );
    } else {
        print!("{}", report::render_text(report));
    }

    if report.all_passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn set_status(config: &Config, id: &str, status: Option<&str>) -> Result<()> {
    let catalog = load_catalog(config)?;
    find_problem(&catalog, id)?;
    let mut progress = FileProgressStore::open(config.progress_dir());

    let Some(status) = status else {
        match progress.status(id) {
            Some(status) => println!("{id}: {status}"),
            None => println!("{id}: no status"),
        }
        return Ok(());
    };

    let status = match status {
        "clear" => None,
        other => Some(other.parse::<Status>()?),
    };
    progress
        .set_status(id, status)
        .context("failed to save progress")?;
    match status {
        Some(status) => println!("{id}: {status}"),
        None => println!("{id}: cleared"),
    }
    Ok(())
}

fn reset_progress(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("this forgets every status and saved solution; rerun with --yes");
    }
    let mut progress = FileProgressStore::open(config.progress_dir());
    progress.reset().context("failed to reset progress")?;
    println!("Progress reset");
    Ok(())
}

fn show_config(config: &Config) {
    let limits = &config.limits;
    println!("Timeout: {} ms", config.timeout_ms);
    println!("Execution limits:");
    println!("  Max steps: {:?}", limits.max_steps);
    println!("  Worker stack: {} KB", limits.stack_size_bytes() / 1024);
    println!("  Engine memory: {} KB", limits.memory_limit_bytes() / 1024);
    println!("  Console lines: {}", limits.console_lines());
    println!();
    match &config.catalog_path {
        Some(path) => println!("Catalog: {}", path.display()),
        None => println!("Catalog: built-in"),
    }
    println!("Progress directory: {}", config.progress_dir().display());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
