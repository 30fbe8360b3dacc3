//! Command line tooling for appium-steps.
//!
//! # Usage
//!
//! ```bash
//! # Scaffold a WebdriverIO + Cucumber project in the current directory
//! appium-steps init --typescript
//!
//! # Scaffold into another directory, untyped, without prompting
//! appium-steps init --js --dir ./mobile-tests
//!
//! # List the pre-built steps, or only one category
//! appium-steps steps
//! appium-steps steps --tag gesture
//!
//! # Catalog JSON for editor completion
//! appium-steps --format json steps > steps.json
//!
//! # Resolve every step line of the feature files without a device
//! appium-steps check 'features/**/*.feature'
//! appium-steps check features --strict
//!
//! # Shell completions
//! appium-steps completions zsh > _appium-steps
//! ```

mod check;
mod init;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use appium_steps_core::catalog::StepCatalog;
use appium_steps_core::registry::{RegistryError, StepRegistry, StepTag};
use appium_steps_core::steps;

/// Pre-built Cucumber steps for mobile UI automation.
#[derive(Parser)]
#[command(name = "appium-steps")]
#[command(about = "Scaffold, list and check Cucumber steps for Appium projects")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create a WebdriverIO + Cucumber project wired to the pre-built steps
    Init {
        /// Generate TypeScript files
        #[arg(long, visible_alias = "ts", conflicts_with = "javascript")]
        typescript: bool,
        /// Generate JavaScript files
        #[arg(long, visible_alias = "js")]
        javascript: bool,
        /// Project directory (defaults to the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Directory holding apps/ApiDemos-debug.apk and test-scenarios/
        #[arg(long, env = "APPIUM_STEPS_ROOT")]
        package_root: Option<PathBuf>,
    },

    /// List the pre-built steps
    Steps {
        /// Only list steps with this tag
        #[arg(short, long)]
        tag: Option<StepTag>,
    },

    /// Resolve every step line of the given feature files
    Check {
        /// Feature files, directories or glob patterns
        #[arg(required = true)]
        patterns: Vec<String>,
        /// Treat equally specific matches as ambiguous
        #[arg(long)]
        strict: bool,
    },

    /// Print a shell completion script
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    /// Some step lines did not resolve.
    Unresolved(usize),
    /// Some feature files are not valid Gherkin.
    InvalidFeatures(usize),
    Io(String),
    Usage(String),
    Registry(RegistryError),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Unresolved(_) | CliError::InvalidFeatures(_) => ExitCode::from(1),
            CliError::Io(_) | CliError::Usage(_) => ExitCode::from(2),
            CliError::Registry(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Unresolved(n) if *n == 1 => write!(f, "1 step did not resolve"),
            CliError::Unresolved(n) => write!(f, "{} steps did not resolve", n),
            CliError::InvalidFeatures(n) => write!(f, "{} feature file(s) could not be parsed", n),
            CliError::Io(msg) => write!(f, "I/O error: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Registry(e) => write!(f, "Step registration failed: {}", e),
        }
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        CliError::Registry(e)
    }
}

/// The built-in steps, unsealed so callers can adjust resolution settings.
fn builtin_registry() -> Result<StepRegistry, CliError> {
    let mut registry = StepRegistry::new();
    steps::register_all(&mut registry)?;
    Ok(registry)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Init {
            typescript,
            javascript,
            dir,
            package_root,
        } => {
            let language = if typescript {
                Some(init::Language::TypeScript)
            } else if javascript {
                Some(init::Language::JavaScript)
            } else {
                None
            };
            let options = init::InitOptions {
                language,
                project_dir: match dir {
                    Some(dir) => dir,
                    None => std::env::current_dir().map_err(|e| CliError::Io(e.to_string()))?,
                },
                package_root: package_root.unwrap_or_else(init::default_package_root),
            };
            init::run(&options)
                .map(|_| ())
                .map_err(|e| CliError::Io(e.to_string()))
        }

        Command::Steps { tag } => {
            let registry = builtin_registry()?;
            let mut catalog = StepCatalog::from_registry(&registry);
            if let Some(tag) = tag {
                catalog = catalog.filter_tag(tag);
            }
            match cli.format {
                OutputFormat::Json => {
                    let json = catalog
                        .to_json_pretty()
                        .map_err(|e| CliError::Io(e.to_string()))?;
                    println!("{}", json);
                }
                OutputFormat::Text => print_catalog(&catalog),
            }
            Ok(())
        }

        Command::Check { patterns, strict } => {
            let files = check::expand_patterns(&patterns).map_err(CliError::Usage)?;
            let mut registry = builtin_registry()?;
            let config = appium_steps_core::config::StepsConfig::load();
            registry.set_strict(strict || config.strict);
            registry.seal();

            let report = check::check_files(&registry, &files)
                .map_err(|e| CliError::Io(e.to_string()))?;
            match cli.format {
                OutputFormat::Json => println!("{}", report.to_json()),
                OutputFormat::Text => report.print_text(),
            }
            if !report.invalid_files.is_empty() {
                Err(CliError::InvalidFeatures(report.invalid_files.len()))
            } else if !report.is_clean() {
                Err(CliError::Unresolved(report.failures.len()))
            } else {
                Ok(())
            }
        }

        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "appium-steps", &mut io::stdout());
            Ok(())
        }
    }
}

fn print_catalog(catalog: &StepCatalog) {
    for tag in StepTag::ALL {
        let entries: Vec<_> = catalog.steps.iter().filter(|s| s.tag == tag).collect();
        if entries.is_empty() {
            continue;
        }
        println!("{} ({})", tag, entries.len());
        for entry in entries {
            println!("  {}", entry.label);
            println!("      {}", entry.documentation);
        }
        println!();
    }
}
