use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use breeze_compiler::convert::convert_dir;
use breeze_compiler::{parse_options, BreezeError, Config, Generator};

#[derive(Parser)]
#[command(name = "breezec")]
#[command(about = "Generate code from Breeze schemas, or convert .proto files to Breeze", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the selected backends over a `.breeze` file or directory
    Gen {
        /// Input `.breeze` file, or a directory walked recursively
        #[arg(short, long)]
        src: PathBuf,

        /// Output root (defaults to the input directory)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Comma-separated backend names, or `all`
        #[arg(short = 't', long = "type")]
        templates: Option<String>,

        /// Run options as `key=value,key2=value2`
        #[arg(short, long)]
        options: Option<String>,

        /// Collapse every schema onto this package
        #[arg(short, long)]
        uniform_package: Option<String>,

        /// JSON config file; command line flags take precedence
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Convert every `.proto` file in a directory to `.breeze`
    P2b {
        /// Directory holding `.proto` files
        #[arg(short, long)]
        src: PathBuf,

        /// Output directory for `.breeze` files
        #[arg(short, long)]
        dest: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), BreezeError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Gen { src, dest, templates, options, uniform_package, config } => {
            let mut config = match config {
                Some(path) => Config::from_json_file(&path)?,
                None => Config::default(),
            };
            if let Some(dest) = dest {
                config.write_path = Some(dest);
            }
            if let Some(templates) = templates {
                config.templates = templates;
            }
            if let Some(options) = options {
                config.options.extend(parse_options(&options)?);
            }
            if uniform_package.is_some() {
                config.uniform_package = uniform_package;
            }

            let report = Generator::default().generate_path(&src, &config)?;
            info!("generated code for {} schemas", report.schemas.len());
            if !report.is_clean() {
                warn!("finished with {} issues", report.issues.len());
            }
            Ok(())
        }

        Commands::P2b { src, dest } => {
            let written = convert_dir(&src, &dest)?;
            info!("converted {} files into {}", written.len(), dest.display());
            Ok(())
        }
    }
}
