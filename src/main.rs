use clap::{Parser, Subcommand, ValueEnum};
use scrivener::runner::DEFAULT_MAX_SCHEDULED;
use scrivener::xpath::AtomicValue;
use scrivener::{CompilerBuilder, Report, Runner, ScrivenerError, check_file};
use std::env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a stylesheet and report every static error
    Check {
        stylesheet: PathBuf,
        /// JSON file with compiler settings
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Compile a stylesheet and run a named template, then any calls it schedules
    Run {
        stylesheet: PathBuf,
        #[arg(long, short)]
        template: String,
        /// String value for the context item
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_MAX_SCHEDULED)]
        max_scheduled: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn builder(config: Option<&PathBuf>) -> Result<CompilerBuilder, ScrivenerError> {
    match config {
        Some(path) => CompilerBuilder::new().with_config_file(path),
        None => Ok(CompilerBuilder::new()),
    }
}

#[tokio::main]
async fn main() -> Result<(), ScrivenerError> {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "scrivener=info");
        }
    }
    env_logger::init();

    let args = Args::parse();
    match args.command {
        Command::Check {
            stylesheet,
            config,
            format,
        } => {
            let compiler = builder(config.as_ref())?.build();
            let result = check_file(&compiler, &stylesheet)?;
            let name = stylesheet.display().to_string();
            let report = Report::new(&name, &result);
            match format {
                Format::Text => print!("{}", report.to_text()),
                Format::Json => println!("{}", report.to_json()?),
            }
            if !report.success {
                std::process::exit(1);
            }
        }
        Command::Run {
            stylesheet,
            template,
            context,
            config,
            max_scheduled,
        } => {
            let compiler = builder(config.as_ref())?.build();
            let result = check_file(&compiler, &stylesheet)?;
            if !result.is_success() {
                let name = stylesheet.display().to_string();
                eprint!("{}", Report::new(&name, &result).to_text());
                std::process::exit(1);
            }
            let runner = Runner::new(result.into_result()?).with_max_scheduled(max_scheduled);
            let outputs = runner.run(&template, context.map(AtomicValue::String)).await?;
            for output in outputs {
                println!("[{} +{}ms] {}", output.template, output.delay.as_millis(), output.text);
            }
        }
    }
    Ok(())
}
