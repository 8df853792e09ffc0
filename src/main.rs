use lucent::cli::{Command, Config, USAGE};
use lucent::pipeline::{DecompileError, decompile};
use std::fs;
use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_args() {
        Ok(Command::Version) => {
            println!("lucent {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Ok(Command::Run(config)) => config,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), DecompileError> {
    let source = fs::read_to_string(&config.input)
        .map_err(|e| DecompileError::Load(format!("cannot read `{}`: {}", config.input, e)))?;

    let output = decompile(&config.input, &source, &config.refine)?;

    for (function, reason) in &output.skipped {
        eprintln!("warning: skipped `{}`: {}", function, reason);
    }

    match &config.output {
        Some(path) => fs::write(path, &output.code).map_err(DecompileError::Write)?,
        None => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(output.code.as_bytes())
                .map_err(DecompileError::Write)?;
        }
    }
    Ok(())
}
