use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use buildtail::exec::{BuildCommandBuilder, BuildExecutor, ExecError};
use buildtail::output::{FnLineSink, LineSink, StreamPumper};
use buildtail::registry::BuildOutput;

/// Run build commands with live console capture
#[derive(Parser)]
#[command(name = "buildtail")]
#[command(about = "Build-execution and console-output capture engine", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a command, streaming its captured console output
    Run {
        /// Working directory for the child process
        #[arg(short = 'C', long)]
        cwd: Option<PathBuf>,

        /// Environment overrides as KEY=VALUE (repeatable)
        #[arg(short, long = "env")]
        env: Vec<String>,

        /// Lines of history retained in memory
        #[arg(long, default_value = "1000")]
        capacity: usize,

        /// Append the captured console log to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Treat the output as binary (report a byte count instead of lines)
        #[arg(long)]
        binary: bool,

        /// The program to run, followed by its arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("buildtail started with verbosity level: {}", cli.verbose);

    let result = match cli.command {
        Commands::Run {
            cwd,
            env,
            capacity,
            log_file,
            binary,
            command,
        } => run_command(cwd, env, capacity, log_file, binary, command).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            if let Some(ExecError::ExitCode(code)) = e.downcast_ref::<ExecError>() {
                eprintln!("Error: {e}");
                std::process::exit(*code);
            }
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_env_overrides(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid env override (expected KEY=VALUE): {pair}"))
        })
        .collect()
}

async fn run_command(
    cwd: Option<PathBuf>,
    env: Vec<String>,
    capacity: usize,
    log_file: Option<PathBuf>,
    binary: bool,
    command: Vec<String>,
) -> anyhow::Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("No command given"))?;

    let mut builder = BuildCommandBuilder::new(program).args(args);
    if let Some(ref dir) = cwd {
        builder = builder.current_dir(dir);
    }
    builder = builder.envs(parse_env_overrides(&env)?);
    let command = builder.build();

    let output = Arc::new(BuildOutput::new(capacity, log_file));

    // Print each line as it is captured, and record it in the history.
    let history = output.clone();
    let console: Arc<dyn LineSink> = Arc::new(FnLineSink::new(|line: &str| {
        println!("{line}");
    }));
    let recording = Arc::new(TeeSink {
        first: console,
        second: history,
    });

    let executor = BuildExecutor::production();
    let result = if binary {
        executor
            .execute_and_wait_with(
                &command,
                StreamPumper::new(true, Some(recording), None),
                StreamPumper::text(Arc::new(buildtail::output::LoggingSink::new("stderr"))),
            )
            .await
    } else {
        executor.execute_and_wait(&command, recording).await
    };

    output.mark_completed();
    let summary = result?;
    debug!(
        "Captured {} lines ({} bytes) in {:?}",
        summary.stdout.lines_delivered, summary.stdout.bytes_read, summary.duration
    );
    Ok(())
}

/// Fans one captured line out to two sinks.
struct TeeSink {
    first: Arc<dyn LineSink>,
    second: Arc<dyn LineSink>,
}

#[async_trait::async_trait]
impl LineSink for TeeSink {
    async fn consume_line(&self, line: &str) -> anyhow::Result<()> {
        self.first.consume_line(line).await?;
        self.second.consume_line(line).await
    }
}
