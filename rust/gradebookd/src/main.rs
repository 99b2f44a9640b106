use anyhow::Context;
use clap::Parser;
use gradebookd::ipc;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "gradebookd")]
#[command(about = "Gradebook sidecar speaking JSON lines on stdin/stdout")]
#[command(version)]
struct Args {
    /// Workspace directory to open at startup
    #[arg(long, env = "GRADEBOOKD_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log filter directives (overrides GRADEBOOKD_LOG / RUST_LOG)
    #[arg(long)]
    log_filter: Option<String>,
}

fn env_filter(args: &Args) -> EnvFilter {
    if let Some(directives) = &args.log_filter {
        return EnvFilter::new(directives);
    }
    EnvFilter::try_from_env("GRADEBOOKD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn write_line(stdout: &mut impl Write, value: &serde_json::Value) -> anyhow::Result<()> {
    let line = serde_json::to_string(value).context("serialize response")?;
    writeln!(stdout, "{line}").context("write stdout")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(env_filter(&args))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut state = ipc::AppState::new();
    if let Some(path) = &args.workspace {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            error!("failed to open workspace {}: {e}", path.display());
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "gradebookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!("stdin closed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer with.
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                )?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp)?;
        for event in state.drain_events() {
            write_line(&mut stdout, &event)?;
        }
    }
    Ok(())
}
