//! Prints the monitor's OpenAPI document, writes it to a file, or checks that
//! a committed copy is current.
//!
//!   generate_openapi                   # stdout
//!   generate_openapi --output api.json
//!   generate_openapi --check api.json  # exit 1 if api.json is stale

use std::{fs, io::Write, path::PathBuf, process::ExitCode};

use anyhow::{bail, Context, Result};
use petcare_monitor::api::handlers::ApiDoc;
use utoipa::OpenApi;

enum Target {
    Stdout,
    File(PathBuf),
    Check(PathBuf),
}

fn target_from_args(mut args: impl Iterator<Item = String>) -> Result<Target> {
    match (args.next().as_deref(), args.next()) {
        (None, _) => Ok(Target::Stdout),
        (Some("--output"), Some(path)) => Ok(Target::File(path.into())),
        (Some("--check"), Some(path)) => Ok(Target::Check(path.into())),
        (Some(flag), _) => bail!("unexpected argument {flag:?}; use --output <path> or --check <path>"),
    }
}

fn main() -> Result<ExitCode> {
    let target = target_from_args(std::env::args().skip(1))?;
    let document = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to serialise OpenAPI document")?;

    match target {
        Target::Stdout => {
            std::io::stdout()
                .write_all(document.as_bytes())
                .context("failed to write to stdout")?;
        }
        Target::File(path) => {
            fs::write(&path, &document)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        Target::Check(path) => {
            let committed = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if committed.trim_end() != document.trim_end() {
                eprintln!("{} is out of date; regenerate it with --output", path.display());
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
