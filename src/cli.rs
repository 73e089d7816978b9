use crate::config::types::{ExecutionRequest, Outcome};
use crate::dispatch::ExecutionService;
use crate::lang::resolve_language;
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute source code and print the classified result
    Run {
        /// Language id (script, jvm/java, native/cpp). Inferred from the
        /// file extension when omitted with --file.
        #[arg(long)]
        language: Option<String>,
        /// Source code as a string
        #[arg(long)]
        code: Option<String>,
        /// Path to a source file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Data to feed the program's standard input
        #[arg(long)]
        stdin_data: Option<String>,
        /// Per-stage wall-clock budget in seconds
        #[arg(long)]
        time_budget_secs: Option<u64>,
        /// Emit the result envelope as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Check whether the external toolchains are installed
    CheckDeps {
        /// Verbose output showing detailed version information
        #[arg(long)]
        verbose: bool,
    },
}

/// JSON envelope printed by `run --json`
#[derive(Serialize)]
struct RunReport<'a> {
    language: &'a str,
    outcome: Outcome,
    combined_output: &'a str,
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            language,
            code,
            file,
            stdin_data,
            time_budget_secs,
            json,
        } => run_submission(language, code, file, stdin_data, time_budget_secs, json),
        Commands::CheckDeps { verbose } => check_dependencies(verbose),
    }
}

fn run_submission(
    language: Option<String>,
    code: Option<String>,
    file: Option<PathBuf>,
    stdin_data: Option<String>,
    time_budget_secs: Option<u64>,
    json: bool,
) -> Result<()> {
    let language_id = match (&language, &file) {
        (Some(id), _) => id.clone(),
        (None, Some(path)) => infer_language(path).to_string(),
        (None, None) => anyhow::bail!("--language is required when --code is used"),
    };

    let source = match (code, file) {
        (Some(code), None) => code,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?,
        (Some(_), Some(_)) => anyhow::bail!("--code and --file are mutually exclusive"),
        (None, None) => anyhow::bail!("one of --code or --file is required"),
    };

    let resolved = resolve_language(&language_id)?;
    let service = ExecutionService::with_defaults()?;

    let mut request = ExecutionRequest::new(source, resolved)
        .with_time_budget(service.config().default_time_budget);
    if let Some(secs) = time_budget_secs {
        request = request.with_time_budget(Duration::from_secs(secs));
    }
    if let Some(data) = stdin_data {
        request = request.with_stdin(data);
    }

    let result = service.execute(request);

    if json {
        let report = RunReport {
            language: resolved.as_str(),
            outcome: result.outcome,
            combined_output: &result.combined_output,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", result.combined_output);
        if !result.combined_output.ends_with('\n') && !result.combined_output.is_empty() {
            println!();
        }
        println!("outcome: {}", result.outcome);
    }

    Ok(())
}

/// Map a source file extension onto a language id. Unknown extensions fall
/// through to the script language, which accepts arbitrary text.
fn infer_language(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()).unwrap_or("") {
        "java" => "java",
        "cpp" | "cc" | "cxx" => "cpp",
        _ => "script",
    }
}

/// Check that the external compilers and runtimes are reachable on PATH.
fn check_dependencies(verbose: bool) -> Result<()> {
    println!("Checking language toolchains...");
    println!();

    // The script language is served in process and needs no external tools.
    println!("✅ script - OK (built in)");

    let toolchains: [(&str, &[(&str, &str)]); 2] = [
        ("jvm", &[("javac", "-version"), ("java", "-version")]),
        ("native", &[("g++", "--version")]),
    ];

    let mut missing = Vec::new();
    for (language, commands) in &toolchains {
        let mut language_ok = true;
        let mut versions = Vec::new();

        for (cmd, version_arg) in *commands {
            match probe_tool(cmd, version_arg) {
                Some(version) => {
                    if verbose {
                        versions.push(format!("  {} -> {}", cmd, version));
                    }
                }
                None => {
                    language_ok = false;
                    if verbose {
                        versions.push(format!("  {} -> NOT FOUND", cmd));
                    }
                }
            }
        }

        if language_ok {
            println!("✅ {} - OK", language);
        } else {
            println!("❌ {} - MISSING", language);
            missing.push(*language);
        }
        for version in versions {
            println!("{}", version);
        }
    }

    println!();
    if missing.is_empty() {
        println!("All language toolchains are installed");
        Ok(())
    } else {
        println!("Missing toolchains: {}", missing.join(", "));
        println!("  • jvm: install a JDK (javac and java)");
        println!("  • native: install g++");
        std::process::exit(1);
    }
}

/// Run `<cmd> <version_arg>` and return the first line it reports, from
/// stdout or stderr (java prints its version to stderr).
fn probe_tool(cmd: &str, version_arg: &str) -> Option<String> {
    let output = std::process::Command::new(cmd)
        .arg(version_arg)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr)
    } else {
        String::from_utf8_lossy(&output.stdout)
    };
    Some(text.lines().next().unwrap_or("").trim().to_string())
}
