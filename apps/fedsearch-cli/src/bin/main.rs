use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use fedsearch_core::config::Config;
use fedsearch_core::Resource;
use fedsearch_mediator::{HttpClient, Mediator};
use fedsearch_text::ResourceDirectory;
use tracing::{info, warn};
use walkdir::WalkDir;

const USAGE: &str = "Usage: fedsearch <command> [args...]
  query <resource[.json]> [query...]
  resource put|mother|myself <file.json>
  resource get <id>
  resource list [prefix] [n]
  import <dir>";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn read_resource(path: &Path) -> anyhow::Result<Resource> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Resource::from_json_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resource_command(directory: &ResourceDirectory, args: &[String]) -> anyhow::Result<()> {
    let (action, rest) = args.split_first().context(USAGE)?;
    match action.as_str() {
        "put" | "mother" | "myself" => {
            let file = rest.first().context("missing <file.json>")?;
            let resource = read_resource(Path::new(file))?;
            let id = resource.id().to_string();
            match action.as_str() {
                "mother" => directory.put_mother(resource)?,
                "myself" => directory.put_myself(resource)?,
                _ => directory.put(resource)?,
            }
            info!(rid = %id, role = %action, "resource stored");
        }
        "get" => {
            let id = rest.first().context("missing <id>")?;
            match directory.get(id)? {
                Some(resource) => print_json(&resource.to_json())?,
                None => bail!("unknown resource: {}", id),
            }
        }
        "list" => {
            let prefix = rest.first().map(String::as_str);
            let n = match rest.get(1) {
                Some(n) => n.parse::<usize>().context("n must be a number")?,
                None => 10,
            };
            let listed: Vec<_> = directory.top_values(prefix, n)?.iter().map(Resource::to_json).collect();
            print_json(&serde_json::Value::Array(listed))?;
        }
        other => bail!("unknown resource action: {}\n{}", other, USAGE),
    }
    Ok(())
}

/// Store every `*.json` resource descriptor under `dir`; unreadable files
/// are reported and skipped.
fn import(directory: &ResourceDirectory, dir: &Path) -> anyhow::Result<usize> {
    let mut stored = 0;
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_resource(path) {
            Ok(resource) => {
                directory.put(resource)?;
                stored += 1;
            }
            Err(e) => warn!(file = %path.display(), error = %format!("{:#}", e), "skipping descriptor"),
        }
    }
    Ok(stored)
}

/// Runs one command and returns the process exit code.
async fn run(mediator: &Mediator, cmd: &str, args: &[String]) -> anyhow::Result<i32> {
    match cmd {
        "query" => {
            let token = args.first().context(USAGE)?;
            let query = args[1..].join(" ");
            let response = mediator.query(token, &query).await;
            print_json(&response.to_json())?;
            if !response.is_success() {
                return Ok(i32::from(response.status.http_code() / 100));
            }
        }
        "resource" => resource_command(mediator.directory(), args)?,
        "import" => {
            let dir = args.first().context("missing <dir>")?;
            let stored = import(mediator.directory(), Path::new(dir))?;
            println!("Imported {} resources from {}", stored, dir);
        }
        _ => bail!("unknown command: {}\n{}", cmd, USAGE),
    }
    Ok(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();

    let client = Arc::new(HttpClient::new(settings.mediator.fetch_timeout())?);
    let mediator = Mediator::open(&settings, client.clone(), client)?;
    info!(root = %settings.storage.root().display(), resources = mediator.directory().len(), cached = mediator.cache().len(), "storage opened");

    let outcome = run(&mediator, &cmd, &args).await;
    // Close before exiting: process::exit skips destructors.
    mediator.close()?;
    let code = outcome?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
