use std::env;
use std::path::{Path, PathBuf};

// List the resources stored in a directory index.
// Usage:
//   cargo run -p fedsearch-text --example directory -- [--index data/index/fedsearch/resources] [--prefix wi] [--limit 20]

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut index_dir: Option<PathBuf> = None;
    let mut prefix: Option<String> = None;
    let mut limit: usize = 20;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" => {
                if i + 1 >= args.len() { eprintln!("--index requires a path"); std::process::exit(2); }
                index_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            "--prefix" => {
                if i + 1 >= args.len() { eprintln!("--prefix requires a value"); std::process::exit(2); }
                prefix = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--limit" => {
                if i + 1 >= args.len() { eprintln!("--limit requires a number"); std::process::exit(2); }
                limit = args[i + 1].parse().unwrap_or(limit);
                i += 2; continue;
            }
            s => { eprintln!("Unknown argument: {}", s); std::process::exit(2); }
        }
    }

    // flag > FEDSEARCH_RESOURCES_DIR > workspace default
    let ws_root = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
    let index_dir = index_dir
        .or_else(|| env::var("FEDSEARCH_RESOURCES_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| ws_root.join("data/index/fedsearch/resources"));

    println!("Resource directory\n==================");
    println!("Index: {}", index_dir.display());

    let directory = fedsearch_text::ResourceDirectory::open(&index_dir)?;
    let mother = directory.get_mother()?.map(|r| r.id().to_string()).unwrap_or_else(|| "-".to_string());
    let myself = directory.get_myself()?.map(|r| r.id().to_string()).unwrap_or_else(|| "-".to_string());
    println!("Mother: {}  Myself: {}  Total: {}\n", mother, myself, directory.len());

    for (i, r) in directory.top_values(prefix.as_deref(), limit)?.iter().enumerate() {
        println!("{:>2}. {} ({}) prior={:.2}\n    {}", i + 1, r.id(), r.label(), r.prior(), r.api_template());
    }
    Ok(())
}
