use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Query the hit corpus kept by the result cache and print results.
// Usage:
//   cargo run -p fedsearch-text --example search -- "your query" \
//     [--index data/index/fedsearch/results] [--limit 10] [--rid wiki]

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: cargo run -p fedsearch-text --example search -- <query> [--index DIR] [--limit N] [--rid ID]");
        std::process::exit(1);
    }
    let mut query = String::new();
    let mut index_dir: Option<PathBuf> = None;
    let mut limit: usize = 10;
    let mut rid: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" => {
                if i + 1 >= args.len() { eprintln!("--index requires a path"); std::process::exit(2); }
                index_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            "--limit" => {
                if i + 1 >= args.len() { eprintln!("--limit requires a number"); std::process::exit(2); }
                limit = args[i + 1].parse().unwrap_or(limit);
                i += 2; continue;
            }
            "--rid" => {
                if i + 1 >= args.len() { eprintln!("--rid requires an id"); std::process::exit(2); }
                rid = Some(args[i + 1].clone());
                i += 2; continue;
            }
            s if s.starts_with('-') => {
                eprintln!("Unknown flag: {}", s); std::process::exit(2);
            }
            s => {
                if query.is_empty() { query = s.to_string(); }
                i += 1; continue;
            }
        }
    }

    let index_dir = if let Some(dir) = index_dir {
        dir
    } else if let Ok(env_path) = env::var("FEDSEARCH_RESULTS_DIR") {
        PathBuf::from(env_path)
    } else {
        let base = Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors().nth(2)
            .unwrap_or(Path::new("."));
        base.join("data/index/fedsearch/results")
    };

    println!("Corpus search\n=============");
    println!("Index: {}", index_dir.display());
    println!("Query: {} (limit {})\n", query, limit);

    let cache = fedsearch_text::ResultCache::open(&index_dir, 500, Duration::from_secs(3600))?;
    println!("{} cached queries, {} hits in corpus\n", cache.len(), cache.corpus_len()?);
    let hits = match rid.as_deref() {
        Some(rid) => cache.search_resource(rid, &query, limit)?,
        None => cache.search(&query, limit)?,
    };
    for (i, h) in hits.iter().enumerate() {
        println!("{:>2}. score={:.3} id={}\n    {}",
            i + 1, h.score(), h.id(), h.title().unwrap_or(""));
    }
    Ok(())
}
