use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use docqa_core::config::Config;
use docqa_core::extract::{FileExtractor, SourceDocument};
use docqa_rag::Pipeline;
use docqa_vector::IndexStore;

const USAGE: &str = "<ingest <file-or-dir>...|ask \"<question>\"|status>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { eprintln!("Usage: {} {}", prog, USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn is_text_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("txt" | "md" | "pdf")
    )
}

/// Files named on the command line are taken as-is; directories contribute their `.txt`, `.md`
/// and `.pdf` files. Entries that cannot be walked or read are logged and skipped.
fn collect_documents(inputs: &[String]) -> anyhow::Result<Vec<SourceDocument>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_dir() {
            for entry in WalkDir::new(&path).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if entry.file_type().is_file() && is_text_file(entry.path()) {
                    paths.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            paths.push(path);
        } else {
            anyhow::bail!("'{}' is neither a file nor a directory", input);
        }
    }
    let mut docs = Vec::with_capacity(paths.len());
    for p in paths {
        match fs::read(&p) {
            Ok(content) => docs.push(SourceDocument::new(p.display().to_string(), content)),
            Err(e) => tracing::warn!(path = %p.display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(docs)
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    let base = env::current_dir()?;
    let rt = tokio::runtime::Runtime::new()?;

    match cmd.as_str() {
        "ingest" => {
            if args.is_empty() { eprintln!("Usage: docqa ingest <file-or-dir>..."); std::process::exit(1); }
            let docs = collect_documents(&args)?;
            if docs.is_empty() { anyhow::bail!("no readable .txt, .md or .pdf files found in {}", args.join(", ")); }
            println!("Ingesting {} document(s)", docs.len());
            let report = rt.block_on(async {
                let pipeline = Pipeline::from_settings(&settings, &base).await?.with_progress(true);
                pipeline.ingest_documents(&docs, &FileExtractor).await
            })?;
            for failure in &report.failures { eprintln!("Skipped: {}", failure); }
            println!(
                "Indexed {} chunks from {} document(s) into '{}'",
                report.chunks, report.documents, report.manifest.name
            );
        }
        "ask" => {
            let question = args.join(" ");
            if question.trim().is_empty() { eprintln!("Usage: docqa ask \"<question>\""); std::process::exit(1); }
            let answer = rt.block_on(async {
                let pipeline = Pipeline::from_settings(&settings, &base).await?;
                pipeline.answer(&question).await
            })?;
            println!("Reply: {}", answer);
        }
        "status" => {
            let manifest = rt.block_on(async {
                let store = IndexStore::open(settings.index_dir(&base)).await?;
                store.manifest(&settings.data.index_name).await
            })?;
            match manifest {
                Some(m) => {
                    println!("Index:     {}", m.name);
                    println!("Chunks:    {}", m.chunk_count);
                    println!("Dimension: {}", m.dim);
                    println!("Embedder:  {}", m.embedder_id);
                    println!("Table:     {}", m.table);
                    println!("Built at:  {} ms since epoch", m.built_at);
                }
                None => println!("No index named '{}'; run `docqa ingest <file-or-dir>` first", settings.data.index_name),
            }
        }
        _ => { eprintln!("Unknown command: {}\nUsage: docqa {}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_and_text_files_are_collected() {
        assert!(is_text_file(Path::new("a/notes.md")));
        assert!(is_text_file(Path::new("manual.PDF")));
        assert!(!is_text_file(Path::new("photo.jpg")));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().expect("tmp");
        fs::write(tmp.path().join("a.txt"), "Cats are mammals.").expect("write");
        let locked = tmp.path().join("b.txt");
        fs::write(&locked, "secret").expect("write");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        // Root ignores file permissions.
        let readable = fs::read(&locked).is_ok();

        let docs = collect_documents(&[tmp.path().display().to_string()]).expect("collect");
        assert_eq!(docs.len(), if readable { 2 } else { 1 });
        assert!(docs[0].name.ends_with("a.txt"));
    }
}
