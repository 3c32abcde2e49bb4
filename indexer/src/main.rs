use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use search_core::persist::{load_raw_index_file, save_docs, save_index, save_meta, IndexFormat, IndexPaths, MetaFile, INDEX_VERSION};
use search_core::tokenizer::normalize;
use search_core::{DocId, DocMeta, IndexError, InvertedIndex};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    title: Option<String>,
    body: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build or import a tf-idf inverted index directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Bin,
}

impl From<FormatArg> for IndexFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => IndexFormat::Json,
            FormatArg::Bin => IndexFormat::Bincode,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// On-disk format of the term table
        #[arg(long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
    },
    /// Wrap an existing `{term: {docFreq, docList}}` file into an index directory
    Import {
        /// Legacy index file, e.g. invertedIndex.txt
        #[arg(long)]
        input: String,
        /// Number of documents in the corpus the file was built from
        #[arg(long)]
        num_docs: u32,
        /// Output index directory
        #[arg(long)]
        output: String,
        #[arg(long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, format } => build_index(Path::new(&input), Path::new(&output), format.into()),
        Commands::Import { input, num_docs, output, format } => {
            import_index(Path::new(&input), num_docs, Path::new(&output), format.into())
        }
    }
}

#[derive(Default)]
struct Corpus {
    index: InvertedIndex,
    docs: HashMap<DocId, DocMeta>,
}

impl Corpus {
    fn ingest(&mut self, doc: InputDoc) -> Result<()> {
        if self.docs.contains_key(&doc.id) {
            return Err(IndexError::DuplicateDocument(doc.id).into());
        }
        self.index.add_document(&doc.id, normalize(&doc.body));
        self.docs.insert(doc.id, DocMeta { title: doc.title, url: doc.url });
        Ok(())
    }
}

fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_jsonl(file: &Path, corpus: &mut Corpus) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        corpus.ingest(doc)?;
    }
    Ok(())
}

fn read_json(file: &Path, corpus: &mut Corpus) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                corpus.ingest(serde_json::from_value(v)?)?;
            }
        }
        serde_json::Value::Object(_) => corpus.ingest(serde_json::from_value(json)?)?,
        _ => tracing::warn!(file = %file.display(), "skipping file that is neither a document nor an array"),
    }
    Ok(())
}

fn build_index(input: &Path, output: &Path, format: IndexFormat) -> Result<()> {
    let mut corpus = Corpus::default();
    for file in collect_files(input) {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut corpus)?;
        } else {
            read_json(&file, &mut corpus)?;
        }
    }
    tracing::info!(num_docs = corpus.index.num_docs(), num_terms = corpus.index.num_terms(), "ingested documents");

    let paths = IndexPaths::new(output);
    write_index_dir(&paths, &corpus.index, format)?;
    save_docs(&paths, &corpus.docs)?;
    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

fn import_index(input: &Path, num_docs: u32, output: &Path, format: IndexFormat) -> Result<()> {
    let terms = load_raw_index_file(input)?;
    let index = InvertedIndex::from_terms(terms, num_docs)
        .with_context(|| format!("invalid index file {}", input.display()))?;
    let paths = IndexPaths::new(output);
    write_index_dir(&paths, &index, format)?;
    tracing::info!(num_docs, num_terms = index.num_terms(), output = %output.display(), "index imported");
    Ok(())
}

fn write_index_dir(paths: &IndexPaths, index: &InvertedIndex, format: IndexFormat) -> Result<()> {
    save_index(paths, index, format)?;
    let meta = MetaFile {
        num_docs: index.num_docs(),
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
        version: INDEX_VERSION,
    };
    save_meta(paths, &meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::persist::load_engine;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn build_from_directory_of_json_and_jsonl() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        fs::write(
            input.path().join("a.jsonl"),
            "{\"id\":\"http://a/\",\"title\":\"A\",\"body\":\"Rust running fast\"}\n\n{\"id\":\"http://b/\",\"body\":\"gardens\"}\n",
        )
        .unwrap();
        fs::write(input.path().join("c.json"), r#"[{"id":"http://c/","body":"runs in rust","url":"https://c.example"}]"#).unwrap();
        fs::write(input.path().join("notes.txt"), "ignored").unwrap();

        build_index(input.path(), output.path(), IndexFormat::Json).unwrap();
        let engine = load_engine(&IndexPaths::new(output.path()), None).unwrap();
        assert_eq!(engine.index().num_docs(), 3);
        assert_eq!(engine.index().lookup("run").doc_freq, 2);
        assert_eq!(engine.doc_meta("http://a/").unwrap().title.as_deref(), Some("A"));
        assert_eq!(engine.doc_meta("http://c/").unwrap().url.as_deref(), Some("https://c.example"));

        let out = engine.search("rust", None);
        assert_eq!(out.total_hits, 2);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let file = input.path().join("dup.jsonl");
        fs::write(&file, "{\"id\":\"x\",\"body\":\"a\"}\n{\"id\":\"x\",\"body\":\"b\"}\n").unwrap();
        let err = build_index(&file, output.path(), IndexFormat::Json).unwrap_err();
        assert!(err.to_string().contains("duplicate document id"));
    }

    #[test]
    fn import_validates_corpus_size() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("invertedIndex.txt");
        fs::write(&file, r#"{"run": {"docFreq": 2, "docList": {"docA": 3, "docB": 1}}}"#).unwrap();

        assert!(import_index(&file, 1, &dir.path().join("bad"), IndexFormat::Json).is_err());

        let out = dir.path().join("good");
        import_index(&file, 10, &out, IndexFormat::Bincode).unwrap();
        let engine = load_engine(&IndexPaths::new(&out), None).unwrap();
        assert_eq!(engine.index().num_docs(), 10);
        let hits = engine.search("running", None).hits;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "docA");
    }
}
