use crate::engine::SearchEngine;
use crate::index::{DocId, DocMeta, InvertedIndex, TermEntry};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// `index.json`, the `{term: {docFreq, docList}}` interchange shape
    Json,
    /// `index.bin`, bincode snapshot of the same mapping
    Bincode,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index_json(&self) -> PathBuf { self.root.join("index.json") }
    pub fn index_bin(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn docs(&self) -> PathBuf { self.root.join("docs.json") }
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, format: IndexFormat) -> Result<()> {
    create_dir_all(&paths.root)?;
    let terms: HashMap<&str, &TermEntry> = index.terms().collect();
    match format {
        IndexFormat::Json => {
            let mut w = BufWriter::new(File::create(paths.index_json())?);
            serde_json::to_writer(&mut w, &terms)?;
            w.flush()?;
        }
        IndexFormat::Bincode => {
            let mut f = File::create(paths.index_bin())?;
            let bytes = bincode::serialize(&terms)?;
            f.write_all(&bytes)?;
        }
    }
    Ok(())
}

/// Load the term table, preferring the bincode snapshot when both files exist.
pub fn load_terms(paths: &IndexPaths) -> Result<HashMap<String, TermEntry>> {
    let bin = paths.index_bin();
    if bin.exists() {
        let mut f = File::open(&bin).with_context(|| format!("opening {}", bin.display()))?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        let terms = bincode::deserialize(&buf).with_context(|| format!("decoding {}", bin.display()))?;
        return Ok(terms);
    }
    load_raw_index_file(&paths.index_json())
}

/// Read a bare `{term: {docFreq, docList}}` JSON file, e.g. a legacy `invertedIndex.txt`.
pub fn load_raw_index_file(path: &Path) -> Result<HashMap<String, TermEntry>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let terms = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", path.display()))?;
    Ok(terms)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?;
    if meta.version != INDEX_VERSION {
        bail!("unsupported index version {} in {}", meta.version, path.display());
    }
    Ok(meta)
}

pub fn save_docs(paths: &IndexPaths, docs: &HashMap<DocId, DocMeta>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.docs())?);
    serde_json::to_writer_pretty(&mut w, docs)?;
    w.flush()?;
    Ok(())
}

/// Document metadata is optional; a missing `docs.json` is an empty table.
pub fn load_docs(paths: &IndexPaths) -> Result<HashMap<DocId, DocMeta>> {
    let path = paths.docs();
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let docs = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", path.display()))?;
    Ok(docs)
}

/// Load and validate the index. `num_docs` overrides the corpus size recorded in `meta.json`.
pub fn load_index(paths: &IndexPaths, num_docs: Option<u32>) -> Result<InvertedIndex> {
    let num_docs = match num_docs {
        Some(n) => n,
        None => load_meta(paths)?.num_docs,
    };
    let terms = load_terms(paths)?;
    let index = InvertedIndex::from_terms(terms, num_docs)
        .with_context(|| format!("invalid index in {}", paths.root.display()))?;
    tracing::info!(root = %paths.root.display(), num_docs, num_terms = index.num_terms(), "index loaded");
    Ok(index)
}

/// Everything a query server needs, loaded and validated up front.
pub fn load_engine(paths: &IndexPaths, num_docs: Option<u32>) -> Result<SearchEngine> {
    let index = load_index(paths, num_docs)?;
    let docs = load_docs(paths)?;
    Ok(SearchEngine::new(index).with_docs(docs))
}
