use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sieve_core::{
    process_queries_by, DocId, Document, DocumentStatus, ExecutionPolicy, SearchServer, StopWords,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: DocId,
    text: String,
    #[serde(default)]
    status: DocumentStatus,
    #[serde(default)]
    ratings: Vec<i32>,
}

#[derive(Parser)]
#[command(name = "sieve")]
#[command(about = "Rank short documents against queries with TF-IDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CorpusArgs {
    /// Input path (JSON/JSONL file or a directory of them)
    #[arg(long)]
    input: String,
    /// Space-separated stop words
    #[arg(long, default_value = "")]
    stop_words: String,
    /// Add the built-in English stop words
    #[arg(long, default_value_t = false)]
    english_stop_words: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the top documents for each query as JSON lines
    Search {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Query text; repeat for a batch
        #[arg(long = "query", required = true)]
        queries: Vec<String>,
        /// Only rank documents with this status
        #[arg(long, default_value = "ACTUAL")]
        status: DocumentStatus,
        /// Fan ranking out across threads
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Explain which query words a document matches
    Match {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(long)]
        query: String,
        #[arg(long)]
        id: DocId,
    },
    /// Print the document count and each document's word frequencies
    Stats {
        #[command(flatten)]
        corpus: CorpusArgs,
    },
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    results: &'a [Document],
}

#[derive(Serialize)]
struct MatchOutput<'a> {
    id: DocId,
    words: Vec<&'a str>,
    status: DocumentStatus,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { corpus, queries, status, parallel } => {
            let server = load_corpus(&corpus)?;
            let results = run_search(&server, &queries, status, parallel)?;
            for (query, results) in queries.iter().zip(&results) {
                println!("{}", serde_json::to_string(&SearchOutput { query, results })?);
            }
            Ok(())
        }
        Commands::Match { corpus, query, id } => {
            let server = load_corpus(&corpus)?;
            let (words, status) = server.match_document(&query, id)?;
            println!("{}", serde_json::to_string(&MatchOutput { id, words, status })?);
            Ok(())
        }
        Commands::Stats { corpus } => {
            let server = load_corpus(&corpus)?;
            let documents: Vec<_> = server
                .iter()
                .map(|id| serde_json::json!({ "id": id, "words": server.word_frequencies(id) }))
                .collect();
            let stats = serde_json::json!({
                "documents": server.document_count(),
                "frequencies": documents,
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

/// Rank every query. Several queries go through the parallel batch path; a
/// single query runs under `--parallel` or sequentially.
fn run_search(
    server: &SearchServer,
    queries: &[String],
    status: DocumentStatus,
    parallel: bool,
) -> sieve_core::Result<Vec<Vec<Document>>> {
    let by_status = |_: DocId, s: DocumentStatus, _: i32| s == status;
    if queries.len() > 1 {
        return process_queries_by(server, queries, by_status);
    }
    let policy = if parallel { ExecutionPolicy::Parallel } else { ExecutionPolicy::Sequential };
    queries
        .iter()
        .map(|query| server.find_top_documents_with_policy(policy, query, by_status))
        .collect()
}

fn load_corpus(args: &CorpusArgs) -> Result<SearchServer> {
    let mut words: Vec<String> =
        StopWords::from_text(&args.stop_words)?.iter().map(str::to_string).collect();
    if args.english_stop_words {
        words.extend(StopWords::english().iter().map(str::to_string));
    }
    let mut server = SearchServer::with_stop_words(words)?;
    let count = index_path(&mut server, Path::new(&args.input))?;
    tracing::info!(input = %args.input, documents = count, "corpus loaded");
    Ok(server)
}

/// Index every document under `input`; returns how many were added.
fn index_path(server: &mut SearchServer, input: &Path) -> Result<usize> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        let entries = WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok());
        for entry in entries {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("input path {} does not exist", input.display());
    }

    let mut count = 0;
    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for doc in docs {
            server
                .add_document(doc.id, &doc.text, doc.status, &doc.ratings)
                .with_context(|| format!("document {} in {}", doc.id, file.display()))?;
            count += 1;
        }
        tracing::debug!(file = %file.display(), "indexed file");
    }
    Ok(count)
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc = serde_json::from_str(&line)
            .with_context(|| format!("parsing {}", file.display()))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => {
            arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<InputDoc>, _>>()?
        }
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_json_and_jsonl_from_a_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.jsonl"),
            "{\"id\": 1, \"text\": \"fluffy cat fluffy tail\", \"ratings\": [7, 2, 7]}\n\n\
             {\"id\": 2, \"text\": \"groomed dog\", \"status\": \"BANNED\"}\n",
        )
        .unwrap();
        fs::write(dir.path().join("b.json"), r#"[{"id": 3, "text": "white cat and collar"}]"#)
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let args = CorpusArgs {
            input: dir.path().to_string_lossy().to_string(),
            stop_words: "and".into(),
            english_stop_words: false,
        };
        let server = load_corpus(&args).unwrap();
        assert_eq!(server.document_count(), 3);
        assert!(server.word_frequencies(3).get("and").is_none());

        let found = server.find_top_documents("cat").unwrap();
        assert_eq!(found.iter().map(|d| d.id).collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(found[1].rating, 5);
        let banned = server.find_top_documents_by_status("dog", DocumentStatus::Banned).unwrap();
        assert_eq!(banned.len(), 1);
    }

    #[test]
    fn reports_the_failing_document() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("dup.jsonl");
        fs::write(&file, "{\"id\": 1, \"text\": \"cat\"}\n{\"id\": 1, \"text\": \"dog\"}\n")
            .unwrap();
        let mut server = SearchServer::new("").unwrap();
        let err = index_path(&mut server, &file).unwrap_err();
        assert!(format!("{err:#}").contains("document 1"));
    }

    #[test]
    fn english_stop_words_are_merged() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("one.json");
        fs::write(&file, r#"{"id": 4, "text": "the cat with a hat"}"#).unwrap();
        let args = CorpusArgs {
            input: file.to_string_lossy().to_string(),
            stop_words: "hat".into(),
            english_stop_words: true,
        };
        let server = load_corpus(&args).unwrap();
        let words: Vec<&str> =
            server.word_frequencies(4).keys().map(String::as_str).collect();
        assert_eq!(words, vec!["cat"]);
    }

    #[test]
    fn several_queries_share_the_status_filter() {
        let mut server = SearchServer::new("").unwrap();
        server.add_document(1, "fluffy cat", DocumentStatus::Actual, &[3]).unwrap();
        server.add_document(2, "fluffy dog", DocumentStatus::Banned, &[1]).unwrap();
        server.add_document(3, "groomed dog", DocumentStatus::Banned, &[8]).unwrap();
        let queries = vec!["fluffy".to_string(), "dog -groomed".to_string(), "cat".to_string()];

        for parallel in [false, true] {
            let lists = run_search(&server, &queries, DocumentStatus::Banned, parallel).unwrap();
            let ids: Vec<Vec<DocId>> =
                lists.iter().map(|list| list.iter().map(|d| d.id).collect()).collect();
            assert_eq!(ids, vec![vec![2], vec![2], vec![]]);
        }

        let single = run_search(&server, &queries[..1], DocumentStatus::Actual, true).unwrap();
        assert_eq!(single, vec![server.find_top_documents("fluffy").unwrap()]);
        let malformed = ["ok".to_string(), "--".to_string()];
        assert!(run_search(&server, &malformed, DocumentStatus::Actual, false).is_err());
    }

    #[test]
    fn missing_input_is_an_error() {
        let mut server = SearchServer::new("").unwrap();
        assert!(index_path(&mut server, Path::new("/definitely/not/here")).is_err());
    }
}
