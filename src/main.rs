//! tsbridge CLI - Run tree-sitter queries through the host bridge

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tsbridge::bridge::{self, grammar};
use tsbridge::config::{self, BridgeConfig};
use tsbridge::{Env, Module, Value};

#[derive(Parser)]
#[command(name = "tsbridge")]
#[command(version = "0.1.0")]
#[command(about = "Type-checked host handles for tree-sitter languages, queries and cursors")]
#[command(long_about = r#"
tsbridge exposes tree-sitter to a dynamically-typed host as opaque handles.
The CLI drives that host surface directly, so every command goes through the
same validation and conversion a host program would see.

Example usage:
  tsbridge query --file src/main.rs --query "(identifier) @id"
  tsbridge query --file app.py --query-file calls.scm --captures --format json
  tsbridge inspect --language rust --query "(function_item name: (identifier) @name)"
  tsbridge functions
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to tsbridge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query over a source file
    Query {
        /// Source file to parse
        #[arg(short, long)]
        file: PathBuf,

        /// Query source
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,

        /// File holding the query source
        #[arg(long)]
        query_file: Option<PathBuf>,

        /// Grammar name (inferred from the file extension by default)
        #[arg(short, long)]
        language: Option<String>,

        /// Report individual captures instead of whole matches
        #[arg(long)]
        captures: bool,

        /// Restrict execution to START:END (1-based, end exclusive)
        #[arg(long)]
        byte_range: Option<String>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Compile a query and show its captures, strings and patterns
    Inspect {
        /// Grammar name
        #[arg(short, long)]
        language: Option<String>,

        /// Query source
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,

        /// File holding the query source
        #[arg(long)]
        query_file: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List the functions the bridge installs
    Functions,

    /// Write a default tsbridge.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
struct QueryHit {
    pattern_index: i64,
    id: i64,
    capture_count: i64,
    node: Option<NodeInfo>,
}

#[derive(Debug, Serialize)]
struct NodeInfo {
    kind: String,
    start_byte: i64,
    end_byte: i64,
    start_point: (i64, i64),
    end_point: (i64, i64),
    text: String,
}

#[derive(Debug, Serialize)]
struct QueryReport {
    language: String,
    captures: Vec<String>,
    strings: Vec<String>,
    patterns: Vec<i64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Query {
            file,
            query,
            query_file,
            language,
            captures,
            byte_range,
            format,
        } => {
            let source = std::fs::read_to_string(&file)?;
            let query_source = query_source(query, query_file)?;
            let language = pick_language(&config, language, Some(&file))?;
            let range = byte_range.as_deref().map(parse_byte_range).transpose()?;

            let mut env = Env::new();
            let _module = Module::load(&mut env, config);
            let hits = run_query(&mut env, &language, &source, &query_source, captures, range)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                println!("🔎 {} {} in {}", hits.len(), if captures { "captures" } else { "matches" }, file.display());
                for hit in &hits {
                    match &hit.node {
                        Some(node) => println!(
                            "  [{}#{}] {} {}:{}-{}:{} {:?}",
                            hit.pattern_index,
                            hit.id,
                            node.kind,
                            node.start_point.0,
                            node.start_point.1,
                            node.end_point.0,
                            node.end_point.1,
                            node.text
                        ),
                        None => println!("  [{}#{}] (no captures)", hit.pattern_index, hit.id),
                    }
                }
            }
        }

        Commands::Inspect {
            language,
            query,
            query_file,
            format,
        } => {
            let query_source = query_source(query, query_file)?;
            let language = pick_language(&config, language, None)?;

            let mut env = Env::new();
            let _module = Module::load(&mut env, config);
            let report = inspect_query(&mut env, &language, &query_source)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("📋 Query for {}", report.language);
                println!("  Captures ({}):", report.captures.len());
                for (id, name) in report.captures.iter().enumerate() {
                    println!("    {} @{}", id, name);
                }
                println!("  Strings ({}):", report.strings.len());
                for (id, value) in report.strings.iter().enumerate() {
                    println!("    {} {:?}", id, value);
                }
                println!("  Patterns ({}):", report.patterns.len());
                for (id, start) in report.patterns.iter().enumerate() {
                    println!("    {} starts at {}", id, start);
                }
            }
        }

        Commands::Functions => {
            let mut env = Env::new();
            let _module = Module::load(&mut env, config);
            let names = bridge::function_names();
            println!("🧩 {} bridge functions:", names.len());
            for (name, function) in env.functions() {
                if !names.iter().any(|n| *n == name) {
                    continue;
                }
                let summary = function.doc.lines().next().unwrap_or("");
                println!("  {:<48} {}..{}  {}", name, function.min_args, function.max_args, summary);
            }
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            config::write_config(&path, &BridgeConfig::default(), force)?;
            println!("✅ Wrote {}", path.display());
        }
    }

    Ok(())
}

/// Call a host function, turning a signal into an error
fn lisp(env: &mut Env, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    env.call(name, args)
        .map_err(|signal| anyhow::anyhow!("{} signaled {}", name, signal))
}

fn int(value: &Value) -> anyhow::Result<i64> {
    value
        .as_int()
        .ok_or_else(|| anyhow::anyhow!("expected an integer, got {}", value))
}

fn string(value: &Value) -> anyhow::Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("expected a string, got {}", value))
}

fn point(value: &Value) -> anyhow::Result<(i64, i64)> {
    let (row, column) = value
        .as_cons()
        .ok_or_else(|| anyhow::anyhow!("expected a point, got {}", value))?;
    Ok((int(row)?, int(column)?))
}

fn query_source(query: Option<String>, query_file: Option<PathBuf>) -> anyhow::Result<String> {
    match (query, query_file) {
        (Some(query), _) => Ok(query),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
        (None, None) => anyhow::bail!("either --query or --query-file is required"),
    }
}

fn pick_language(config: &BridgeConfig, language: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(language) = language {
        return Ok(language);
    }
    let inferred = file
        .and_then(|f| f.extension())
        .and_then(|ext| ext.to_str())
        .and_then(grammar::for_extension)
        .map(|g| g.name.to_string());
    inferred
        .or_else(|| config.default_language.clone())
        .ok_or_else(|| anyhow::anyhow!("cannot infer a language; pass --language"))
}

fn parse_byte_range(range: &str) -> anyhow::Result<(i64, i64)> {
    let (start, end) = range
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("byte range must look like START:END"))?;
    Ok((start.trim().parse()?, end.trim().parse()?))
}

fn run_query(
    env: &mut Env,
    language: &str,
    source: &str,
    query_source: &str,
    captures: bool,
    range: Option<(i64, i64)>,
) -> anyhow::Result<Vec<QueryHit>> {
    let lang = lisp(env, "tree-sitter-language-load", &[Value::from(language)])?;
    let tree = lisp(env, "tree-sitter-parse-string", &[lang.clone(), Value::from(source)])?;
    let root = lisp(env, "tree-sitter-tree-root-node", &[tree])?;
    let query = lisp(env, "tree-sitter-query-new", &[lang, Value::from(query_source)])?;
    let cursor = lisp(env, "tree-sitter-query-cursor-new", &[])?;

    if let Some((start, end)) = range {
        lisp(
            env,
            "tree-sitter-query-cursor-set-byte-range",
            &[cursor.clone(), Value::Int(start), Value::Int(end)],
        )?;
    }
    // The cursor only holds weak references to the query and the tree
    lisp(env, "tree-sitter-query-cursor-exec", &[cursor.clone(), query.clone(), root.clone()])?;

    let next = if captures {
        "tree-sitter-query-cursor-next-capture"
    } else {
        "tree-sitter-query-cursor-next-match"
    };

    let mut hits = Vec::new();
    loop {
        let result = lisp(env, next, &[cursor.clone()])?;
        if result.is_nil() {
            break;
        }
        let node = lisp(env, "tree-sitter-query-match-node", &[result.clone()])?;
        hits.push(QueryHit {
            pattern_index: int(&lisp(env, "tree-sitter-query-match-pattern-index", &[result.clone()])?)?,
            id: int(&lisp(env, "tree-sitter-query-match-id", &[result.clone()])?)?,
            capture_count: int(&lisp(env, "tree-sitter-query-match-capture-count", &[result])?)?,
            node: if node.is_nil() { None } else { Some(node_info(env, &node)?) },
        });
    }

    let exceeded = lisp(env, "tree-sitter-query-cursor-did-exceed-match-limit", &[cursor])?;
    if !exceeded.is_nil() {
        tracing::warn!("Match limit exceeded; some matches were dropped");
    }
    Ok(hits)
}

fn node_info(env: &mut Env, node: &Value) -> anyhow::Result<NodeInfo> {
    let arg = std::slice::from_ref(node);
    Ok(NodeInfo {
        kind: string(&lisp(env, "tree-sitter-node-type", arg)?)?,
        start_byte: int(&lisp(env, "tree-sitter-node-start-byte", arg)?)?,
        end_byte: int(&lisp(env, "tree-sitter-node-end-byte", arg)?)?,
        start_point: point(&lisp(env, "tree-sitter-node-start-point", arg)?)?,
        end_point: point(&lisp(env, "tree-sitter-node-end-point", arg)?)?,
        text: string(&lisp(env, "tree-sitter-node-text", arg)?)?,
    })
}

fn inspect_query(env: &mut Env, language: &str, query_source: &str) -> anyhow::Result<QueryReport> {
    let lang = lisp(env, "tree-sitter-language-load", &[Value::from(language)])?;
    let name = string(&lisp(env, "tree-sitter-language-name", &[lang.clone()])?)?;
    let query = lisp(env, "tree-sitter-query-new", &[lang, Value::from(query_source)])?;

    let mut listing = |count: &str, item: &str| -> anyhow::Result<Vec<Value>> {
        let n = int(&lisp(env, count, &[query.clone()])?)?;
        (0..n)
            .map(|id| lisp(env, item, &[query.clone(), Value::Int(id)]))
            .collect()
    };

    let captures = listing("tree-sitter-query-capture-count", "tree-sitter-query-capture-name-for-id")?;
    let strings = listing("tree-sitter-query-string-count", "tree-sitter-query-string-value-for-id")?;
    let patterns = listing("tree-sitter-query-pattern-count", "tree-sitter-query-start-byte-for-pattern")?;

    Ok(QueryReport {
        language: name,
        captures: captures.iter().map(string).collect::<anyhow::Result<_>>()?,
        strings: strings.iter().map(string).collect::<anyhow::Result<_>>()?,
        patterns: patterns.iter().map(int).collect::<anyhow::Result<_>>()?,
    })
}
