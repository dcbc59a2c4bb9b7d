use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facedb::config::{
    DEFAULT_DATABASE_PATH, DEFAULT_MATCH_THRESHOLD, DEFAULT_MODEL, ENV_DATABASE_PATH, ENV_MATCH_THRESHOLD, ENV_MODEL,
};
use facedb::{EmbeddingStore, Metadata, StoreConfig};

/// Embedding identity store
#[derive(Parser)]
#[command(name = "facedb")]
#[command(about = "Store face embeddings and match them against known identities")]
#[command(version)]
pub struct Cli {
    /// Store file
    #[arg(long, env = ENV_DATABASE_PATH, default_value = DEFAULT_DATABASE_PATH)]
    pub db: PathBuf,

    /// Embedding model producing the vectors
    #[arg(long, env = ENV_MODEL, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Match threshold
    #[arg(long, env = ENV_MATCH_THRESHOLD, default_value_t = DEFAULT_MATCH_THRESHOLD)]
    pub threshold: f64,

    /// Command to run; starts an interactive session when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.db)
            .with_model(self.model.clone())
            .with_threshold(self.threshold)
    }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:7878")]
        bind: String,
    },
    /// Enroll a new identity
    Add {
        /// Metadata as a JSON object, e.g. '{"name":"Asha"}'
        metadata: String,
        /// Embedding components
        #[arg(required = true, allow_negative_numbers = true)]
        vector: Vec<f64>,
    },
    /// Find the closest known identity
    Find {
        /// Embedding components
        #[arg(required = true, allow_negative_numbers = true)]
        vector: Vec<f64>,
        /// Override the configured threshold
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Show one identity
    Get {
        id: String,
    },
    /// List all identities
    List,
    /// Show the number of identities
    Count,
    /// Interactive session
    Repl,
}

/// A single line typed into the interactive session.
#[derive(Parser)]
#[command(no_binary_name = true, name = "facedb>")]
struct ReplLine {
    #[command(subcommand)]
    command: Command,
}

/// REPL mode - interactive session against an open store
pub fn run_repl(store: &EmbeddingStore) {
    println!("FaceDB - Embedding Identity Store ({} identities, model {})", store.count(), store.model_tag());
    println!("Type 'help' for commands, 'exit' or 'quit' to quit\n");

    loop {
        print!("facedb> ");
        if let Err(error) = io::stdout().flush() {
            eprintln!("Error writing prompt: {}", error);
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                continue;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "exit" || input == "quit" {
            println!("Goodbye!");
            break;
        }

        if input == "help" {
            print_help();
            continue;
        }

        let command = match parse_repl_line(input) {
            Ok(cmd) => cmd,
            Err(error) => {
                eprintln!("{}", error);
                continue;
            }
        };

        if let Err(error) = execute_command(store, command) {
            eprintln!("Error: {:#}", error);
        }
    }
}

fn parse_repl_line(input: &str) -> Result<Command> {
    let line = ReplLine::try_parse_from(split_words(input))?;
    match line.command {
        Command::Serve { .. } | Command::Repl => bail!("not available inside the interactive session"),
        command => Ok(command),
    }
}

/// Splits on whitespace, keeping single-quoted runs together so JSON
/// metadata can contain spaces.
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in input.chars() {
        match ch {
            '\'' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

/// Runs one store command and prints its result.
pub fn execute_command(store: &EmbeddingStore, command: Command) -> Result<()> {
    match command {
        Command::Get { id } => {
            match store.get(&id) {
                Some(record) => println!(
                    "Identity '{}': model {}, dim {}, created {}, data {}",
                    record.id,
                    record.model_tag,
                    record.embedding_dim,
                    record.created_at.to_rfc3339(),
                    serde_json::Value::Object(record.metadata)
                ),
                None => bail!("identity '{}' not found", id),
            }
        }

        Command::List => {
            let records = store.list();
            if records.is_empty() {
                println!("Store is empty");
            } else {
                println!("Stored identities:");
                for summary in records {
                    println!("  {} [{}] {}: {}",
                        summary.id,
                        summary.model_tag,
                        summary.created_at.to_rfc3339(),
                        serde_json::Value::Object(summary.metadata));
                }
                println!("Total: {} identities", store.count());
            }
        }

        Command::Count => println!("{}", store.count()),

        Command::Add { metadata, vector } => {
            let metadata: Metadata = serde_json::from_str(&metadata)
                .context("metadata must be a JSON object")?;
            let id = store.add_with_current_model(metadata, vector)?;
            println!("Added identity with id: {}", id);
        }

        Command::Find { vector, threshold } => {
            let threshold = threshold.unwrap_or(store.config().match_threshold);
            match store.find(&vector, threshold) {
                Some(hit) => println!("Match: {} (distance: {:.4}) {}",
                    hit.record.id,
                    hit.distance,
                    serde_json::Value::Object(hit.record.metadata)),
                None => println!("No match"),
            }
        }

        Command::Serve { .. } | Command::Repl => bail!("command must be run from the shell"),
    }

    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  add '<json>' <v1> <v2> ...           - Enroll an identity");
    println!("  find <v1> <v2> ... [--threshold T]   - Find the closest identity");
    println!("  get <id>                             - Show one identity");
    println!("  list                                 - List all identities");
    println!("  count                                - Show identity count");
    println!("  help                                 - Show this help");
    println!("  exit, quit                           - Exit the program");
}

#[cfg(test)]
mod cli_test {
    use super::*;

    #[test]
    fn test_split_words_keeps_quoted_json() {
        let words = split_words("add '{\"name\": \"Asha Rao\"}' 0.1 -0.2");
        assert_eq!(words, vec!["add", "{\"name\": \"Asha Rao\"}", "0.1", "-0.2"]);
    }

    #[test]
    fn test_parse_repl_add() {
        let command = parse_repl_line("add '{\"name\":\"x\"}' 1.0 -2.5").unwrap();
        assert_eq!(command, Command::Add {
            metadata: "{\"name\":\"x\"}".to_string(),
            vector: vec![1.0, -2.5],
        });
    }

    #[test]
    fn test_parse_repl_find_with_threshold() {
        let command = parse_repl_line("find 0.5 0.5 --threshold 0.3").unwrap();
        assert_eq!(command, Command::Find { vector: vec![0.5, 0.5], threshold: Some(0.3) });
    }

    #[test]
    fn test_parse_repl_rejects_serve() {
        assert!(parse_repl_line("serve").is_err());
        assert!(parse_repl_line("find").is_err());
        assert!(parse_repl_line("bogus").is_err());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::try_parse_from(["facedb", "--db", "/tmp/x.json", "--model", "ArcFace", "--threshold", "0.2", "count"]).unwrap();
        let config = cli.store_config();

        assert_eq!(config.path, PathBuf::from("/tmp/x.json"));
        assert_eq!(config.model_tag, "ArcFace");
        assert!((config.match_threshold - 0.2).abs() < f64::EPSILON);
        assert_eq!(cli.command, Some(Command::Count));
    }

    #[test]
    fn test_cli_rejects_bad_threshold() {
        assert!(Cli::try_parse_from(["facedb", "--threshold", "close", "count"]).is_err());
    }

    #[test]
    fn test_execute_add_rejects_nan() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open(StoreConfig::new(dir.path().join("users.json")));

        let command = parse_repl_line("add '{}' NaN 1").unwrap();
        assert!(execute_command(&store, command).is_err());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_execute_add_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open(StoreConfig::new(dir.path().join("users.json")));

        execute_command(&store, Command::Add { metadata: "{\"name\":\"x\"}".to_string(), vector: vec![0.0, 0.0] }).unwrap();
        assert_eq!(store.count(), 1);

        execute_command(&store, Command::Find { vector: vec![0.0, 0.1], threshold: None }).unwrap();
        assert!(execute_command(&store, Command::Add { metadata: "[1]".to_string(), vector: vec![0.0] }).is_err());
        assert!(execute_command(&store, Command::Get { id: "missing".to_string() }).is_err());
    }
}
