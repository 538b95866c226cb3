//! QuorumKV CLI Client
//!
//! Command-line interface for interacting with a QuorumKV node.

use bytes::Bytes;
use clap::{Parser, Subcommand};
use quorumkv::kv::ScanRequest;
use quorumkv::network::Client;
use quorumkv::{Entry, KvError, Result};

/// QuorumKV CLI
#[derive(Parser, Debug)]
#[command(name = "quorumkv-cli")]
#[command(about = "CLI for the QuorumKV key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List keys in [start, end), one page at a time
    Scan {
        start: String,
        end: String,

        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Last key of the previous page
        #[arg(short, long)]
        cursor: Option<String>,
    },

    /// Set several pairs given as key=value
    Batch {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Show cluster health
    Status {
        /// Ping every peer instead of using cached health
        #[arg(long)]
        probe: bool,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        match e {
            KvError::KeyNotFound => {
                println!("(nil)");
                std::process::exit(1);
            }
            e => {
                eprintln!("error: {}", e);
                if e.is_transient() {
                    eprintln!("(transient failure, the request can be retried as is)");
                }
                std::process::exit(2);
            }
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Get { key } => print_entry(&client.get(&key)?),
        Commands::Set { key, value } => {
            let outcome = client.put(&key, value)?;
            let verb = if outcome.created { "created" } else { "updated" };
            println!("{} {} (version {})", verb, key, outcome.entry.version);
        }
        Commands::Del { key } => {
            let deleted = client.delete(&key)?;
            println!("{}", if deleted { "deleted" } else { "not found" });
        }
        Commands::Scan {
            start,
            end,
            limit,
            cursor,
        } => {
            let request = ScanRequest {
                start,
                end,
                limit,
                cursor,
            };
            let page = client.scan(request)?;
            for entry in &page.entries {
                print_entry(entry);
            }
            match page.next_cursor {
                Some(cursor) if page.has_more => println!("-- more after {:?}", cursor),
                _ => println!("-- end ({} entries)", page.entries.len()),
            }
        }
        Commands::Batch { pairs } => {
            let items = pairs
                .iter()
                .map(|pair| parse_pair(pair))
                .collect::<Result<Vec<_>>>()?;
            let results = client.batch_put(items)?;
            let created = results.iter().filter(|r| r.created).count();
            println!(
                "{} entries written ({} created, {} updated)",
                results.len(),
                created,
                results.len() - created
            );
        }
        Commands::Status { probe } => {
            let status = client.cluster_status(probe)?;
            println!("replication enabled: {}", status.replication_enabled);
            println!(
                "healthy nodes: {}/{} (quorum {}, has quorum: {})",
                status.healthy_nodes, status.total_nodes, status.quorum_threshold, status.has_quorum
            );
            println!("retry attempts: {}", status.retry_attempts);
            for node in &status.nodes {
                let state = if node.healthy { "healthy" } else { "unhealthy" };
                println!("  {} {}", node.addr, state);
            }
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG from {}", client.addr());
        }
    }

    Ok(())
}

fn parse_pair(pair: &str) -> Result<(String, Bytes)> {
    match pair.split_once('=') {
        Some((key, value)) => Ok((key.to_string(), Bytes::from(value.to_string()))),
        None => Err(KvError::Config(format!("expected key=value, got {:?}", pair))),
    }
}

fn print_entry(entry: &Entry) {
    println!(
        "{} = {} (v{})",
        entry.key,
        String::from_utf8_lossy(&entry.value),
        entry.version
    );
}
