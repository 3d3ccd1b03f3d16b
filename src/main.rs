//! UTXO node CLI
//!
//! Loads a transaction snapshot and a UTXO snapshot, validates every
//! transaction, then answers snapshot queries.

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use utxo_consensus::query::QUERY_HELP;
use utxo_consensus::{ConsensusError, FullNode};

#[derive(Parser)]
#[command(name = "utxo-node")]
#[command(version)]
#[command(about = "Validate a transaction batch against a UTXO snapshot", long_about = None)]
struct Cli {
    /// Transaction snapshot (JSON with a `transactions` array)
    #[arg(short, long, env = "TRANSACTION_FILE_PATH")]
    transactions: PathBuf,

    /// UTXO snapshot (JSON with a `utxos` array)
    #[arg(short, long, env = "UTXO_FILE_PATH")]
    utxos: PathBuf,

    /// Answer a single query and exit instead of prompting
    #[arg(long)]
    once: Option<String>,
}

/// Print the answer to `line`; `false` if the query was not understood
fn answer(node: &FullNode, line: &str) -> anyhow::Result<bool> {
    match node.query(line) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            println!();
            Ok(true)
        }
        Err(ConsensusError::InvalidQuery(_)) => {
            println!("Invalid query entered");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let node = FullNode::from_files(&cli.transactions, &cli.utxos).with_context(|| {
        format!(
            "failed to validate {} against {}",
            cli.transactions.display(),
            cli.utxos.display()
        )
    })?;

    if let Some(query) = cli.once {
        let ok = answer(&node, &query)?;
        return Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    println!("{}\n", QUERY_HELP);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("% ");
        io::stdout().flush().context("failed to flush prompt")?;

        let Some(line) = lines.next() else {
            return Ok(ExitCode::SUCCESS);
        };
        let line = line.context("failed to read query")?;
        if !answer(&node, &line)? {
            return Ok(ExitCode::FAILURE);
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
