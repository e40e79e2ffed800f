use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
pub struct AttrScoreArgs {
    /// TOML file with an `[index]` table. Defaults are used if it is missing.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Builds an index from a tab separated document file.
    Build {
        /// One document per line: `doc_id<TAB>term:score term:score ...`.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Runs one query and prints the matches as JSON.
    Query {
        #[arg(long)]
        index: PathBuf,
        /// `term:weight`, repeatable. A bare term has weight 1.
        #[arg(long = "term", required = true)]
        terms: Vec<String>,
        #[arg(long, default_value_t = 10)]
        hits: usize,
        /// Return the best scoring matches instead of the first ones.
        #[arg(long)]
        ranked: bool,
    },
    /// Prints index statistics as JSON.
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
}
