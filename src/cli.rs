use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "symdex",
    version,
    about = "Persistent source-tree knowledge graph",
    after_help = r#"Examples:
  symdex index --root .
  symdex index --root . --incremental
  symdex watch --root .
  symdex overview --root . --git
  symdex changed --root .
  symdex query --root . --method search_symbols --params '{"pattern":"Index*"}'
  symdex query --root . --method get_impact --params '{"files":["/p/src/store.ts"]}'
"#
)]
pub struct Args {
    /// Configuration file; startup fails when it is missing.
    #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index a project tree into the graph store.
    Index {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Reprocess every file even when unchanged.
        #[arg(long)]
        force: bool,
        /// Only reprocess files whose mtime changed since the last run.
        #[arg(long)]
        incremental: bool,
    },
    /// Index, then keep the graph current under filesystem changes.
    Watch {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Print project metadata, stats and top-ranked symbols.
    Overview {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Include git-derived churn data.
        #[arg(long)]
        git: bool,
    },
    /// Show files that changed against the tracking records.
    Changed {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Run one query method and print its JSON result.
    Query {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "{}")]
        params: String,
    },
}
