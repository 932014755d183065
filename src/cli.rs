//! CLI argument parsing.
use crate::config::Overrides;
use crate::documents::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sapdoc",
    version,
    about = "Generate SAP project documents with a language model",
    after_help = "Examples:\n  sapdoc brd --input project.json\n  sapdoc brd --interactive --out-dir docs\n  sapdoc code-doc --code ZSALES_REPORT.abap --format text\n  sapdoc user-stories --brd brd_details.json --format json\n  sapdoc brd --input project.json --lm 'llm -m gpt-4o'",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Brd(BrdArgs),
    CodeDoc(CodeDocArgs),
    UserStories(UserStoriesArgs),
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Brd(args) => &args.common,
            Command::CodeDoc(args) => &args.common,
            Command::UserStories(args) => &args.common,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Generate a Business Requirement Document")]
pub struct BrdArgs {
    /// Project inputs as JSON or TOML
    #[arg(
        long,
        value_name = "FILE",
        required_unless_present = "interactive",
        conflicts_with = "interactive"
    )]
    pub input: Option<PathBuf>,

    /// Prompt for project inputs on the terminal
    #[arg(long)]
    pub interactive: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Document, review and suggest optimizations for ABAP source")]
pub struct CodeDocArgs {
    /// ABAP source upload (.txt or .abap)
    #[arg(long, value_name = "FILE")]
    pub code: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Generate user stories from BRD details")]
pub struct UserStoriesArgs {
    /// BRD details as a JSON or TOML map of section to text
    #[arg(long, value_name = "FILE")]
    pub brd: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Flags shared by every document command.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Config file (default: $SAPDOC_CONFIG, then the per-user config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model command reading the prompt on stdin (selects the command backend)
    #[arg(long, value_name = "COMMAND")]
    pub lm: Option<String>,

    /// Model name sent to the chat-completions endpoint
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Directory artifacts are written to
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Artifact format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Check the draft directly instead of asking the model to review it
    #[arg(long)]
    pub no_self_review: bool,

    /// Total generate and review cycles before giving up
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_cycles: Option<u32>,

    /// Emit a machine-readable JSON run report on stdout
    #[arg(long)]
    pub json: bool,

    /// Debug logging and full prompt/response capture under .sapdoc/lm_log/
    #[arg(long)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            lm_command: self.lm.clone(),
            model: self.model.clone(),
            out_dir: self.out_dir.clone(),
            format: self.format,
            no_self_review: self.no_self_review,
            max_cycles: self.max_cycles,
        }
    }
}
