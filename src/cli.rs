use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "tagstudy",
    version,
    about = "Local study compilation and assignment tooling for text annotation studies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Compile(CompileArgs),
    Validate(ValidateArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    #[arg(long)]
    pub spec: PathBuf,

    #[arg(long)]
    pub dataset: PathBuf,

    #[arg(long)]
    pub out: PathBuf,

    #[arg(long)]
    pub dataset_b: Option<PathBuf>,

    #[arg(long)]
    pub context_sidecar: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long)]
    pub spec: PathBuf,

    #[arg(long)]
    pub dataset: Option<PathBuf>,

    #[arg(long)]
    pub dataset_b: Option<PathBuf>,

    #[arg(long)]
    pub context_sidecar: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "out")]
    pub out: PathBuf,
}
