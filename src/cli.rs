use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Input .json workspace file (variables and equations)
    pub input: PathBuf,
    /// Output .json file; results are printed to stdout when omitted
    pub output: Option<PathBuf>,
    /// Extra statement to run after the workspace's own equations
    #[arg(short, long = "eval", value_name = "EXPR")]
    pub eval: Vec<String>,
}
