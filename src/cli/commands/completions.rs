//! `garage completions` command - Shell completion scripts
//!
//! ```bash
//! source <(garage completions bash)      # ~/.bashrc
//! source <(garage completions zsh)       # ~/.zshrc
//! garage completions fish > ~/.config/fish/completions/garage.fish
//! ```

use clap::CommandFactory;
use clap_complete::Shell;
use miette::Result;

use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut command = Cli::command();
    let bin = command.get_name().to_string();
    tracing::debug!(shell = %args.shell, "generating completions");
    clap_complete::generate(args.shell, &mut command, bin, &mut std::io::stdout());
    Ok(())
}
