use clap::Parser;
use garage::cli::{Cli, Commands};
use garage::cli::commands;
use miette::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Terminate quietly when piped into `head` and friends
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(global.verbose);

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Shop(cmd) => commands::shop::run(cmd, &global),
        Commands::Customer(cmd) => commands::customer::run(cmd, &global),
        Commands::Vehicle(cmd) => commands::vehicle::run(cmd, &global),
        Commands::Order(cmd) => commands::order::run(cmd, &global),
        Commands::Part(cmd) => commands::part::run(cmd, &global),
        Commands::Stock(cmd) => commands::stock::run(cmd, &global),
        Commands::Notify(cmd) => commands::notify::run(cmd, &global),
        Commands::Report(cmd) => commands::report::run(cmd, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

/// Log to stderr; `GARAGE_LOG` takes a filter directive, `-v` means debug
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GARAGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
