mod cli;
mod commands;
mod config;
mod paths;
mod run;
mod watcher;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let paths = AppPaths::discover()?;
    match cli.command {
        Command::Edit(args) => run::edit(args, &paths),
        Command::List => commands::list(&paths),
        Command::Show { id } => commands::show(&paths, &id),
        Command::Delete { id } => commands::delete(&paths, &id),
        Command::New(args) => commands::create(&paths, args),
    }
}
