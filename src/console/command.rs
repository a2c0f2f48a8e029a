//! Console command contract and the built-in `list` command.

use async_trait::async_trait;
use clap::{ArgMatches, Command as Definition};

use crate::console::application::Application;
use crate::console::output::Output;
use crate::Result;

/// A named console command.
///
/// Commands describe their arguments as a clap [`Definition`]; the console
/// mounts every definition as a subcommand and hands the parsed
/// [`ArgMatches`] to [`handle`](Command::handle). Commands with a
/// `#[derive(clap::Args)]` struct implement `definition` with
/// `Args::augment_args` and read it back with `FromArgMatches`.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn definition(&self) -> Definition {
        Definition::new(self.name().to_string()).about(self.description().to_string())
    }

    /// Run the command and return its exit code.
    async fn handle(&self, console: &Application, matches: &ArgMatches, output: &mut dyn Output) -> Result<i32>;
}

/// Lists the registered commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListCommand;

#[async_trait]
impl Command for ListCommand {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List commands"
    }

    async fn handle(&self, console: &Application, _matches: &ArgMatches, output: &mut dyn Output) -> Result<i32> {
        output.writeln(&format!("{} {}", console.name(), console.version()));
        output.writeln("");
        output.writeln("Available commands:");

        let width = console.all().map(|c| c.name().len()).max().unwrap_or(0);
        for command in console.all() {
            output.writeln(&format!("  {:<width$}  {}", command.name(), command.description()));
        }
        Ok(0)
    }
}
