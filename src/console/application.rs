//! Console application: command registry and run loop.
//!
//! # Responsibilities
//! - Hold the registered commands by name
//! - Run starting bootstrappers when the console is created
//! - Parse argv with clap against the registered command definitions, run
//!   one command, report its exit code
//! - Fire console lifecycle events around every command
//!
//! # Design Decisions
//! - Starting bootstrappers are passed in explicitly, never kept in a
//!   process-wide list
//! - Command failures become exit code 1 with the error printed; the
//!   console never panics on bad input
//! - Unknown names are accepted by the parser as external subcommands so
//!   they get the console's own "not defined" message
//! - Usage errors and `--help` print clap's rendering and return its exit
//!   code without firing command events

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::{ColorChoice, Command as Definition};

use crate::console::command::Command;
use crate::console::output::{BufferedOutput, Output};
use crate::events::{Event, EventDispatcher};
use crate::lifecycle::Application as LifecycleApplication;

/// Command run when argv names none.
pub const DEFAULT_COMMAND: &str = "list";

/// Callback run once while the console starts, typically to register
/// commands.
pub type StartingBootstrapper = Box<dyn Fn(&mut Application) + Send + Sync>;

pub struct Application {
    name: String,
    version: String,
    app: Arc<dyn LifecycleApplication>,
    events: Arc<EventDispatcher>,
    commands: BTreeMap<String, Arc<dyn Command>>,
    last_output: Option<BufferedOutput>,
}

impl Application {
    pub fn new(app: Arc<dyn LifecycleApplication>, events: Arc<EventDispatcher>) -> Self {
        Self::with_bootstrappers(app, events, &[])
    }

    /// Create the console, announce it, then run `bootstrappers` in order.
    pub fn with_bootstrappers(
        app: Arc<dyn LifecycleApplication>,
        events: Arc<EventDispatcher>,
        bootstrappers: &[StartingBootstrapper],
    ) -> Self {
        let mut console = Self {
            name: app.name().to_string(),
            version: app.version().to_string(),
            app,
            events,
            commands: BTreeMap::new(),
            last_output: None,
        };

        console.events.dispatch(&Event::ConsoleStarting {
            application: &console.name,
            version: &console.version,
        });
        for bootstrapper in bootstrappers {
            bootstrapper(&mut console);
        }
        console
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The application the commands run against.
    pub fn application(&self) -> &Arc<dyn LifecycleApplication> {
        &self.app
    }

    /// Register a command under its name, replacing any previous one.
    pub fn add(&mut self, command: Arc<dyn Command>) -> &mut Self {
        tracing::debug!(command = command.name(), "console command registered");
        self.commands.insert(command.name().to_string(), command);
        self
    }

    pub fn resolve_commands<I>(&mut self, commands: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Command>>,
    {
        for command in commands {
            self.add(command);
        }
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.commands.get(name)
    }

    /// Registered commands, sorted by name.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.values()
    }

    /// Parser covering every registered command as a subcommand.
    pub fn definition(&self) -> Definition {
        Definition::new(self.name.clone())
            .version(self.version.clone())
            .no_binary_name(true)
            .disable_help_subcommand(true)
            .allow_external_subcommands(true)
            .color(ColorChoice::Never)
            .subcommands(self.commands.values().map(|command| command.definition()))
    }

    /// Run the command named by `argv` (program name excluded).
    pub async fn run<S: AsRef<str>>(&self, argv: &[S], output: &mut dyn Output) -> i32 {
        let argv: Vec<&str> = if argv.is_empty() {
            vec![DEFAULT_COMMAND]
        } else {
            argv.iter().map(AsRef::as_ref).collect()
        };

        let matches = match self.definition().try_get_matches_from(argv.iter().copied()) {
            Ok(matches) => matches,
            Err(e) => {
                output.write(&e.render().to_string());
                return e.exit_code();
            }
        };
        let Some((name, command_matches)) = matches.subcommand() else {
            output.writeln("No command given.");
            return 1;
        };
        let arguments: Vec<String> = argv.iter().skip(1).map(|arg| arg.to_string()).collect();

        self.events.dispatch(&Event::CommandStarting {
            command: name,
            arguments: &arguments,
        });

        let exit_code = match self.commands.get(name) {
            Some(command) => match command.handle(self, command_matches, output).await {
                Ok(code) => code,
                Err(e) => {
                    tracing::error!(command = %name, error = %e, "command failed");
                    output.writeln(&format!("error: {e}"));
                    1
                }
            },
            None => {
                output.writeln(&format!("Command \"{name}\" is not defined."));
                1
            }
        };

        self.events.dispatch(&Event::CommandFinished {
            command: name,
            exit_code,
        });
        tracing::debug!(command = %name, exit_code, "command finished");
        exit_code
    }

    /// Run a command programmatically, capturing its output.
    pub async fn call(&mut self, command: &str, parameters: &[&str]) -> i32 {
        let mut argv = Vec::with_capacity(parameters.len() + 1);
        argv.push(command);
        argv.extend_from_slice(parameters);

        let mut buffer = BufferedOutput::new();
        let exit_code = self.run(argv.as_slice(), &mut buffer).await;
        self.last_output = Some(buffer);
        exit_code
    }

    /// Output of the last [`call`](Application::call).
    pub fn output(&self) -> String {
        self.last_output
            .as_ref()
            .map(|out| out.contents().to_string())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}
