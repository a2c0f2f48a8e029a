//! `route:list`: print the registered routes.

use std::sync::Arc;

use async_trait::async_trait;
use clap::{ArgMatches, Args, Command as Definition, FromArgMatches};
use serde_json::json;

use crate::console::application::Application;
use crate::console::command::Command;
use crate::console::output::Output;
use crate::routing::{Route, Router};
use crate::{Error, Result};

const HEADERS: [&str; 6] = ["Domain", "Method", "URI", "Name", "Action", "Middleware"];

/// Options of `route:list`.
#[derive(Debug, Clone, Default, Args)]
pub struct RouteListArgs {
    /// Only routes answering this method
    #[arg(long)]
    pub method: Option<String>,

    /// Only routes whose name contains this text, or matches it when it has `*`
    #[arg(long)]
    pub name: Option<String>,

    /// Only routes whose URI contains this text
    #[arg(long)]
    pub path: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Prints every route as a table, or as JSON with `--json`.
pub struct RouteListCommand {
    router: Arc<Router>,
}

impl RouteListCommand {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    fn rows(&self, args: &RouteListArgs) -> Vec<[String; 6]> {
        let method = args.method.as_deref().map(str::to_ascii_uppercase);

        self.router
            .routes()
            .iter()
            .filter(|route| args.name.as_deref().map_or(true, |n| name_matches(route, n)))
            .map(|route| row(route))
            .filter(|row| method.as_deref().map_or(true, |m| row[1].split('|').any(|verb| verb == m)))
            .filter(|row| args.path.as_deref().map_or(true, |p| row[2].contains(p)))
            .collect()
    }
}

fn name_matches(route: &Route, filter: &str) -> bool {
    if filter.contains('*') {
        return route.named(&[filter]);
    }
    route.name().is_some_and(|name| name.contains(filter))
}

fn row(route: &Route) -> [String; 6] {
    let methods = route
        .methods()
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("|");
    let middleware = route
        .middleware()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    [
        route.domain().unwrap_or_default().to_string(),
        methods,
        route.uri().to_string(),
        route.name().unwrap_or_default().to_string(),
        route.action().describe(),
        middleware,
    ]
}

#[async_trait]
impl Command for RouteListCommand {
    fn name(&self) -> &str {
        "route:list"
    }

    fn description(&self) -> &str {
        "List all registered routes"
    }

    fn definition(&self) -> Definition {
        RouteListArgs::augment_args(Definition::new("route:list").about(self.description().to_string()))
    }

    async fn handle(&self, _console: &Application, matches: &ArgMatches, output: &mut dyn Output) -> Result<i32> {
        let args = RouteListArgs::from_arg_matches(matches).map_err(Error::handler)?;
        let rows = self.rows(&args);

        if args.json {
            let routes: Vec<_> = rows
                .iter()
                .map(|r| {
                    json!({
                        "domain": r[0], "method": r[1], "uri": r[2],
                        "name": r[3], "action": r[4], "middleware": r[5],
                    })
                })
                .collect();
            output.writeln(&serde_json::to_string_pretty(&routes)?);
            return Ok(0);
        }

        if rows.is_empty() {
            output.writeln("Your application doesn't have any routes.");
            return Ok(0);
        }

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let line = |cells: &[&str]| {
            cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        output.writeln(&line(&HEADERS));
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            output.writeln(&line(&cells));
        }
        Ok(0)
    }
}
