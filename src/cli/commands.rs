//! Command dispatch

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::services::{TreeService, TreeView};
use crate::cli::args::{Cli, Commands, ConfigCommands, MarkSpec};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::format_value;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::List) => cmd_list(&container(cli)?),
        Some(Commands::Show {
            dataset,
            query,
            marks,
            toggles,
            debug,
            depth,
            plain,
        }) => cmd_show(
            &container(cli)?,
            dataset,
            query,
            marks,
            toggles,
            ShowOptions {
                debug: *debug,
                depth: *depth,
                plain: *plain,
            },
        ),
        Some(Commands::Value {
            dataset,
            path,
            marks,
        }) => cmd_value(&container(cli)?, dataset, path, marks),
        Some(Commands::Config { command }) => cmd_config(cli, command),
        Some(Commands::Completion { shell }) => {
            print_completions(*shell);
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see --help".to_string(),
        )),
    }
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut settings = Settings::load(fs.as_ref(), cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    debug!("data_dir: {}", settings.data_dir.display());
    Ok(ServiceContainer::with_deps(settings, fs))
}

fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

#[instrument(skip(container))]
fn cmd_list(container: &ServiceContainer) -> CliResult<()> {
    let datasets = container.dataset_service();
    let names = datasets.list()?;
    if names.is_empty() {
        output::warning(&format!(
            "no datasets found in {}",
            datasets.data_dir().display()
        ));
    }
    for name in names {
        output::info(&name);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct ShowOptions {
    debug: bool,
    depth: Option<usize>,
    plain: bool,
}

/// Select a dataset and apply marker commands in order.
fn prepare(
    container: &ServiceContainer,
    dataset: &str,
    marks: &[MarkSpec],
    toggles: &[MarkSpec],
) -> CliResult<(TreeService, String)> {
    let datasets = container.dataset_service();
    let mut trees = container.tree_service();

    let loaded = trees.select(&datasets, dataset)?;
    let name = loaded.name.clone();
    for diagnostic in &loaded.diagnostics {
        output::warning(diagnostic);
    }

    for spec in marks {
        trees.set_marker(&spec.path, spec.marker)?;
    }
    for spec in toggles {
        trees.toggle_marker(&spec.path, spec.marker)?;
    }
    Ok((trees, name))
}

#[instrument(skip(container, marks, toggles))]
fn cmd_show(
    container: &ServiceContainer,
    dataset: &str,
    query: &str,
    marks: &[MarkSpec],
    toggles: &[MarkSpec],
    options: ShowOptions,
) -> CliResult<()> {
    let (trees, name) = prepare(container, dataset, marks, toggles)?;

    let mut renderer = container
        .renderer(options.debug)?
        .collapse_at(options.depth);
    if options.plain {
        renderer = renderer.plain();
    }

    match trees.view(query) {
        TreeView::NotLoaded => Err(CliError::Usage(format!("dataset not loaded: {name}"))),
        TreeView::NoResults => {
            output::warning("No results found");
            Ok(())
        }
        TreeView::Ready(tree) => {
            let (rendered, stats) = renderer.render(&tree, &name);
            output::info(&rendered);
            if options.debug {
                for line in stats.lines() {
                    output::detail(&line);
                }
            }
            Ok(())
        }
    }
}

#[instrument(skip(container, marks))]
fn cmd_value(
    container: &ServiceContainer,
    dataset: &str,
    path: &str,
    marks: &[MarkSpec],
) -> CliResult<()> {
    let (trees, _) = prepare(container, dataset, marks, &[])?;
    let value = trees.aggregated_value(path)?;
    output::info(&format_value(value));
    Ok(())
}

fn config_target(cli: &Cli) -> CliResult<PathBuf> {
    cli.config
        .clone()
        .or_else(global_config_path)
        .ok_or_else(|| CliError::Usage("cannot determine config directory".to_string()))
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = container(cli)?.settings;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            let target = config_target(cli)?;
            let state = if target.exists() { "exists" } else { "not found" };
            output::action("config", &format!("{} ({})", target.display(), state));
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let target = config_target(cli)?;
            let container = ServiceContainer::new(Settings::default());
            if container.fs.exists(&target) && !force {
                return Err(CliError::Usage(format!(
                    "config already exists: {} (use --force to overwrite)",
                    target.display()
                )));
            }
            container
                .fs
                .ensure_parent(&target)
                .map_err(|e| InfraError::io(format!("create parent of {}", target.display()), e))?;
            container
                .fs
                .write(&target, &Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", target.display()), e))?;
            output::success(&format!("created {}", target.display()));
            Ok(())
        }
    }
}
