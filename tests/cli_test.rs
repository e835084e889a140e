//! Tests driving commands through parsed command lines

use std::fs;

use clap::Parser;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use treemark::cli::args::Cli;
use treemark::cli::commands::execute_command;
use treemark::exitcode;

#[fixture]
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("budget.json"),
        r#"[{"income": [{"salary": 3000}]}, {"expenses": [{"rent": -1200}]}]"#,
    )
    .unwrap();
    fs::write(dir.path().join("broken.json"), "{").unwrap();
    fs::write(dir.path().join("treemark.toml"), "").unwrap();
    dir
}

fn run(dir: &TempDir, args: &[&str]) -> Result<(), i32> {
    let data_dir = dir.path().to_string_lossy().into_owned();
    let config = dir.path().join("treemark.toml").to_string_lossy().into_owned();
    let mut argv = vec!["treemark", "-C", data_dir.as_str(), "--config", config.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("valid command line");
    execute_command(&cli).map_err(|e| e.exit_code())
}

#[rstest]
#[case(&["list"])]
#[case(&["show", "budget", "--plain"])]
#[case(&["show", "budget", "--plain", "--debug", "-q", "rent"])]
#[case(&["show", "budget", "-q", "nothing-like-this"])]
#[case(&["show", "budget", "-m", "income=skip", "-t", "expenses=invert", "--depth", "1"])]
#[case(&["value", "budget", "income/salary"])]
#[case(&["value", "budget", "-m", "expenses=skip"])]
#[case(&["config", "show"])]
#[case(&["config", "path"])]
fn given_valid_command_when_executed_then_succeeds(workspace: TempDir, #[case] args: &[&str]) {
    assert_eq!(run(&workspace, args), Ok(()));
}

#[rstest]
#[case(&["show", "missing"], exitcode::NOINPUT)]
#[case(&["value", "broken"], exitcode::DATAERR)]
#[case(&["value", "budget", "income/bonus"], exitcode::USAGE)]
#[case(&["show", "budget", "-m", "nope=skip"], exitcode::USAGE)]
fn given_failing_command_when_executed_then_exit_code_matches(
    workspace: TempDir,
    #[case] args: &[&str],
    #[case] code: i32,
) {
    assert_eq!(run(&workspace, args), Err(code));
}

#[rstest]
fn given_existing_config_when_init_without_force_then_refused(workspace: TempDir) {
    assert_eq!(run(&workspace, &["config", "init"]), Err(exitcode::USAGE));

    assert_eq!(run(&workspace, &["config", "init", "--force"]), Ok(()));

    let written = fs::read_to_string(workspace.path().join("treemark.toml")).unwrap();
    assert!(written.contains("[appearance]"));
}

#[test]
fn given_no_subcommand_when_executed_then_usage_error() {
    let cli = Cli::try_parse_from(["treemark"]).unwrap();

    let err = execute_command(&cli).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::USAGE);
}
