use clap::Parser;

use super::*;
use crate::time::Timedelta;

fn parse(args: &[&str]) -> Result<ToolArgs, clap::Error> {
    ToolArgs::try_parse_from(std::iter::once("metricq").chain(args.iter().copied()))
}

#[test]
fn discover_accepts_timeout_and_format() -> Result<(), clap::Error> {
    let args = parse(&[
        "--server",
        "metricq://broker",
        "discover",
        "-t",
        "30s",
        "--format",
        "json",
    ])?;
    match args.command {
        Command::Discover(discover) => {
            assert_eq!(discover.timeout, Some(Timedelta::from_seconds(30)));
            assert_eq!(discover.format, OutputFormat::Json);
        }
        _ => panic!("expected the discover subcommand"),
    }
    Ok(())
}

#[test]
fn global_options_may_follow_the_subcommand() -> Result<(), clap::Error> {
    let args = parse(&["check", "--server", "metricq://broker", "-v"])?;
    assert_eq!(args.server.as_deref(), Some("metricq://broker"));
    assert!(args.verbose);
    Ok(())
}

#[test]
fn energy_requires_a_command() {
    assert!(parse(&["energy", "-m", "elab.power"]).is_err());
    let args = parse(&["energy", "-m", "elab.power", "sleep", "10"]);
    assert!(args.is_ok());
}

#[test]
fn summary_collects_repeated_metrics_and_trailing_command() -> Result<(), clap::Error> {
    let args = parse(&[
        "summary",
        "-m",
        "elab.power",
        "-m",
        "elab.temp",
        "make",
        "-j8",
    ])?;
    match args.command {
        Command::Summary(summary) => {
            assert_eq!(summary.metric, ["elab.power", "elab.temp"]);
            assert_eq!(summary.command, ["make", "-j8"]);
        }
        _ => panic!("expected the summary subcommand"),
    }
    Ok(())
}

#[test]
fn send_parses_value_and_default_timestamp() -> Result<(), clap::Error> {
    let args = parse(&["send", "elab.power", "42.5"])?;
    match args.command {
        Command::Send(send) => assert_eq!(send.value, 42.5),
        _ => panic!("expected the send subcommand"),
    }
    Ok(())
}

#[test]
fn invalid_durations_are_rejected_by_the_parser() {
    assert!(parse(&["discover", "-t", "soon"]).is_err());
}

#[test]
fn default_tokens_differ_per_tool() -> Result<(), clap::Error> {
    let check = parse(&["check"])?;
    let spy = parse(&["spy", "elab.*"])?;
    assert_ne!(
        check.command.default_token(),
        spy.command.default_token()
    );
    Ok(())
}

#[test]
fn template_placeholders_expand_in_server_urls() -> Result<(), clap::Error> {
    // The parser runs unconditionally; with USER unset the value passes through.
    let args = parse(&["--server", "metricq://broker/$UNKNOWN", "check"])?;
    assert_eq!(args.server.as_deref(), Some("metricq://broker/$UNKNOWN"));
    Ok(())
}
