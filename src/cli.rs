//! Command-line driver for the lifecycle scenarios

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use crate::bridge::BridgeConfig;
use crate::demo::{Scenario, ScenarioReport};
use crate::runtime::HeapConfig;
use crate::utils::logger;

#[derive(Parser, Debug)]
#[command(
    name = "shellbridge",
    version,
    about = "Exercise native/runtime lifetime bridging against an in-process heap"
)]
pub struct ShellbridgeCli {
    #[arg(short, long, global = true)]
    /// Log every bridge state transition.
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl ShellbridgeCli {
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a lifecycle scenario, or `all` of them.
    Scenario {
        name: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the configuration loaded from the environment.
    Config {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct EffectiveConfig {
    bridge: BridgeConfig,
    heap: HeapConfig,
}

pub fn run() -> Result<()> {
    let cli = ShellbridgeCli::parse();
    logger::init_logging(cli.verbose);

    match &cli.command {
        Command::Scenario { name, format } => handle_scenario(name, *format),
        Command::Config { format } => handle_config(*format),
    }
}

fn resolve_scenarios(name: &str) -> Result<Vec<Scenario>> {
    if name == "all" {
        return Ok(Scenario::ALL.to_vec());
    }
    match name.parse::<Scenario>() {
        Ok(scenario) => Ok(vec![scenario]),
        Err(err) => {
            let known: Vec<_> = Scenario::ALL.iter().map(|s| s.name()).collect();
            bail!("{err} (expected `all` or one of: {})", known.join(", "))
        }
    }
}

fn handle_scenario(name: &str, format: OutputFormat) -> Result<()> {
    let scenarios = resolve_scenarios(name)?;

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let report = scenario
            .run()
            .with_context(|| format!("scenario `{scenario}` failed to run"))?;
        reports.push(report);
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&reports)?;
            println!("{json}");
        }
        OutputFormat::Text => {
            for report in &reports {
                print_report(report);
            }
        }
    }

    let failed = reports.iter().filter(|report| !report.passed()).count();
    if failed > 0 {
        bail!("{failed} scenario(s) failed");
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    let status = if report.passed() {
        "PASS".green()
    } else {
        "FAIL".red()
    };
    println!(
        "{} {} {}",
        status,
        report.scenario.name().bold(),
        format!("({})", report.scenario.description()).dimmed()
    );

    for check in &report.checks {
        let mark = if check.passed {
            "ok".green()
        } else {
            "failed".red()
        };
        println!("    {:<8} {}", mark, check.description);
    }

    let bridge = &report.bridge;
    println!(
        "    {} shells={} attached={} constructed={} rebound={} finalized={} stale={} live={}",
        "bridge".cyan(),
        bridge.shells_created,
        bridge.attached,
        bridge.constructed,
        bridge.rebound,
        bridge.finalized,
        bridge.stale_notifications,
        bridge.live_objects
    );
    let heap = &report.heap;
    println!(
        "    {} allocations={} collections={} collected={} finalized={} live={}",
        "heap".cyan(),
        heap.allocations,
        heap.collections,
        heap.objects_collected,
        heap.objects_finalized,
        heap.live_objects
    );
}

fn handle_config(format: OutputFormat) -> Result<()> {
    let config = EffectiveConfig {
        bridge: BridgeConfig::from_env(),
        heap: HeapConfig::from_env(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            println!("{}", "Bridge:".magenta());
            println!(
                "  check_construct_class: {}",
                config.bridge.check_construct_class
            );
            println!(
                "  strict_notifications:  {}",
                config.bridge.strict_notifications
            );
            println!("{}", "Heap:".magenta());
            println!("  finalize_on_collect:   {}", config.heap.finalize_on_collect);
            println!("  max_objects:           {}", config.heap.max_objects);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expands_to_every_scenario() {
        assert_eq!(resolve_scenarios("all").unwrap().len(), Scenario::ALL.len());
        assert_eq!(
            resolve_scenarios("rebind").unwrap(),
            vec![Scenario::Rebind]
        );
    }

    #[test]
    fn unknown_scenario_lists_known_names() {
        let err = resolve_scenarios("nope").unwrap_err().to_string();
        assert!(err.contains("unknown scenario `nope`"));
        assert!(err.contains("self-owned"));
    }
}
