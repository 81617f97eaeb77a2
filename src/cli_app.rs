//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use opsdeck::core::config::Config;
use opsdeck::core::errors::OpsError;
use opsdeck::engine::controller::ModeController;
use opsdeck::engine::derive::OperationalSnapshot;
use opsdeck::engine::projector::{DetailRecord, Selection, Trend};
use opsdeck::model::catalog::{MetricCatalog, MetricCategory};
use opsdeck::model::mode::{ModeFlag, ModeState, Severity};
use opsdeck::model::status::{KpiStatus, SubsystemStatus};

/// Airport operations dashboard core, inspected from the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "opsdeck",
    author,
    version,
    about = "Operational status dashboard inspector",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the snapshot derived for a mode combination.
    Snapshot(ModeArgs),
    /// Print the detail view of one KPI or subsystem.
    Detail(DetailArgs),
    /// List catalog definitions and validation findings.
    Catalog,
}

/// Mode flags switched on for this invocation, on top of the configured ones.
#[derive(Debug, Clone, Copy, Args, Default)]
struct ModeArgs {
    /// Engage emergency mode.
    #[arg(long)]
    emergency: bool,
    /// Raise an operations alert.
    #[arg(long)]
    alert: bool,
    /// Mark systems as optimized.
    #[arg(long)]
    optimized: bool,
}

impl ModeArgs {
    fn requested(self) -> [(ModeFlag, bool); 3] {
        [
            (ModeFlag::Emergency, self.emergency),
            (ModeFlag::OperationsAlert, self.alert),
            (ModeFlag::SystemOptimized, self.optimized),
        ]
    }
}

#[derive(Debug, Clone, Args)]
struct DetailArgs {
    /// KPI or subsystem id (e.g. `bhs`, `active_flights`).
    id: String,
    #[command(flatten)]
    modes: ModeArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<OpsError> for CliError {
    fn from(err: OpsError) -> Self {
        if matches!(err, OpsError::UnknownSelection { .. }) {
            Self::User(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Snapshot(args) => run_snapshot(cli, &config, *args),
        Command::Detail(args) => run_detail(cli, &config, args),
        Command::Catalog => run_catalog(cli),
    }
}

fn controller_for(config: &Config, args: ModeArgs) -> ModeController {
    let controller = ModeController::from_config(MetricCatalog::airport_default(), config);
    // Flags already on from config publish nothing.
    for (flag, _) in args.requested().into_iter().filter(|(_, on)| *on) {
        controller.set(flag, true);
    }
    controller
}

// ──────────────────── snapshot ────────────────────

fn run_snapshot(cli: &Cli, config: &Config, args: ModeArgs) -> Result<(), CliError> {
    let controller = controller_for(config, args);
    let view = controller.view();

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "snapshot",
            "tick": view.tick,
            "fingerprint": view.snapshot.fingerprint(),
            "snapshot": serde_json::to_value(&*view.snapshot)?,
        })),
        OutputMode::Human => print_snapshot(&view.snapshot, view.modes),
    }
}

fn print_snapshot(snapshot: &OperationalSnapshot, modes: ModeState) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", "Airport Operations".bold())?;
    writeln!(out, "  Modes: {}", describe_modes(modes))?;
    writeln!(
        out,
        "  Overall: {}",
        paint_subsystem(snapshot.overall_status(), snapshot.overall_status().label())
    )?;
    for banner in &snapshot.banners {
        writeln!(out, "  {}", paint_severity(banner.severity, &banner.label))?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "KPIs".bold())?;
    for kpi in &snapshot.kpis {
        let value = format!("{} {}", kpi.value, kpi.unit);
        writeln!(
            out,
            "  {:<24} {:>14}  {:>8}  {}",
            kpi.label,
            value.trim_end(),
            kpi.change.to_string(),
            paint_kpi(kpi.status, kpi.status.label())
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Subsystems".bold())?;
    for sub in &snapshot.subsystems {
        writeln!(
            out,
            "  {:<28} {:>6.1}%  {:>+7.2}  {}",
            sub.name,
            sub.uptime_percent,
            sub.delta_from_nominal,
            paint_subsystem(sub.status, sub.status.label())
        )?;
    }
    Ok(())
}

// ──────────────────── detail ────────────────────

fn run_detail(cli: &Cli, config: &Config, args: &DetailArgs) -> Result<(), CliError> {
    let controller = controller_for(config, args.modes);
    let snapshot = controller.snapshot();
    let selection = Selection::find(&snapshot, &args.id).ok_or_else(|| OpsError::UnknownSelection {
        id: args.id.clone(),
    })?;
    let detail = controller.project(&selection, &snapshot);

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "detail",
            "detail": serde_json::to_value(&detail)?,
        })),
        OutputMode::Human => print_detail(&detail),
    }
}

fn print_detail(detail: &DetailRecord) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    writeln!(out, "{} ({})", detail.title.bold(), detail.id)?;
    writeln!(out, "  Status:  {}", detail.status)?;
    writeln!(out, "  Current: {} {}", detail.current_value, detail.unit)?;
    writeln!(out, "  Updated: {}", detail.last_updated.to_rfc3339())?;
    if !detail.description.is_empty() {
        writeln!(out, "  {}", detail.description.dimmed())?;
    }
    writeln!(out)?;
    for metric in &detail.key_metrics {
        let arrow = match metric.trend {
            Trend::Up => "▲".green(),
            Trend::Down => "▼".red(),
            Trend::Stable => "■".normal(),
        };
        writeln!(
            out,
            "  {:<12} {:>8.1} {:<6} {} {:+.1}",
            metric.name, metric.value, metric.unit, arrow, metric.change_percent
        )?;
    }
    if !detail.related_assets.is_empty() {
        writeln!(out)?;
        writeln!(out, "  Related: {}", detail.related_assets.join(", "))?;
    }
    Ok(())
}

// ──────────────────── catalog ────────────────────

fn run_catalog(cli: &Cli) -> Result<(), CliError> {
    let catalog = MetricCatalog::airport_default();
    let findings = catalog.validate();

    match output_mode(cli) {
        OutputMode::Json => {
            let definitions: Vec<Value> = catalog
                .iter()
                .map(|def| {
                    json!({
                        "id": def.id,
                        "category": def.category,
                        "label": def.label,
                        "unit": def.unit,
                        "icon": def.icon,
                        "governed_by": def.formula.governed_by(),
                    })
                })
                .collect();
            let findings: Vec<Value> = findings
                .iter()
                .map(|f| json!({ "code": f.code(), "message": f.to_string() }))
                .collect();
            write_json_line(&json!({
                "command": "catalog",
                "definitions": definitions,
                "findings": findings,
            }))
        }
        OutputMode::Human => {
            let mut out = io::stdout().lock();
            for def in catalog.iter() {
                let kind = match def.category {
                    MetricCategory::Kpi => "kpi",
                    MetricCategory::Subsystem => "subsystem",
                };
                let governed: Vec<&str> =
                    def.formula.governed_by().into_iter().map(ModeFlag::key).collect();
                writeln!(
                    out,
                    "  {:<22} {:<10} {:<26} [{}]",
                    def.id,
                    kind,
                    def.label,
                    governed.join(", ")
                )?;
            }
            if findings.is_empty() {
                writeln!(out, "\n  {}", "catalog valid".green())?;
            } else {
                for finding in &findings {
                    writeln!(out, "  {}", finding.to_string().yellow())?;
                }
            }
            Ok(())
        }
    }
}

// ──────────────────── output helpers ────────────────────

fn describe_modes(modes: ModeState) -> String {
    if modes.is_nominal() {
        return "nominal".to_string();
    }
    modes.active().map(ModeFlag::key).collect::<Vec<_>>().join(", ")
}

fn paint_severity(severity: Severity, text: &str) -> ColoredString {
    match severity {
        Severity::Critical => text.red().bold(),
        Severity::Warning => text.yellow().bold(),
        Severity::Info => text.cyan(),
    }
}

fn paint_subsystem(status: SubsystemStatus, text: &str) -> ColoredString {
    match status {
        SubsystemStatus::Optimal | SubsystemStatus::Operational => text.green(),
        SubsystemStatus::Warning | SubsystemStatus::Maintenance => text.yellow(),
        SubsystemStatus::Critical => text.red(),
    }
}

fn paint_kpi(status: KpiStatus, text: &str) -> ColoredString {
    match status {
        KpiStatus::Good => text.green(),
        KpiStatus::Warning => text.yellow(),
        KpiStatus::Critical => text.red(),
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("OPSDECK_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn clap_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn snapshot_accepts_mode_flags() {
        let cli = Cli::try_parse_from(["opsdeck", "snapshot", "--emergency", "--optimized"])
            .expect("should parse");
        match cli.command {
            Command::Snapshot(args) => {
                assert!(args.emergency);
                assert!(!args.alert);
                assert!(args.optimized);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn requested_flags_publish_once_on_top_of_config() {
        let mut config = Config::default();
        config.logging.enabled = false;
        config.modes.operations_alert = true;
        let args = ModeArgs {
            emergency: true,
            alert: true,
            optimized: false,
        };

        let controller = controller_for(&config, args);
        assert_eq!(controller.tick(), 1);
        let modes = controller.modes();
        assert!(modes.get(ModeFlag::Emergency));
        assert!(modes.get(ModeFlag::OperationsAlert));
        assert!(!modes.get(ModeFlag::SystemOptimized));
    }

    #[test]
    fn detail_requires_id() {
        assert!(Cli::try_parse_from(["opsdeck", "detail"]).is_err());
        let cli = Cli::try_parse_from(["opsdeck", "detail", "bhs", "--alert", "--json"])
            .expect("should parse");
        assert!(cli.json);
        match cli.command {
            Command::Detail(args) => {
                assert_eq!(args.id, "bhs");
                assert!(args.modes.alert);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("json"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human"), false), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("auto"), true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn unknown_selection_maps_to_user_error() {
        let err = CliError::from(OpsError::UnknownSelection { id: "nope".into() });
        assert_eq!(err.exit_code(), 1);
        let err = CliError::from(OpsError::InvalidConfig { details: "x".into() });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn describe_modes_lists_active_flags_strongest_first() {
        assert_eq!(describe_modes(ModeState::NOMINAL), "nominal");
        assert_eq!(
            describe_modes(ModeState::new(true, false, true)),
            "emergency, system_optimized"
        );
    }
}
