// crates/stats-gate-cli/src/main.rs
// ============================================================================
// Module: Stats Gate CLI Entry Point
// Description: Command dispatcher for offline stats gate evaluation.
// Purpose: Inspect policy decisions and validate configuration without a service.
// Dependencies: clap, serde, serde_jcs, stats-gate-config, stats-gate-core, thiserror.
// ============================================================================

//! ## Overview
//! The `stats-gate` CLI evaluates authorization decisions against a configured
//! policy, lists the gated operations with their effective requirements, and
//! validates configuration files. Output is canonical JSON so results can be
//! diffed and hashed. Inputs are untrusted and validated before use.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use stats_gate_config::ConfigError;
use stats_gate_config::OneWayDenial;
use stats_gate_config::StatsGateConfig;
use stats_gate_core::CallMode;
use stats_gate_core::CallerIdentity;
use stats_gate_core::Denial;
use stats_gate_core::DenialCause;
use stats_gate_core::GatePolicy;
use stats_gate_core::OperationKind;
use stats_gate_core::Permission;
use stats_gate_core::PolicyProfile;
use stats_gate_core::PrincipalId;
use stats_gate_core::RequiredCapability;
use stats_gate_core::StatsOperation;
use stats_gate_core::authorize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit code returned by `check` when the call is denied.
const DENIED_EXIT_CODE: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "stats-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate an authorization decision for one operation.
    Check(CheckCommand),
    /// List gated operations with their effective policy.
    Operations(OperationsCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a stats gate configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `check`.
#[derive(Args, Debug)]
struct CheckCommand {
    /// Operation name (for example `get_reports`).
    #[arg(long, value_name = "NAME", value_parser = parse_operation)]
    operation: StatsOperation,
    /// Caller principal id.
    #[arg(
        long,
        value_name = "UID",
        required_unless_present = "no_identity",
        conflicts_with = "no_identity"
    )]
    principal: Option<u32>,
    /// Permission held by the caller (repeatable).
    #[arg(long = "permission", value_name = "NAME", conflicts_with = "no_identity")]
    permissions: Vec<String>,
    /// Evaluate the call with no caller identity.
    #[arg(long, action = ArgAction::SetTrue)]
    no_identity: bool,
    /// Optional config file path (defaults to stats-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `operations`.
#[derive(Args, Debug)]
struct OperationsCommand {
    /// Optional config file path (defaults to stats-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to stats-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Decision report printed by `check`.
#[derive(Debug, Serialize)]
struct CheckReport {
    /// Evaluated operation.
    operation: StatsOperation,
    /// Caller principal, absent when evaluated without identity.
    principal: Option<PrincipalId>,
    /// Whether the call may proceed.
    permitted: bool,
    /// Denial details when refused.
    denial: Option<Denial>,
    /// Call mode of the operation.
    call_mode: CallMode,
    /// Whether the service would return the denial to the caller.
    surfaced: bool,
}

/// Operation table printed by `operations`.
#[derive(Debug, Serialize)]
struct OperationsReport {
    /// Active denial profile.
    profile: PolicyProfile,
    /// One-way denial surfacing mode.
    one_way_denial: OneWayDenial,
    /// Per-operation entries in canonical order.
    operations: Vec<OperationEntry>,
}

/// Single row of the operation table.
#[derive(Debug, Serialize)]
struct OperationEntry {
    /// Operation name.
    operation: StatsOperation,
    /// Capability required by the operation.
    capability: RequiredCapability,
    /// Permission name bound to the capability.
    permission: Permission,
    /// Operation classification.
    kind: OperationKind,
    /// Call mode.
    call_mode: CallMode,
    /// Cause reported when the operation is denied.
    denial_cause: DenialCause,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::new(format!("failed to load config: {error}"))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("stats-gate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Check(command) => command_check(&command),
        Commands::Operations(command) => command_operations(&command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Check Command
// ============================================================================

/// Executes `check`.
fn command_check(command: &CheckCommand) -> CliResult<ExitCode> {
    let config = StatsGateConfig::load(command.config.as_deref())?;
    let policy = config.gate.gate_policy()?;
    let identity = command.principal.map(|principal| {
        command
            .permissions
            .iter()
            .fold(CallerIdentity::new(PrincipalId::new(principal)), |identity, permission| {
                identity.with_permission(permission.as_str())
            })
    });
    let report =
        check_report(&policy, config.gate.one_way_denial, identity.as_ref(), command.operation);
    write_canonical_json(&report)?;
    Ok(ExitCode::from(exit_code_for(&report)))
}

/// Evaluates the gate and describes how the service would surface the result.
fn check_report(
    policy: &GatePolicy,
    one_way_denial: OneWayDenial,
    identity: Option<&CallerIdentity>,
    operation: StatsOperation,
) -> CheckReport {
    let result = authorize(policy, identity, operation);
    let call_mode = operation.call_mode();
    let denial = result.denial().cloned();
    let surfaced = denial.is_some()
        && !(call_mode == CallMode::OneWay && one_way_denial == OneWayDenial::Silent);
    CheckReport {
        operation,
        principal: identity.map(|identity| identity.principal),
        permitted: result.is_permitted(),
        denial,
        call_mode,
        surfaced,
    }
}

/// Maps a decision report to the process exit code.
const fn exit_code_for(report: &CheckReport) -> u8 {
    if report.permitted { 0 } else { DENIED_EXIT_CODE }
}

// ============================================================================
// SECTION: Operations Command
// ============================================================================

/// Executes `operations`.
fn command_operations(command: &OperationsCommand) -> CliResult<ExitCode> {
    let config = StatsGateConfig::load(command.config.as_deref())?;
    let policy = config.gate.gate_policy()?;
    let report = OperationsReport {
        profile: config.gate.profile,
        one_way_denial: config.gate.one_way_denial,
        operations: operation_entries(&policy),
    };
    write_canonical_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Builds the operation table for a policy.
fn operation_entries(policy: &GatePolicy) -> Vec<OperationEntry> {
    StatsOperation::all()
        .iter()
        .map(|operation| OperationEntry {
            operation: *operation,
            capability: operation.required_capability(),
            permission: policy.required_permission(*operation).clone(),
            kind: operation.kind(),
            call_mode: operation.call_mode(),
            denial_cause: policy.denial.cause_for(*operation),
        })
        .collect()
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    StatsGateConfig::load(command.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses an operation name for clap.
fn parse_operation(name: &str) -> Result<StatsOperation, String> {
    StatsOperation::parse(name).ok_or_else(|| {
        let known: Vec<&str> =
            StatsOperation::all().iter().map(|operation| operation.as_str()).collect();
        format!("unknown operation '{name}' (expected one of: {})", known.join(", "))
    })
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Serializes a value as canonical JSON.
fn canonical_json_bytes<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))
}

/// Writes canonical JSON to stdout followed by a newline.
fn write_canonical_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = canonical_json_bytes(value)?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
