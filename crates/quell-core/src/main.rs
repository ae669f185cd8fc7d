//! quell - process identity and lifecycle CLI
//!
//! The main entry point, handling:
//! - Listing processes (sorted or as a tree, optionally filtered by port)
//! - Kill (by PID list or by name), suspend and resume with locally tracked
//!   pauses
//! - Per-process connection listing
//! - Periodic polling (`watch`)

use clap::{Args, Parser, Subcommand};
use quell_common::{
    format_error_human, Error, OutputFormat, ProcessId, ProcessIdentity, StructuredError,
    SCHEMA_VERSION,
};
use quell_core::config::{load_config, ConfigOptions, ResolvedConfig};
use quell_core::driver::PollDriver;
use quell_core::exit_codes::ExitCode;
use quell_core::lifecycle::{KillReport, LifecycleService};
use quell_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use quell_core::output;
use quell_core::privilege::{is_privileged, Privilege};
use quell_core::sort::{sort_processes, SortKey};
use quell_core::source::LinuxSource;
use quell_core::state::{PausedDelta, PersistedState, StateStore};
use quell_core::tree::build_tree;
use serde_json::json;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Inspect processes and pause, resume or kill them safely across PID reuse
#[derive(Parser)]
#[command(name = "quell")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Override config directory
    #[arg(long, global = true, env = "QUELL_CONFIG_DIR")]
    config: Option<PathBuf>,

    /// Override the persisted state file
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "table")]
    format: OutputFormat,

    /// Log level (overrides QUELL_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (overrides QUELL_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll once and list processes
    List(ListArgs),

    /// Terminate processes (SIGTERM, or SIGKILL with --force)
    Kill(KillArgs),

    /// Stop a process (SIGSTOP) and remember it as paused
    Suspend { pid: u32 },

    /// Continue a stopped process (SIGCONT)
    Resume { pid: u32 },

    /// Show TCP connections owned by a process
    Conns { pid: u32 },

    /// Poll periodically and print one summary per update
    Watch(WatchArgs),

    /// Show processes paused through quell that are still running
    Paused,

    /// Print version information
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::List(_) => "list",
            Commands::Kill(_) => "kill",
            Commands::Suspend { .. } => "suspend",
            Commands::Resume { .. } => "resume",
            Commands::Conns { .. } => "conns",
            Commands::Watch(_) => "watch",
            Commands::Paused => "paused",
            Commands::Version => "version",
        }
    }
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Ordering (remembered for later runs)
    #[arg(long, short = 's')]
    sort: Option<SortKey>,

    /// Show the parent/child tree (remembered for later runs)
    #[arg(long, conflicts_with = "flat")]
    tree: bool,

    /// Show a flat sorted list (remembered for later runs)
    #[arg(long)]
    flat: bool,

    /// Only processes listening on this TCP port
    #[arg(long, short = 'p')]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct KillArgs {
    /// Process IDs to terminate
    #[arg(required_unless_present = "name", conflicts_with = "name")]
    pids: Vec<u32>,

    /// Terminate every process whose name contains this text (case-insensitive)
    #[arg(long, short = 'n')]
    name: Option<String>,

    /// Send SIGKILL instead of SIGTERM
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Milliseconds between polls (defaults to the configured interval)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many updates
    #[arg(long, short = 'n')]
    count: Option<u64>,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_env(
        cli.global.log_level,
        cli.global.log_format,
    ));

    let ctx = LogContext::new(generate_run_id(), get_host_id());
    let span = tracing::info_span!("run", run_id = %ctx.run_id);
    let _guard = span.enter();
    info!(
        target: event_names::RUN_STARTED,
        stage = %Stage::Init,
        host_id = %ctx.host_id,
        command = cli.command.name(),
        "run started"
    );

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&cli.global, &err);
            ExitCode::from_error(&err)
        }
    };

    info!(
        target: event_names::RUN_FINISHED,
        exit_code = exit_code.as_i32(),
        "run finished"
    );
    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    let global = &cli.global;
    match &cli.command {
        Commands::Version => {
            print_version(global);
            Ok(ExitCode::Clean)
        }
        Commands::List(args) => run_list(global, args),
        Commands::Kill(args) => run_kill(global, args),
        Commands::Suspend { pid } => {
            let mut session = Session::open(global)?;
            session.reconcile();
            let result = session.service.suspend(ProcessId(*pid));
            session.persist()?;
            result?;
            print_action(global, "suspend", *pid);
            Ok(ExitCode::Clean)
        }
        Commands::Resume { pid } => {
            let mut session = Session::open(global)?;
            session.reconcile();
            let result = session.service.resume(ProcessId(*pid));
            session.persist()?;
            result?;
            print_action(global, "resume", *pid);
            Ok(ExitCode::Clean)
        }
        Commands::Conns { pid } => run_conns(global, *pid),
        Commands::Watch(args) => run_watch(global, args),
        Commands::Paused => run_paused(global),
    }
}

// ============================================================================
// Session: config + persisted state + service
// ============================================================================

struct Session {
    resolved: ResolvedConfig,
    store: StateStore,
    /// State as last read or written. Its paused list is the baseline this
    /// run's changes are measured against.
    persisted: PersistedState,
    /// View choices made by this run; only these overwrite the file.
    sort_choice: Option<SortKey>,
    tree_choice: Option<bool>,
    service: Arc<LifecycleService<LinuxSource>>,
}

impl Session {
    fn open(global: &GlobalOpts) -> Result<Self, Error> {
        let resolved = load_config(&ConfigOptions {
            config_dir: global.config.clone(),
            state_file: global.state_file.clone(),
        })?;

        let store = StateStore::new(&resolved.state_path);
        // A damaged state file must not block process control; it is
        // rewritten on the next save.
        let persisted = store.load().unwrap_or_else(|e| {
            warn!(
                target: event_names::CONFIG_ERROR,
                stage = %Stage::Persist,
                error = %e,
                "ignoring unreadable state file"
            );
            PersistedState::default()
        });

        let service = Arc::new(LifecycleService::new(LinuxSource::new()?));
        service.restore_paused(persisted.paused.iter().copied());

        Ok(Session {
            resolved,
            store,
            persisted,
            sort_choice: None,
            tree_choice: None,
            service,
        })
    }

    /// Poll once so stale paused entries are dropped before acting.
    fn reconcile(&self) {
        if let Err(e) = self.service.poll() {
            warn!(error = %e, "pre-action poll failed; paused set not reconciled");
        }
    }

    fn sort(&self) -> SortKey {
        self.sort_choice
            .or(self.persisted.sort)
            .unwrap_or(self.resolved.config.default_sort)
    }

    fn tree_mode(&self) -> bool {
        self.tree_choice
            .or(self.persisted.tree_mode)
            .unwrap_or(self.resolved.config.tree_mode)
    }

    /// Merge this run's paused-set changes and view choices into whatever
    /// is on disk now.
    fn persist(&mut self) -> Result<(), Error> {
        let current: Vec<ProcessIdentity> = self.service.paused_processes();
        let delta = PausedDelta::between(&self.persisted.paused, &current);
        let (sort, tree_mode) = (self.sort_choice, self.tree_choice);

        let mut saved = self.store.update(|state| {
            state.paused = delta.apply(&state.paused);
            if sort.is_some() {
                state.sort = sort;
            }
            if tree_mode.is_some() {
                state.tree_mode = tree_mode;
            }
        })?;
        saved.paused = current;
        self.persisted = saved;
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_list(global: &GlobalOpts, args: &ListArgs) -> Result<ExitCode, Error> {
    let mut session = Session::open(global)?;

    if let Some(sort) = args.sort {
        session.sort_choice = Some(sort);
    }
    if args.tree || args.flat {
        session.tree_choice = Some(args.tree);
    }
    let sort = session.sort();
    let tree = session.tree_mode();

    let mut processes = session.service.poll()?;
    session.persist()?;

    if let Some(port) = args.port {
        processes.retain(|p| p.listens_on(port));
    }
    let processes = if tree {
        build_tree(processes)
    } else {
        sort_processes(&mut processes, sort.sorter());
        processes
    };

    let privilege = Privilege::detect();
    match global.format {
        OutputFormat::Json => {
            let payload = output::envelope(
                "list",
                json!({
                    "privilege": privilege,
                    "sort": sort,
                    "tree": tree,
                    "count": processes.len(),
                    "processes": output::processes_json(&processes, tree),
                }),
            );
            print_json(&payload);
        }
        OutputFormat::Table => {
            print!(
                "{}",
                output::render_process_table(&processes, &privilege, sort.sorter().name(), tree)
            );
        }
    }

    if args.port.is_some() && processes.is_empty() {
        return Ok(ExitCode::NoMatch);
    }
    Ok(ExitCode::Clean)
}

fn run_kill(global: &GlobalOpts, args: &KillArgs) -> Result<ExitCode, Error> {
    let mut session = Session::open(global)?;
    let result = match &args.name {
        Some(pattern) => session.service.kill_matching(pattern, args.force),
        None => {
            session.reconcile();
            let pids: Vec<ProcessId> = args.pids.iter().copied().map(ProcessId).collect();
            Ok(session.service.kill_all(&pids, args.force))
        }
    };
    session.persist()?;
    let report = result?;

    let action = if args.force { "kill" } else { "terminate" };
    if report.is_empty() {
        let pattern = args.name.as_deref().unwrap_or_default();
        match global.format {
            OutputFormat::Json => print_json(&output::envelope(
                action,
                json!({ "name": pattern, "killed": [], "failed": [] }),
            )),
            OutputFormat::Table => println!("no processes found matching '{}'", pattern),
        }
        return Ok(ExitCode::NoMatch);
    }

    if report.attempted() == 1 {
        if let Some(&pid) = report.killed.first() {
            print_action(global, action, pid.0);
        }
    } else {
        print_kill_report(global, action, &report);
    }
    if report.killed.is_empty() {
        // Nothing was killed: surface the first failure's own exit code.
        return match report.failed.into_iter().next() {
            Some((_, err)) => Err(err.into()),
            None => Ok(ExitCode::Clean),
        };
    }
    if report.failed.is_empty() {
        Ok(ExitCode::Clean)
    } else {
        Ok(ExitCode::PartialFail)
    }
}

fn run_conns(global: &GlobalOpts, pid: u32) -> Result<ExitCode, Error> {
    let source = LinuxSource::new()?;
    let service = LifecycleService::new(source);
    let connections = service.connections(ProcessId(pid));

    match global.format {
        OutputFormat::Json => print_json(&output::envelope(
            "conns",
            json!({ "pid": pid, "connections": connections }),
        )),
        OutputFormat::Table => print!("{}", output::render_connections_table(pid, &connections)),
    }
    Ok(ExitCode::Clean)
}

fn run_watch(global: &GlobalOpts, args: &WatchArgs) -> Result<ExitCode, Error> {
    let mut session = Session::open(global)?;
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| session.resolved.config.poll_interval());

    let driver = PollDriver::spawn(Arc::clone(&session.service), interval)?;
    let mut seen: u64 = 0;
    while let Some(update) = driver.recv() {
        match global.format {
            OutputFormat::Json => {
                let line = match &update {
                    quell_core::PollUpdate::Snapshot { tick, processes } => json!({
                        "tick": tick,
                        "count": processes.len(),
                        "suspended": processes.iter().filter(|p| p.is_suspended()).count(),
                    }),
                    quell_core::PollUpdate::Failed { tick, message } => json!({
                        "tick": tick,
                        "error": message,
                    }),
                };
                println!("{}", line);
            }
            OutputFormat::Table => println!("{}", output::summary_line(&update)),
        }
        seen += 1;
        if args.count.is_some_and(|n| seen >= n) {
            break;
        }
    }
    driver.stop();
    session.persist()?;
    Ok(ExitCode::Clean)
}

fn run_paused(global: &GlobalOpts) -> Result<ExitCode, Error> {
    let mut session = Session::open(global)?;
    let processes = session.service.poll()?;
    session.persist()?;
    let entries = session.service.paused_processes();

    match global.format {
        OutputFormat::Json => print_json(&output::envelope(
            "paused",
            json!({ "count": entries.len(), "paused": entries }),
        )),
        OutputFormat::Table => print!("{}", output::render_paused_table(&entries, &processes)),
    }
    Ok(ExitCode::Clean)
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn print_action(global: &GlobalOpts, action: &str, pid: u32) {
    match global.format {
        OutputFormat::Json => print_json(&output::envelope(
            action,
            json!({ "pid": pid, "ok": true }),
        )),
        OutputFormat::Table => println!("{} {}: ok", action, pid),
    }
}

fn print_kill_report(global: &GlobalOpts, action: &str, report: &KillReport) {
    match global.format {
        OutputFormat::Json => {
            let failed: Vec<serde_json::Value> = report
                .failed
                .iter()
                .map(|(pid, err)| json!({ "pid": pid, "error": err.to_string() }))
                .collect();
            print_json(&output::envelope(
                action,
                json!({
                    "count": report.killed.len(),
                    "killed": report.killed,
                    "failed": failed,
                }),
            ));
        }
        OutputFormat::Table => {
            for pid in &report.killed {
                println!("{} {}: ok", action, pid);
            }
            for (pid, err) in &report.failed {
                println!("{} {}: {}", action, pid, err);
            }
            println!("{} of {} processes: ok", report.killed.len(), report.attempted());
        }
    }
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => print_json(&output::envelope(
            "version",
            json!({ "version": version }),
        )),
        OutputFormat::Table => {
            println!("quell {}", version);
            println!("Schema version: {}", SCHEMA_VERSION);
        }
    }
}

fn report_error(global: &GlobalOpts, err: &Error) {
    let unprivileged_denial = matches!(err, Error::PermissionDenied { .. }) && !is_privileged();
    match global.format {
        OutputFormat::Json => {
            let mut structured = StructuredError::from(err);
            if unprivileged_denial {
                structured = structured.with_context("privileged", false);
            }
            eprintln!("{}", structured.to_json());
        }
        OutputFormat::Table => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
            if unprivileged_denial {
                eprintln!("  Hint: quell is not running as root; other users' processes are off limits.");
            }
        }
    }
}
