use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use shipline::audit::AuditLog;
use shipline::format::OutputFormat;
use shipline::orchestrator::{
    AbortArgs, CleanupArgs, CommitArgs, HotfixArgs, LaunchArgs, ShipArgs, SwapArgs,
};
use shipline::result::ToolResult;
use shipline::{
    BranchName, CancelToken, Orchestrator, SessionStore, ShiplineConfig, WorkflowError,
};
use shipline_forge::GhForge;
use shipline_git::GixGit;

/// Linear-history Git workflow orchestrator
///
/// shipline drives a feature branch from creation through squash-merge as
/// one deterministic state machine: launch cuts the branch, commit records
/// work, ship pushes, opens the PR, waits for CI, squash-merges, and
/// cleans up — leaving main's history a single straight line.
///
/// QUICK START:
///
///   shipline init                 # once per repository
///   shipline launch -d "add auth" # cut feature/add-auth from main
///   ...edit files...
///   shipline commit
///   shipline ship                 # push → PR → CI → squash-merge → cleanup
///
/// Every command prints what it checked and what to do next. State lives
/// in .shipline/ next to your .git directory.
#[derive(Parser)]
#[command(name = "shipline")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'shipline <command> --help' for details on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text, json, pretty)
    #[arg(long, global = true, value_name = "FORMAT")]
    format: Option<String>,

    /// Overall operation timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize shipline in the current repository
    ///
    /// Creates .shipline/ with a commented config.yaml. Safe to inspect,
    /// refuses to overwrite an existing config.
    Init,

    /// Start a feature workflow on a fresh branch from main
    Launch(LaunchCmd),

    /// Stage and commit changes on the session branch
    Commit(CommitCmd),

    /// Push, open the PR, wait for CI, squash-merge, and clean up
    Ship(ShipCmd),

    /// Abandon a workflow and return to main
    ///
    /// The session is marked aborted; an open PR on the forge is left
    /// untouched.
    Abort(AbortCmd),

    /// Switch to another active workflow branch
    Swap(SwapCmd),

    /// Sweep finished branches, old sessions, stale locks, and audit files
    Cleanup(CleanupCmd),

    /// Start or advance an emergency hotfix workflow
    Hotfix(HotfixCmd),

    /// Show the current branch, session, and suggested next step
    Status,

    /// List workflow sessions
    Sessions(SessionsCmd),
}

#[derive(Args)]
struct LaunchCmd {
    /// Branch to create (derived from --description when omitted)
    #[arg(long, short = 'b')]
    branch: Option<String>,
    /// What this feature is about
    #[arg(long, short = 'd')]
    description: Option<String>,
    /// Demote pre-flight errors (dirty tree, stale main) to warnings
    #[arg(long)]
    force: bool,
    /// Apply this stash onto the fresh branch
    #[arg(long, value_name = "STASH")]
    stash_ref: Option<String>,
}

#[derive(Args)]
struct CommitCmd {
    /// Commit message (defaults from the session description)
    #[arg(long, short = 'm')]
    message: Option<String>,
    /// Commit only what is already staged
    #[arg(long)]
    staged_only: bool,
}

#[derive(Args)]
struct ShipCmd {
    /// Pull request body
    #[arg(long, short = 'd')]
    pr_description: Option<String>,
    /// Demote pre-flight errors to warnings
    #[arg(long)]
    force: bool,
    /// Skip confirmations
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args)]
struct AbortCmd {
    /// Branch whose session to abort (defaults to the current branch)
    #[arg(long, short = 'b')]
    branch: Option<String>,
    /// Also delete the branch locally (and remotely when pushed)
    #[arg(long)]
    delete_branch: bool,
    /// Abort even with a dirty tree, discarding the changes
    #[arg(long)]
    force: bool,
    /// Stash uncommitted changes instead of refusing
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args)]
struct SwapCmd {
    /// Branch to switch to
    branch: String,
    /// Switch even with a dirty tree, discarding the changes
    #[arg(long)]
    force: bool,
    /// Stash uncommitted changes before switching
    #[arg(long)]
    stash: bool,
}

#[derive(Args)]
struct CleanupCmd {
    /// Report candidates without deleting anything
    #[arg(long)]
    dry_run: bool,
    /// Actually delete the eligible items
    #[arg(long, short = 'y')]
    yes: bool,
    /// Age threshold in days (defaults to the session TTL)
    #[arg(long)]
    days: Option<i64>,
}

#[derive(Args)]
struct HotfixCmd {
    /// Branch to create (derived from --description when omitted)
    #[arg(long, short = 'b')]
    branch: Option<String>,
    /// What broke
    #[arg(long, short = 'd')]
    description: Option<String>,
    /// Demote pre-flight errors to warnings
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct SessionsCmd {
    /// Include completed and aborted sessions
    #[arg(long, short = 'a')]
    all: bool,
}

fn main() {
    shipline::telemetry::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            e.downcast_ref::<WorkflowError>()
                .map_or(1, WorkflowError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let format = OutputFormat::resolve(
        cli.format
            .as_deref()
            .map(|s| s.parse::<OutputFormat>())
            .transpose()?,
    );

    let root = repo_root()?;
    let state_dir = ShiplineConfig::state_dir(&root);

    if matches!(cli.command, Commands::Init) {
        let path = ShiplineConfig::write_default(&state_dir)
            .map_err(anyhow::Error::from)
            .context("could not initialize shipline")?;
        println!("Initialized shipline.");
        println!();
        println!("  Config:  {}", path.display());
        println!("  State:   {}", state_dir.display());
        println!();
        println!("Next: review the config, then start a feature:");
        println!();
        println!("  shipline launch --description \"what you are building\"");
        ensure_gitignored(&root)?;
        return Ok(0);
    }

    let config = ShiplineConfig::load(&state_dir)?;
    let store = SessionStore::open(&state_dir)?;
    let audit = AuditLog::open(&state_dir)?;
    let git = GixGit::open(&root)
        .map_err(WorkflowError::Git)?
        .with_remote(config.repo.remote.clone());
    let forge = GhForge::new(&root).with_call_timeout(config.forge.call_timeout());
    let orchestrator = Orchestrator::new(Box::new(git), Box::new(forge), store, audit, config);

    let cancel = cli.timeout.map_or_else(CancelToken::new, |secs| {
        CancelToken::with_deadline(Duration::from_secs(secs))
    });

    let result: ToolResult = match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Launch(cmd) => ToolResult::Session(orchestrator.launch(
            &LaunchArgs {
                branch_name: cmd.branch.as_deref().map(parse_branch).transpose()?,
                description: cmd.description,
                force: cmd.force,
                stash_ref: cmd.stash_ref,
            },
            &cancel,
        )?),
        Commands::Commit(cmd) => ToolResult::Session(orchestrator.commit(
            &CommitArgs {
                message: cmd.message,
                staged_only: cmd.staged_only,
            },
            &cancel,
        )?),
        Commands::Ship(cmd) => ToolResult::Forge(orchestrator.ship(
            &ShipArgs {
                pr_description: cmd.pr_description,
                force: cmd.force,
                yes: cmd.yes,
            },
            &cancel,
        )?),
        Commands::Abort(cmd) => ToolResult::Session(orchestrator.abort(
            &AbortArgs {
                branch_name: cmd.branch.as_deref().map(parse_branch).transpose()?,
                delete_branch: cmd.delete_branch,
                force: cmd.force,
                yes: cmd.yes,
            },
            &cancel,
        )?),
        Commands::Swap(cmd) => ToolResult::Session(orchestrator.swap(
            &SwapArgs {
                branch_name: Some(parse_branch(&cmd.branch)?),
                force: cmd.force,
                stash: cmd.stash,
            },
            &cancel,
        )?),
        Commands::Cleanup(cmd) => ToolResult::Session(orchestrator.cleanup(
            &CleanupArgs {
                dry_run: cmd.dry_run,
                yes: cmd.yes,
                days: cmd.days,
            },
            &cancel,
        )?),
        Commands::Hotfix(cmd) => ToolResult::Session(orchestrator.hotfix(
            &HotfixArgs {
                branch_name: cmd.branch.as_deref().map(parse_branch).transpose()?,
                description: cmd.description,
                force: cmd.force,
            },
            &cancel,
        )?),
        Commands::Status => ToolResult::Query(orchestrator.status()?),
        Commands::Sessions(cmd) => ToolResult::Query(orchestrator.sessions(cmd.all)?),
    };

    print_result(&result, format)?;
    Ok(result.exit_code())
}

fn parse_branch(raw: &str) -> Result<BranchName> {
    BranchName::new(raw).map_err(|e| anyhow::Error::from(WorkflowError::from(e)))
}

/// Locate the repository root via `git rev-parse --show-toplevel`.
fn repo_root() -> Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .context("failed to run git; is it installed?")?;
    if !output.status.success() {
        bail!("not inside a git repository");
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    Ok(PathBuf::from(path))
}

/// Make sure `.shipline/` is ignored so workflow state never lands in a
/// commit.
fn ensure_gitignored(root: &std::path::Path) -> Result<()> {
    let path = root.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.lines().any(|line| line.trim() == ".shipline/") {
        return Ok(());
    }
    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(".shipline/\n");
    std::fs::write(&path, updated).context("could not update .gitignore")?;
    println!("Added .shipline/ to .gitignore");
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_result(result: &ToolResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => print_human(result, format),
    }
    Ok(())
}

fn print_human(result: &ToolResult, format: OutputFormat) {
    let verbose = format == OutputFormat::Pretty;
    match result {
        ToolResult::Session(r) => {
            print_outcome_line(r.success, r.branch_name.as_deref(), r.state.map(|s| s.as_str()));
            if verbose {
                print_checks("pre-flight", &r.pre_flight_checks);
                print_checks("post-flight", &r.post_flight_verifications);
            }
            print_lines("error", &r.errors);
            print_lines("warning", &r.warnings);
            print_next_steps(&r.next_steps);
        }
        ToolResult::Forge(r) => {
            print_outcome_line(r.success, r.branch_name.as_deref(), r.state.map(|s| s.as_str()));
            if let (Some(number), Some(url)) = (r.pr_number, r.pr_url.as_deref()) {
                println!("  PR #{number}  {url}");
            }
            if let Some(checks) = &r.checks {
                println!("  checks: {}", checks.summary());
            }
            if verbose {
                print_checks("pre-flight", &r.pre_flight_checks);
                print_checks("post-flight", &r.post_flight_verifications);
            }
            print_lines("error", &r.errors);
            print_lines("warning", &r.warnings);
            print_next_steps(&r.next_steps);
        }
        ToolResult::Query(r) => {
            if let Some(message) = &r.message {
                println!("{message}");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&r.data).unwrap_or_else(|_| "{}".to_owned())
            );
        }
    }
}

fn print_outcome_line(success: bool, branch: Option<&str>, state: Option<&str>) {
    let marker = if success { "ok" } else { "failed" };
    match (branch, state) {
        (Some(branch), Some(state)) => println!("{marker}: {branch} ({state})"),
        (Some(branch), None) => println!("{marker}: {branch}"),
        _ => println!("{marker}"),
    }
}

fn print_checks(label: &str, checks: &[shipline::checks::CheckResult]) {
    if checks.is_empty() {
        return;
    }
    println!("  {label}:");
    for check in checks {
        let mark = if check.passed { "✓" } else { "✗" };
        println!("    {mark} {}: {}", check.name, check.message);
    }
}

fn print_lines(label: &str, lines: &[String]) {
    for line in lines {
        for (i, part) in line.lines().enumerate() {
            if i == 0 {
                println!("  {label}: {part}");
            } else {
                println!("    {part}");
            }
        }
    }
}

fn print_next_steps(steps: &[String]) {
    if steps.is_empty() {
        return;
    }
    println!("  next:");
    for step in steps {
        println!("    - {step}");
    }
}
