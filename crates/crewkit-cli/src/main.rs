mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::hook::HookEventArg;
use cmd::stats::StatsView;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "crewkit",
    about = "Durable session context and parallel crew orchestration for AI coding agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .crew-config.json or .git/)
    #[arg(long, global = true, env = "CREWKIT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a crew config template into the project root
    Init,

    /// Provision worktrees and print the team launch prompt
    Start {
        /// Profile to launch (default: config's default, then first profile)
        profile: Option<String>,

        /// Ignore saved team state and start from scratch
        #[arg(long)]
        fresh: bool,

        /// Launch only one crew within the profile
        #[arg(long)]
        crew: Option<String>,
    },

    /// Mark a team stopped; optionally remove its worktrees
    Stop {
        profile: Option<String>,

        /// Also remove every worktree of the profile
        #[arg(long)]
        cleanup: bool,
    },

    /// Show team state for one profile (or all)
    Status { profile: Option<String> },

    /// Classify teammate liveness and print recommendations
    Doctor { profile: Option<String> },

    /// Dry-run every teammate branch against main
    MergePreview { profile: Option<String> },

    /// Merge teammate branches into main (clean first, backup tagged)
    Merge {
        profile: Option<String>,

        /// Run this command after each merge; roll the merge back if it fails
        #[arg(long, value_name = "CMD")]
        test: Option<String>,

        /// Skip the crew-backup tag on main
        #[arg(long)]
        no_backup: bool,
    },

    /// Remove orphaned worktrees across all projects
    Gc {
        /// Also delete the orphaned branches
        #[arg(long)]
        delete_branches: bool,

        /// Actually remove (without this, gc only reports)
        #[arg(long)]
        force: bool,
    },

    /// Delete context records older than N days
    Prune {
        /// Retention in days
        #[arg(default_value_t = 30)]
        days: u32,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Read-only aggregations over the context store
    Stats {
        #[arg(value_enum)]
        view: StatsView,

        /// View argument (branch name, or top-K limit)
        arg: Option<String>,
    },

    /// Run a host-agent hook (reads one JSON event from stdin)
    Hook {
        #[arg(value_enum)]
        event: HookEventArg,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = root::resolve_root(cli.root.as_deref());

    // Hooks own their exit-code contract (always 0) and their stdout.
    if let Commands::Hook { event } = &cli.command {
        std::process::exit(cmd::hook::run(*event));
    }

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Start {
            profile,
            fresh,
            crew,
        } => cmd::start::run(&root, profile.as_deref(), crew.as_deref(), fresh, cli.json),
        Commands::Stop { profile, cleanup } => {
            cmd::stop::run(&root, profile.as_deref(), cleanup, cli.json)
        }
        Commands::Status { profile } => cmd::status::run(&root, profile.as_deref(), cli.json),
        Commands::Doctor { profile } => cmd::doctor::run(&root, profile.as_deref(), cli.json),
        Commands::MergePreview { profile } => {
            cmd::merge::preview(&root, profile.as_deref(), cli.json)
        }
        Commands::Merge {
            profile,
            test,
            no_backup,
        } => cmd::merge::execute(&root, profile.as_deref(), test.as_deref(), no_backup, cli.json),
        Commands::Gc {
            delete_branches,
            force,
        } => cmd::gc::run(delete_branches, force, cli.json),
        Commands::Prune { days, dry_run } => cmd::prune::run(days, dry_run, cli.json),
        Commands::Stats { view, arg } => cmd::stats::run(view, arg.as_deref(), cli.json),
        Commands::Hook { .. } => unreachable!("handled above"),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
