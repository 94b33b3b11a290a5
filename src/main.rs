use clap::{Parser, Subcommand};
use ticklist::output::Format;
use ticklist::rollover::RolloverAction;
use ticklist::workspace::Workspace;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ticklist",
    version = ticklist::build_info::long_version(),
    about = "Daily to-do list with a durable task file and end-of-day rollover"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Log debug detail to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new .ticklist/ directory here
    Init,
    /// Add a task to the end of the list
    Add {
        /// What needs doing
        description: String,
        /// Tags to attach (comma-separated, repeatable)
        #[arg(long)]
        tag: Vec<String>,
        /// Priority, 1 (high) to 9
        #[arg(long, short)]
        priority: Option<u8>,
    },
    /// List tasks in order
    List {
        /// Only tasks carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only completed tasks
        #[arg(long, conflicts_with = "pending")]
        completed: bool,
        /// Only pending tasks
        #[arg(long, conflicts_with = "completed")]
        pending: bool,
        /// List archived tasks from the history log instead
        #[arg(long)]
        history: bool,
    },
    /// Display a single task
    Show {
        /// Task position
        position: usize,
    },
    /// Mark a task done, or pending again if it already is
    Toggle {
        /// Task position
        position: usize,
    },
    /// Replace a task's description
    Edit {
        /// Task position
        position: usize,
        /// New description
        description: String,
    },
    /// Remove a task by position or by description
    Rm {
        /// Task position
        #[arg(required_unless_present = "matching", conflicts_with = "matching")]
        position: Option<usize>,
        /// Remove the first task with this exact description
        #[arg(long)]
        matching: Option<String>,
    },
    /// Move a task to another position
    Mv {
        /// Current position
        from: usize,
        /// New position
        to: usize,
    },
    /// Remove all completed tasks
    Clear,
    /// Archive completed tasks to the history log and remove them
    Finalize,
    /// Show the completion percentage
    Progress,
    /// Show what was completed today
    Summary,
    /// Run the daily rollover in the foreground until interrupted
    Watch {
        /// Time of day to roll over (HH:MM), overriding config
        #[arg(long)]
        at: Option<String>,
        /// What to do at rollover, overriding config
        #[arg(long, value_enum)]
        action: Option<RolloverAction>,
    },
}

fn run(cli: Cli, format: Format) -> ticklist::Result<()> {
    let cwd = std::env::current_dir()?;
    if let Commands::Init = cli.command {
        return ticklist::commands::init::run(&cwd);
    }

    let root = Workspace::discover(&cwd)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Add {
            description,
            tag,
            priority,
        } => ticklist::commands::add::run(&root, description, tag, priority, format),
        Commands::List {
            tag,
            completed,
            pending,
            history,
        } => ticklist::commands::list::run(&root, tag, completed, pending, history, format),
        Commands::Show { position } => ticklist::commands::show::run(&root, position, format),
        Commands::Toggle { position } => {
            ticklist::commands::lifecycle::toggle(&root, position, format)
        }
        Commands::Edit {
            position,
            description,
        } => ticklist::commands::edit::run(&root, position, description, format),
        Commands::Rm { position, matching } => {
            ticklist::commands::remove::run(&root, position, matching, format)
        }
        Commands::Mv { from, to } => ticklist::commands::reorder::run(&root, from, to, format),
        Commands::Clear => ticklist::commands::lifecycle::clear(&root, format),
        Commands::Finalize => ticklist::commands::lifecycle::finalize(&root, format),
        Commands::Progress => ticklist::commands::progress::run(&root, format),
        Commands::Summary => ticklist::commands::summary::run(&root, format),
        Commands::Watch { at, action } => {
            ticklist::commands::watch::run(&root, at, action, format)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ticklist=debug" } else { "ticklist=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
