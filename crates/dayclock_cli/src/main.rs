//! `dayclock` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, load config, start logging and open the task store.
//! - Render core results as tables or JSON.
//!
//! # Invariants
//! - Without `--auto-adjust` an overflowing edit writes nothing.
//! - Exit code `2` means an edit still waits for the day to be freed up.

mod table;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use chrono::{Local, Timelike as _, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dayclock_core::config::{self, Config};
use dayclock_core::db::open_db;
use dayclock_core::{
    allocation_breakdown, current_task, init_logging, remaining_hours, sort_tasks, time_display,
    total_duration, AdjustmentReview, PendingEdit, ScheduleService, SqliteTaskRepository,
    SubmitOutcome, Task, TaskDraft, TaskId, TaskPatch, TaskSort, DAY_HOURS,
};
use log::{info, warn};

use crate::table::Table;

const EXIT_NEEDS_REVIEW: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "dayclock", version, about = "Plan a 24-hour day")]
struct Cli {
    /// Config file (defaults to $DAYCLOCK_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file, overriding the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the day
    List(ListArgs),
    /// Add a task
    Add(AddArgs),
    /// Change a task
    Edit(EditArgs),
    /// Delete a task
    #[command(alias = "rm")]
    Remove(RemoveArgs),
    /// Start or stop a task timer
    Timer(TimerArgs),
    /// Time spent per activity
    Summary(SummaryArgs),
    /// Write a default config file
    Init(InitArgs),
    /// Print the resolved config as TOML
    Config,
}

#[derive(Debug, Default, Parser)]
struct ListArgs {
    #[arg(long, value_enum, default_value_t = SortKey::Time)]
    sort: SortKey,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum SortKey {
    #[default]
    Time,
    Duration,
    Name,
}

impl From<SortKey> for TaskSort {
    fn from(value: SortKey) -> Self {
        match value {
            SortKey::Time => Self::Time,
            SortKey::Duration => Self::Duration,
            SortKey::Name => Self::Name,
        }
    }
}

#[derive(Debug, Args)]
struct AdjustArgs {
    /// Apply the proposed reductions when the day overflows
    #[arg(long)]
    auto_adjust: bool,
    /// Keep this task out of the applied reductions (repeatable)
    #[arg(long = "skip", value_name = "ID")]
    skip: Vec<TaskId>,
}

#[derive(Debug, Parser)]
struct AddArgs {
    name: String,
    /// Start as HH:MM or decimal hours
    #[arg(long, value_parser = parse_clock)]
    start: f64,
    /// Hours, in half-hour steps
    #[arg(long)]
    duration: f64,
    /// #RRGGBB from the configured palette (defaults to its first entry)
    #[arg(long)]
    color: Option<String>,
    #[command(flatten)]
    adjust: AdjustArgs,
}

#[derive(Debug, Parser)]
struct EditArgs {
    id: TaskId,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_parser = parse_clock)]
    start: Option<f64>,
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long)]
    color: Option<String>,
    #[command(flatten)]
    adjust: AdjustArgs,
}

#[derive(Debug, Parser)]
struct RemoveArgs {
    id: TaskId,
}

#[derive(Debug, Parser)]
struct TimerArgs {
    id: TaskId,
    #[arg(value_enum)]
    action: TimerAction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimerAction {
    Start,
    Stop,
}

#[derive(Debug, Parser)]
struct SummaryArgs {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct InitArgs {
    /// Overwrite an existing config file
    #[arg(short, long)]
    force: bool,
}

type Service<'conn> = ScheduleService<SqliteTaskRepository<'conn>>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };

    if let Some(Commands::Init(args)) = &cli.cmd {
        return cmd_init(&config_path, args);
    }

    let mut cfg = config::load_from(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    if let Some(db) = &cli.db {
        cfg.storage.db_path = db.to_string_lossy().into_owned();
    }

    if let Some(Commands::Config) = &cli.cmd {
        print!("{}", cfg.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    start_logging(&cfg);

    let db_path = cfg.db_path();
    let conn = open_db(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let repo = SqliteTaskRepository::try_new(&conn)?;
    let service = ScheduleService::with_palette(repo, cfg.schedule.palette.clone());
    if cfg.storage.seed_defaults {
        service.seed_defaults()?;
    }

    match cli.cmd {
        None => cmd_list(&service, &ListArgs::default()),
        Some(Commands::List(args)) => cmd_list(&service, &args),
        Some(Commands::Add(args)) => cmd_add(&service, args),
        Some(Commands::Edit(args)) => cmd_edit(&service, args),
        Some(Commands::Remove(args)) => cmd_remove(&service, &args),
        Some(Commands::Timer(args)) => cmd_timer(&service, &args),
        Some(Commands::Summary(args)) => cmd_summary(&service, &args),
        Some(Commands::Init(_) | Commands::Config) => Ok(ExitCode::SUCCESS),
    }
}

fn start_logging(cfg: &Config) {
    if !cfg.logging.enabled {
        return;
    }
    // The CLI still works without a log file.
    if let Err(err) = init_logging(&cfg.logging.level, &cfg.log_dir()) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn cmd_init(path: &std::path::Path, args: &InitArgs) -> anyhow::Result<ExitCode> {
    if path.exists() && !args.force {
        anyhow::bail!(
            "config already exists at {} - pass --force to overwrite",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, Config::default().to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(service: &Service<'_>, args: &ListArgs) -> anyhow::Result<ExitCode> {
    let mut tasks = service.list_tasks()?;
    sort_tasks(&mut tasks, args.sort.into());

    if args.json {
        let mut out = serde_json::to_string_pretty(&tasks)?;
        out.push('\n');
        print!("{out}");
        return Ok(ExitCode::SUCCESS);
    }

    let now = Local::now();
    let hour_of_day = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
    let now_id = current_task(&tasks, hour_of_day).map(|task| task.id);
    let now_ms = Utc::now().timestamp_millis();

    let mut table = Table::new(["", "ID", "NAME", "START", "END", "HOURS", "COLOR", "TIMER"]);
    for task in &tasks {
        let (start, end) = time_display(task);
        let marker = if Some(task.id) == now_id { "*" } else { "" };
        let timer = if task.is_timer_active {
            format_elapsed(task.elapsed_ms(now_ms))
        } else {
            String::new()
        };
        table.row([
            marker.to_string(),
            task.id.to_string(),
            task.name.clone(),
            start,
            end,
            format_hours(task.duration),
            task.color.clone(),
            timer,
        ]);
    }
    table.print()?;

    println!(
        "\nTotal {} of {}, {} unallocated",
        format_hours(total_duration(&tasks)),
        format_hours(DAY_HOURS),
        format_hours(remaining_hours(&tasks))
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_add(service: &Service<'_>, args: AddArgs) -> anyhow::Result<ExitCode> {
    let color = match args.color {
        Some(color) => color,
        None => service
            .palette()
            .first()
            .cloned()
            .context("configured palette is empty")?,
    };
    let edit = PendingEdit::Create(TaskDraft::new(args.name, args.start, args.duration, color));
    submit_edit(service, edit, &args.adjust)
}

fn cmd_edit(service: &Service<'_>, args: EditArgs) -> anyhow::Result<ExitCode> {
    let patch = TaskPatch {
        name: args.name,
        start_time: args.start,
        duration: args.duration,
        color: args.color,
    };
    if patch.is_empty() {
        anyhow::bail!("nothing to change - pass --name, --start, --duration or --color");
    }
    let edit = PendingEdit::Update {
        id: args.id,
        patch,
    };
    submit_edit(service, edit, &args.adjust)
}

fn cmd_remove(service: &Service<'_>, args: &RemoveArgs) -> anyhow::Result<ExitCode> {
    service.delete_task(args.id)?;
    println!("Removed task {}", args.id);
    Ok(ExitCode::SUCCESS)
}

fn cmd_timer(service: &Service<'_>, args: &TimerArgs) -> anyhow::Result<ExitCode> {
    let active = matches!(args.action, TimerAction::Start);
    let task = service.toggle_timer(args.id, active)?;
    if task.is_timer_active {
        println!("Timer started for {}", task.name);
    } else {
        println!("Timer stopped for {}", task.name);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_summary(service: &Service<'_>, args: &SummaryArgs) -> anyhow::Result<ExitCode> {
    let tasks = service.list_tasks()?;
    let slices = allocation_breakdown(&tasks);

    if args.json {
        let mut out = serde_json::to_string_pretty(&slices)?;
        out.push('\n');
        print!("{out}");
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = Table::new(["ACTIVITY", "HOURS", "SHARE", "COLOR"]);
    for slice in &slices {
        table.row([
            slice.label.clone(),
            format_hours(slice.duration),
            format!("{:.1}%", slice.percent),
            slice.color.clone(),
        ]);
    }
    table.print()?;
    Ok(ExitCode::SUCCESS)
}

fn submit_edit(
    service: &Service<'_>,
    edit: PendingEdit,
    adjust: &AdjustArgs,
) -> anyhow::Result<ExitCode> {
    let mut review = match service.submit(edit)? {
        SubmitOutcome::Committed(task) => {
            print_saved(&task);
            return Ok(ExitCode::SUCCESS);
        }
        SubmitOutcome::NeedsReview(review) => review,
    };

    for id in &adjust.skip {
        if !review.set_selected(*id, false) {
            eprintln!("warning: no proposal targets task {id}");
        }
    }
    print_review(&review)?;

    if !adjust.auto_adjust {
        println!("Nothing was saved. Re-run with --auto-adjust to apply the selected reductions.");
        return Ok(ExitCode::from(EXIT_NEEDS_REVIEW));
    }

    info!(
        "event=cli_auto_adjust module=cli status=start selected={}",
        review.proposals().iter().filter(|p| p.selected).count()
    );
    let report = service.apply(review);
    for task in &report.applied {
        println!("Adjusted {} to {}", task.name, format_hours(task.duration));
    }
    for failure in &report.failed {
        warn!(
            "event=cli_auto_adjust module=cli status=error id={}",
            failure.proposal.task_id
        );
        eprintln!(
            "warning: could not adjust {} ({:?})",
            failure.proposal.name, failure.reason
        );
    }

    match report.outcome? {
        SubmitOutcome::Committed(task) => {
            print_saved(&task);
            Ok(ExitCode::SUCCESS)
        }
        SubmitOutcome::NeedsReview(next) => {
            println!(
                "Still {} over the day. Shorten tasks manually and try again.",
                format_hours(next.overflow_hours())
            );
            Ok(ExitCode::from(EXIT_NEEDS_REVIEW))
        }
    }
}

fn print_saved(task: &Task) {
    let (start, end) = time_display(task);
    println!(
        "Saved {} [{}] {start}-{end} ({})",
        task.name,
        task.id,
        format_hours(task.duration)
    );
}

fn print_review(review: &AdjustmentReview) -> anyhow::Result<()> {
    println!(
        "This change puts the day {} over 24h. Proposed reductions:",
        format_hours(review.overflow_hours())
    );
    let mut table = Table::new(["", "ID", "NAME", "FROM", "TO"]);
    for proposal in review.proposals() {
        table.row([
            (if proposal.selected { "x" } else { " " }).to_string(),
            proposal.task_id.to_string(),
            proposal.name.clone(),
            format_hours(proposal.old_duration),
            format_hours(proposal.new_duration),
        ]);
    }
    table.print()?;
    if !review.is_resolved() {
        println!(
            "The selection frees {}; {} would still be over.",
            format_hours(review.selected_reduction()),
            format_hours(review.residual_overflow())
        );
    }
    Ok(())
}

fn parse_clock(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((hours, minutes)) => {
            let hours: u32 = hours
                .parse()
                .map_err(|_| format!("invalid hour in `{raw}`"))?;
            let minutes: u32 = minutes
                .parse()
                .map_err(|_| format!("invalid minutes in `{raw}`"))?;
            if minutes >= 60 {
                return Err(format!("minutes must be below 60 in `{raw}`"));
            }
            Ok(f64::from(hours) + f64::from(minutes) / 60.0)
        }
        None => raw
            .parse::<f64>()
            .map_err(|_| format!("expected HH:MM or hours, got `{raw}`")),
    }
}

fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{hours:.0}h")
    } else {
        format!("{hours:.1}h")
    }
}

fn format_elapsed(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
