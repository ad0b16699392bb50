use auroraplan::formatters::OutputFormatter;
use auroraplan::maintenance::{shift_day_time, AssignmentOrder};
use auroraplan::shared::logging;
use auroraplan::{Planner, WindowRequest};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "auroraplan",
    about = "Generate an Aurora deployment template with staggered per-instance maintenance windows.",
    version = APP_VERSION,
    disable_version_flag(true)
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        help = "Path to the configuration file"
    )]
    pub config: Option<String>,

    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "shift", about = "Shift a Day:HH:MM value forward by a number of minutes")]
    Shift {
        #[arg(value_name = "DAY_TIME")]
        day_time: String,
        #[arg(value_name = "MINUTES")]
        minutes: u64,
    },

    #[command(name = "windows", about = "Print staggered maintenance windows")]
    Windows {
        #[arg(long, value_name = "WINDOW", help = "Base window, e.g. Sat:17:00-Sat:17:30")]
        base: Option<String>,
        #[arg(long, value_name = "MINUTES", help = "Minutes between consecutive windows")]
        step: Option<u32>,
        #[arg(
            long,
            value_name = "N",
            allow_negative_numbers = true,
            help = "Number of windows (defaults to the cluster's instance count)"
        )]
        count: Option<i64>,
        #[arg(long, value_name = "ORDER", help = "natural or reversed")]
        order: Option<AssignmentOrder>,
        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },

    #[command(name = "assignments", about = "Print the maintenance window of each cluster instance")]
    Assignments,

    #[command(name = "synth", about = "Render the deployment template")]
    Synth {
        #[arg(long, short = 'o', value_name = "PATH", help = "Write the template to a file")]
        output: Option<String>,
    },
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        std::process::exit(0);
    }

    let result = match &cli.command {
        Some(Commands::Shift { day_time, minutes }) => shift_day_time(day_time, *minutes)
            .map(|shifted| println!("{}", shifted))
            .map_err(anyhow::Error::from),
        Some(Commands::Windows {
            base,
            step,
            count,
            order,
            json,
        }) => {
            let request = WindowRequest {
                base: base.clone(),
                step_minutes: *step,
                count: *count,
            };
            run_windows(&cli, &request, *order, *json)
        }
        Some(Commands::Assignments) => run_assignments(&cli),
        Some(Commands::Synth { output }) => run_synth(&cli, output.as_deref()),
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    if let Err(err) = result {
        logging::error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run_windows(
    cli: &Cli,
    request: &WindowRequest,
    order: Option<AssignmentOrder>,
    json: bool,
) -> anyhow::Result<()> {
    let planner = init_planner(cli)?;
    let order = order.unwrap_or_else(|| planner.order());
    let schedule = planner.schedule_for(request)?;
    let now = chrono::Utc::now();

    if json {
        let value = OutputFormatter::format_schedule(&schedule, order, now);
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if !schedule.is_empty() {
        println!("{}", OutputFormatter::format_schedule_text(&schedule, order, now));
    }
    Ok(())
}

fn run_assignments(cli: &Cli) -> anyhow::Result<()> {
    let planner = init_planner(cli)?;
    let assignments = planner.assignments()?;
    let value = OutputFormatter::format_assignments(&assignments);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_synth(cli: &Cli, output: Option<&str>) -> anyhow::Result<()> {
    let planner = init_planner(cli)?;
    logging::info(&format!("Synthesizing stack {}", planner.stack().name));
    let template = planner.synthesize()?;
    let rendered = OutputFormatter::format_template(&template, planner.config().output.pretty)?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered + "\n")?;
            logging::info(&format!("Template written to {}", path));
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn init_planner(cli: &Cli) -> anyhow::Result<Planner> {
    logging::debug(&format!("Initializing planner with config: {:?}", cli.config));
    Planner::new(cli.config.clone())
}

fn init_logging() {
    let log_level = std::env::var("AURORAPLAN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = logging::LogLevel::from_name(&log_level).filter_directive();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("auroraplan={}", filter).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
