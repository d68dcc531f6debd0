use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use common::{
    CreateMaintenance, MaintenanceSummary, RecurrenceConfig, Request, Requester, Response,
    TriggerTag,
};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Daemon socket path
    #[arg(long, default_value = common::DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

/// Routine timing knobs, shared by `create` and `preview`.
#[derive(Args, Default)]
struct RoutineArgs {
    /// Seconds after midnight the routine period starts
    #[arg(long)]
    start_offset: Option<i64>,
    /// Routine period duration in seconds
    #[arg(long)]
    duration: Option<i64>,
    /// Repeat interval; for monthly-by-weekday the week occurrence (1-5)
    #[arg(long)]
    every: Option<i64>,
    /// Weekday bitmask, Monday=1 .. Sunday=64
    #[arg(long)]
    dayofweek: Option<i64>,
    /// Day of the month, 1-31
    #[arg(long)]
    day: Option<i64>,
    /// Month bitmask, January=1 .. December=2048
    #[arg(long)]
    month: Option<i64>,
}

impl RoutineArgs {
    fn into_config(self) -> RecurrenceConfig {
        RecurrenceConfig {
            start_time: self.start_offset,
            duration: self.duration,
            every: self.every,
            dayofweek: self.dayofweek,
            day: self.day,
            month: self.month,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a maintenance window
    Create {
        /// Host name (repeatable)
        #[arg(long = "host")]
        hosts: Vec<String>,
        /// Host group name (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,
        /// Trigger tag as tag=value (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Window start, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        start: String,
        /// Window end, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        end: String,
        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,
        /// once, daily, weekly or monthly
        #[arg(short, long, default_value = "once")]
        recurrence: String,
        #[command(flatten)]
        routine: RoutineArgs,
        /// Ticket number, e.g. 100-178306
        #[arg(long)]
        ticket: Option<String>,
        /// Zabbix userid of the requester
        #[arg(long)]
        userid: Option<String>,
        /// Requester account name
        #[arg(long)]
        username: Option<String>,
    },
    /// Search hosts by wildcard term
    SearchHosts { term: String },
    /// Search host groups by wildcard term
    SearchGroups { term: String },
    /// List the most recent maintenances
    List {
        /// Write the list as CSV to a file instead of printing a table
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Validate a routine config and show what it decodes to
    Preview {
        /// daily, weekly or monthly
        #[arg(short, long)]
        recurrence: String,
        #[command(flatten)]
        routine: RoutineArgs,
    },
    /// Show the canned routine maintenance templates
    Templates,
    /// Check daemon and Zabbix connectivity
    Health,
}

fn parse_tag(s: &str) -> Result<TriggerTag> {
    let (tag, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid tag {:?}, expected tag=value", s))?;
    Ok(TriggerTag {
        tag: tag.to_string(),
        value: value.to_string(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut csv_out: Option<PathBuf> = None;

    let req = match cli.command {
        Commands::Create {
            hosts,
            groups,
            tags,
            start,
            end,
            description,
            recurrence,
            routine,
            ticket,
            userid,
            username,
        } => {
            let trigger_tags = tags
                .iter()
                .map(|t| parse_tag(t))
                .collect::<Result<Vec<_>>>()?;

            let recurrence_config = if recurrence == "once" {
                None
            } else {
                Some(routine.into_config())
            };

            let requester = if userid.is_some() || username.is_some() {
                Some(Requester {
                    userid,
                    username,
                    ..Default::default()
                })
            } else {
                None
            };

            Request::Create(CreateMaintenance {
                hosts,
                groups,
                trigger_tags,
                start_time: start,
                end_time: end,
                description,
                recurrence_type: recurrence,
                recurrence_config,
                ticket_number: ticket,
                requester,
            })
        }
        Commands::SearchHosts { term } => Request::SearchHosts { term },
        Commands::SearchGroups { term } => Request::SearchGroups { term },
        Commands::List { csv } => {
            csv_out = csv;
            Request::ListMaintenances
        }
        Commands::Preview {
            recurrence,
            routine,
        } => Request::PreviewRoutine {
            recurrence_type: recurrence,
            config: routine.into_config(),
        },
        Commands::Templates => Request::Templates,
        Commands::Health => Request::Health,
    };

    let mut stream = UnixStream::connect(&cli.socket)
        .await
        .with_context(|| format!("Failed to connect to daemon at {:?}", cli.socket))?;

    stream.write_all(&serde_json::to_vec(&req)?).await?;

    let mut buf = vec![0; 256 * 1024];
    let n = stream.read(&mut buf).await?;
    let resp: Response =
        serde_json::from_slice(&buf[0..n]).context("Invalid response from daemon")?;

    match resp {
        Response::Error(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Response::Created(info) => {
            println!("{}", info.message);
            println!();
            println!("Maintenance ID: {}", info.maintenance_id);
            if !info.missing_hosts.is_empty() {
                println!("Hosts not found: {}", info.missing_hosts.join(", "));
            }
            if !info.missing_groups.is_empty() {
                println!("Groups not found: {}", info.missing_groups.join(", "));
            }
        }
        Response::Targets(targets) => {
            let mut table = Table::new();
            table.set_header(vec!["ID", "Name"]);
            for t in &targets {
                table.add_row(vec![t.id.as_str(), t.name.as_str()]);
            }
            println!("{table}");
            println!("{} result(s)", targets.len());
        }
        Response::MaintenanceList(list) => {
            if let Some(path) = csv_out {
                export_csv(&path, &list)?;
                println!("Exported {} maintenance(s) to {:?}", list.len(), path);
            } else {
                let mut table = Table::new();
                table.set_header(vec!["ID", "Name", "Since", "Till", "Type", "Ticket"]);
                for m in &list {
                    table.add_row(vec![
                        m.maintenance_id.as_str(),
                        m.name.as_str(),
                        m.active_since.as_str(),
                        m.active_till.as_str(),
                        m.routine_type.as_str(),
                        m.ticket_number.as_str(),
                    ]);
                }
                println!("{table}");
            }
        }
        Response::Preview {
            valid,
            details,
            message,
        } => {
            println!("{}", message);
            for line in details {
                println!("  {}", line);
            }
            if !valid {
                std::process::exit(1);
            }
        }
        Response::Templates(templates) => {
            for t in &templates {
                println!("{} ({})", t.name, t.kind);
                println!("  {}", t.description);
                for example in &t.examples {
                    println!("  - {}", example);
                }
                println!();
            }
        }
        Response::Health(health) => {
            println!("Status:           {}", health.status);
            println!("Zabbix connected: {}", health.zabbix_connected);
            println!("Daemon version:   {}", health.version);
        }
    }

    Ok(())
}

fn export_csv(path: &PathBuf, list: &[MaintenanceSummary]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    writer.write_record([
        "maintenance_id",
        "name",
        "active_since",
        "active_till",
        "routine_type",
        "ticket_number",
    ])?;
    for m in list {
        writer.write_record([
            &m.maintenance_id,
            &m.name,
            &m.active_since,
            &m.active_till,
            &m.routine_type,
            &m.ticket_number,
        ])?;
    }
    writer.flush()?;
    Ok(())
}
