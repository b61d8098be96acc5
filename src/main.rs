mod config;
mod prober;
mod report;
mod scheduler;
mod statistics;
mod timer;
mod timestamp;
mod util;

use config::ProbeConfig;
use prober::tcp_connect::TcpConnector;
use report::Printer;
use scheduler::{Scheduler, StopReason};
use util::parse_host_port;

use clap::Parser;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{info, warn};

/// Ping a host over TCP, just like the ping command.
#[derive(Parser, Debug)]
#[command(name = "tcping", version, about, long_about = None)]
struct Cli {
    /// Target host, optionally written as host:port
    host: String,

    /// Tcp port. (default: 80)
    #[arg(short, long)]
    port: Option<u16>,

    /// Try connections counts, 0 for endless pinging. (default: 0)
    #[arg(short, long)]
    count: Option<u64>,

    /// Timeout seconds. (default: 1)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Interval of pinging in seconds. (default: 1)
    #[arg(short, long)]
    interval: Option<f64>,

    /// Show the statistics as a table (default)
    #[arg(long, overrides_with = "no_report")]
    report: bool,

    /// Show the statistics as plain text
    #[arg(long = "no-report", overrides_with = "report")]
    no_report: bool,

    /// Print the statistics as JSON
    #[arg(long)]
    json: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply CLI overrides (CLI > config file > defaults).
    fn merge(&self, mut config: ProbeConfig) -> (String, ProbeConfig) {
        let (host, embedded_port) = parse_host_port(&self.host);
        if let Some(port) = self.port.or(embedded_port) {
            config.port = port;
        }
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if self.report {
            config.report = true;
        }
        if self.no_report {
            config.report = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        (host, config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let (host, config) = cli.merge(ProbeConfig::load().await?);
    config.validate()?;
    let log_level = config.get_tracing_level()?;

    // Logs go to stderr; stdout carries the ping lines and the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("tcping={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    info!(host = %host, port = config.port, count = config.count, "starting tcping");

    // Ctrl-C flips the shutdown flag; the probe loop finishes its snapshot
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("could not listen for Ctrl-C: {:?}", e);
                // keep the sender alive so the loop is never cancelled spuriously
                std::future::pending::<()>().await;
            }
        }
    });

    let scheduler = Scheduler::new(
        TcpConnector::new(config.timeout()?),
        host,
        config.port,
        config.interval()?,
        config.termination(),
    );
    let run = scheduler.run(shutdown_rx).await;
    if run.reason == StopReason::Interrupted {
        info!("run interrupted by user");
    }

    let has_success = run.statistics.has_success();
    let mut printer = Printer::new();
    printer.add_statistics(run.statistics);

    if cli.json {
        println!("{}", printer.json()?);
    } else if config.report {
        println!("{}", printer.table());
    } else {
        println!("{}", printer.raw());
    }

    Ok(if has_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
