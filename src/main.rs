use clap::{Parser, Subcommand, ValueEnum};
use kcli::config::mask_password;
use kcli::settings::Settings;
use kcli::{consume_start, produce_publish, DisplayMode, Result, SessionConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kcli", version)]
#[command(about = "kcli is a simple Kafka client for publishing and subscribing to messages", long_about = None)]
struct Args {
    #[arg(long, value_name = "FILE", global = true, help = "Profile file with default connection settings")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(long, global = true, help = "Verbose logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce a message to a Kafka topic
    #[command(visible_alias = "p")]
    Produce(ProduceArgs),

    /// Consume messages from a Kafka topic
    #[command(visible_alias = "c")]
    Consume(ConsumeArgs),

    /// Print the version number of kcli
    #[command(visible_alias = "v")]
    Version,
}

#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    #[arg(
        short = 'b',
        long,
        value_delimiter = ',',
        help = "Kafka bootstrap servers, comma separated (e.g. 'localhost:9092,localhost:9093')"
    )]
    bootstrap_servers: Vec<String>,

    #[arg(long, help = "Kafka topic")]
    topic: String,

    #[arg(long, help = "Username for SASL/PLAIN authentication")]
    username: Option<String>,

    #[arg(long, help = "Password for SASL/PLAIN authentication")]
    password: Option<String>,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct PayloadArgs {
    #[arg(
        short = 'p',
        long,
        help = "Message payload; compacted if it is JSON"
    )]
    payload: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_name = "FILE",
        help = "Read the message payload from a file; compacted if it is JSON"
    )]
    file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ProduceArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    payload: PayloadArgs,

    #[arg(short = 'k', long, help = "Message key; a UUID is generated when empty")]
    key: Option<String>,

    #[arg(long = "header", value_delimiter = ',', help = "Message header in name:value form")]
    headers: Vec<String>,

    #[arg(long = "with-timeout", value_name = "SECONDS", help = "Timeout for producing the message [default: 5]")]
    timeout: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct ConsumeArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long, help = "Consumer group id [default: kcli-group]")]
    group_id: Option<String>,

    #[arg(long, help = "Consume a single partition instead of joining a group")]
    partition: Option<i32>,

    #[arg(long, value_enum, help = "How to print consumed messages [default: list]")]
    print_opt: Option<PrintOpt>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PrintOpt {
    #[value(alias = "0")]
    Compact,
    #[value(alias = "1")]
    Pretty,
    #[value(alias = "2")]
    List,
}

impl From<PrintOpt> for DisplayMode {
    fn from(opt: PrintOpt) -> Self {
        match opt {
            PrintOpt::Compact => DisplayMode::Compact,
            PrintOpt::Pretty => DisplayMode::Pretty,
            PrintOpt::List => DisplayMode::List,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    if let Command::Version = args.command {
        println!("kcli version: {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(path) = &args.config {
        info!("Loading profile from {:?}", path);
    }
    let settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Command::Produce(produce) => run_produce(produce, &settings).await,
        Command::Consume(consume) => run_consume(consume, &settings).await,
        Command::Version => Ok(()),
    }
}

fn session_config(connection: ConnectionArgs, settings: &Settings) -> Result<SessionConfig> {
    let brokers = if connection.bootstrap_servers.is_empty() {
        settings.bootstrap_servers.clone()
    } else {
        connection.bootstrap_servers
    };
    let username = connection.username.or_else(|| settings.username.clone());
    let password = connection.password.or_else(|| settings.password.clone());

    SessionConfig::new(&brokers, connection.topic)?.with_credentials(username, password)
}

fn log_summary(config: &SessionConfig) {
    info!(
        brokers = ?config.brokers(),
        topic = %config.topic(),
        username = ?config.credentials().map(|c| c.username.as_str()),
        password = ?config.credentials().map(|c| mask_password(&c.password)),
        "Configuration summary"
    );
}

async fn run_produce(args: ProduceArgs, settings: &Settings) -> Result<()> {
    let config = session_config(args.connection, settings)?;
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.timeout());

    log_summary(&config);
    info!(timeout = ?timeout, headers = ?args.headers, "Produce options");

    let record = produce_publish(
        config,
        args.key,
        args.payload.payload,
        args.payload.file,
        args.headers,
        timeout,
    )
    .await?;

    info!(key = %record.key, "Message published");
    Ok(())
}

async fn run_consume(args: ConsumeArgs, settings: &Settings) -> Result<()> {
    let group_id = args.group_id.unwrap_or_else(|| settings.group_id.clone());
    let config = session_config(args.connection, settings)?
        .with_consumer_target(args.partition, Some(group_id))?;
    let mode = args.print_opt.map(DisplayMode::from).unwrap_or(settings.print_opt);

    log_summary(&config);
    info!(target_selection = ?config.consumer_target()?, mode = ?mode, "Consume options");

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    consume_start(config, mode, cancel).await?;

    info!("Consumer closed successfully");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, shutting down gracefully...");
    cancel.cancel();
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("kcli=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kcli=info,warn"))
    };

    // stdout carries consumed messages, logs go to stderr
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(username: Option<&str>, password: Option<&str>) -> Settings {
        Settings {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            group_id: "kcli-group".to_string(),
            timeout_secs: 5,
            print_opt: DisplayMode::List,
        }
    }

    fn produce_args(extra: &[&str]) -> ProduceArgs {
        let mut argv = vec!["kcli", "produce", "--topic", "orders", "-p", "hello"];
        argv.extend_from_slice(extra);
        match Args::try_parse_from(argv).unwrap().command {
            Command::Produce(args) => args,
            other => panic!("expected produce, got {:?}", other),
        }
    }

    #[test]
    fn test_username_flag_paired_with_profile_password() {
        let args = produce_args(&["--username", "alice"]);
        let config = session_config(args.connection, &profile(None, Some("s3cret"))).unwrap();

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "s3cret");
        assert_eq!(config.brokers(), ["localhost:9092".to_string()]);
    }

    #[test]
    fn test_unpaired_username_rejected_after_merge() {
        let args = produce_args(&["--username", "alice"]);
        assert!(matches!(
            session_config(args.connection, &profile(None, None)),
            Err(kcli::Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_flags_override_profile() {
        let args = produce_args(&[
            "-b",
            "kafka-1:9092,kafka-2:9092",
            "--username",
            "bob",
            "--password",
            "hunter22",
        ]);
        let config =
            session_config(args.connection, &profile(Some("alice"), Some("s3cret"))).unwrap();

        assert_eq!(config.brokers(), ["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(config.credentials().unwrap().username, "bob");
    }

    #[test]
    fn test_print_opt_accepts_names_and_digits() {
        for (raw, expected) in [
            ("0", DisplayMode::Compact),
            ("pretty", DisplayMode::Pretty),
            ("2", DisplayMode::List),
        ] {
            let args = Args::try_parse_from([
                "kcli",
                "consume",
                "--topic",
                "orders",
                "--print-opt",
                raw,
            ])
            .unwrap();
            match args.command {
                Command::Consume(consume) => {
                    assert_eq!(consume.print_opt.map(DisplayMode::from), Some(expected))
                }
                other => panic!("expected consume, got {:?}", other),
            }
        }
    }
}
