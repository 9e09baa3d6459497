use clap::Parser;
use qualcode_cli::commands::{check, cli, task};
use qualcode_cli::notices::NoticeTray;
use qualcode_core::api::{AppConfig, CliError, ErrorBus, GateError, TaskError};
use qualcode_core::config;
use qualcode_plugins::factory;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = config::load(args.config.as_deref()).map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    let errors = ErrorBus::new();
    let tray = NoticeTray::new(cfg.notices.max_visible);
    let _notices = tray.attach(&errors, true);

    tracing::debug!(
        target: "qualcode.task",
        stage = "cli.start",
        project_id = %cfg.project_id,
        base_url = %cfg.backend.base_url
    );

    dispatch(args.command, &cfg, &errors).await
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 12: invalid input
    // 20: transport / lost connection / IO
    // 30: the task itself reported an error
    // 40: dedup gate aborted or inconclusive
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Task(te) => match te {
            TaskError::Validation(_) => 12,
            TaskError::Transport(_) => 20,
            TaskError::ConnectionLost { .. } => 20,
            TaskError::ResultUnavailable { .. } => 12,
            TaskError::TaskReported(_) => 30,
        },
        CliError::Gate(ge) => match ge {
            GateError::Validation(_) => 12,
            GateError::Inconclusive(_) => 40,
        },
        CliError::Aborted => 40,
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

async fn dispatch(cmd: cli::Commands, cfg: &AppConfig, errors: &ErrorBus) -> Result<i32, CliError> {
    let transport = factory::build_transport(&cfg.backend)?;

    match cmd {
        cli::Commands::Run(run_args) => {
            let orch = factory::build_orchestrator(cfg, run_args.kind, transport, errors);
            task::run(&orch, run_args).await
        }
        cli::Commands::Resume(ref_args) => {
            let orch = factory::build_orchestrator(cfg, ref_args.kind, transport, errors);
            task::resume(&orch, ref_args).await
        }
        cli::Commands::Watch(ref_args) => {
            let orch = factory::build_orchestrator(cfg, ref_args.kind, transport, errors);
            task::watch(&orch, ref_args).await
        }
        cli::Commands::Status(status_args) => {
            let orch = factory::build_orchestrator(cfg, status_args.kind, transport, errors);
            task::status(&orch, status_args).await
        }
        cli::Commands::CheckCodes(check_args) => {
            let gate = factory::build_dedup_gate(cfg, transport, errors);
            check::check_codes(&gate, check_args).await
        }
        cli::Commands::Ping => {
            let healthy = transport
                .health()
                .await
                .map_err(|e| CliError::Task(TaskError::Transport(e)))?;
            let label = if healthy { "ok" } else { "unhealthy" };
            println!("{} {}", transport.base_url(), label);
            Ok(if healthy { 0 } else { 20 })
        }
    }
}

fn init_tracing(logging: &qualcode_core::config::LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("qualcode"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("qualcode.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
