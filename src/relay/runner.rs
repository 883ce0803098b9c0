//! Relay runner
//!
//! Entry point for running the relay front-end over stdin/stdout.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::commands::{HELP_TEXT, RelayCommand, SessionCommand};
use super::display::{render_history, render_info, render_session_list};
use super::retry::RetryPolicy;
use crate::cli::Cli;
use crate::session::{Session, SessionManager};
use crate::tracing::ErrorTraceExt;
use crate::types::{RelayConfig, RelayError, Result, ToolRegistry};

// OpenTelemetry imports (only when feature is enabled)
#[cfg(feature = "otel")]
use opentelemetry::global;
#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Name of the session the front-end starts on; it cannot be deleted
pub const DEFAULT_SESSION: &str = "main";

// Global storage for OpenTelemetry provider (for proper shutdown)
#[cfg(feature = "otel")]
static OTEL_PROVIDER: std::sync::OnceLock<SdkTracerProvider> = std::sync::OnceLock::new();

/// Shutdown OpenTelemetry provider (flush all pending spans)
///
/// This should be called before the application exits to ensure all
/// telemetry data is properly flushed to the backend.
#[cfg(feature = "otel")]
pub fn shutdown_otel() {
    if let Some(provider) = OTEL_PROVIDER.get() {
        tracing::info!("Shutting down OpenTelemetry provider...");
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shutdown OpenTelemetry provider: {:?}", e);
        } else {
            tracing::info!("OpenTelemetry provider shutdown complete");
        }
    }
}

/// Shutdown OpenTelemetry provider (no-op when feature is disabled)
#[cfg(not(feature = "otel"))]
pub fn shutdown_otel() {}

#[cfg(feature = "otel")]
fn init_otel(endpoint: &str, service_name: &str) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_sdk::Resource;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_owned())
                .build(),
        )
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider)
}

/// Build an EnvFilter based on CLI args and RUST_LOG environment variable
///
/// Priority: RUST_LOG environment variable > CLI arguments (-v, -vv, -q)
fn build_env_filter(cli: &Cli) -> tracing_subscriber::EnvFilter {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            return tracing_subscriber::EnvFilter::new(rust_log);
        }
    }

    let level = cli.log_level();
    tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into())
}

/// Install the subscriber with a formatting layer, plus OpenTelemetry when enabled
fn install_subscriber<L>(cli: &Cli, fmt_layer: L) -> anyhow::Result<()>
where
    L: tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync + 'static,
{
    let filter = build_env_filter(cli);

    #[cfg(feature = "otel")]
    {
        if let Some(endpoint) = cli.otel_endpoint.as_deref().filter(|_| cli.is_otel_enabled()) {
            let service_name = &cli.otel_service_name;
            eprintln!(
                "OpenTelemetry enabled: endpoint={}, service={}",
                endpoint, service_name
            );

            let provider = init_otel(endpoint, service_name)?;
            let tracer = provider.tracer("cli-relay");
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

            // Store provider globally for proper shutdown
            drop(OTEL_PROVIDER.set(provider));

            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(otel_layer)
                .with(filter)
                .init();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
    Ok(())
}

/// Initialize logging with file output (diagnostic mode)
fn init_logging_to_file(cli: &Cli) -> anyhow::Result<()> {
    let log_path = cli.log_path();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(&log_path)?;

    // Output log file location to stderr (user needs to know)
    eprintln!("Diagnostic mode: logging to {}", log_path.display());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false);
    install_subscriber(cli, fmt_layer)
}

/// Initialize logging with stderr output (normal mode)
fn init_logging_to_stderr(cli: &Cli) -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);
    install_subscriber(cli, fmt_layer)
}

/// Initialize logging based on CLI arguments
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    if cli.is_diagnostic() {
        init_logging_to_file(cli)
    } else {
        init_logging_to_stderr(cli)
    }
}

/// Everything the front-end needs once configuration is resolved
#[derive(Debug)]
pub struct Relay {
    manager: SessionManager,
    session: Arc<Session>,
    /// Tool of sessions created without an explicit one
    default_tool: String,
    cwd: PathBuf,
    retry: RetryPolicy,
}

impl Relay {
    /// Resolve the tool registry and working directory, and open the session
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let registry = ToolRegistry::load(config.tools_file.as_deref(), config.tool_timeout)?;
        let cwd = config.resolve_working_dir()?;
        Self::with_manager(
            SessionManager::new(registry),
            &config.default_tool,
            cwd,
            RetryPolicy::from_config(config),
        )
    }

    /// Open the front-end session on an existing manager
    pub fn with_manager(
        manager: SessionManager,
        tool_id: &str,
        cwd: PathBuf,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let session = manager.create_session(DEFAULT_SESSION, tool_id, cwd.clone())?;
        Ok(Self {
            manager,
            session,
            default_tool: tool_id.to_string(),
            cwd,
            retry,
        })
    }

    /// The default session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Send one message through the default session with the retry policy applied
    pub async fn ask(&self, message: &str) -> Result<String> {
        ask(&self.session, self.retry, &CancellationToken::new(), message).await
    }

    /// Kill running processes of every session
    pub async fn shutdown(&self) {
        self.manager.cleanup_all().await;
    }
}

async fn ask(
    session: &Session,
    retry: RetryPolicy,
    cancel: &CancellationToken,
    message: &str,
) -> Result<String> {
    retry
        .run(cancel, || session.send_message(message))
        .await
        .inspect_err(|e| {
            e.trace_error();
        })
}

/// Render the outcome of a request the way the front-end prints it
pub fn render_reply(result: &Result<String>) -> String {
    match result {
        Ok(reply) => reply.clone(),
        Err(e) => e.user_message(),
    }
}

/// What the loop should do after handling a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// The request the front-end is waiting for
///
/// The token covers the whole request, including the waits between retry
/// attempts when no process is running.
#[derive(Debug)]
struct InFlight {
    session: Arc<Session>,
    cancel: CancellationToken,
    task: JoinHandle<Result<String>>,
}

/// Interactive loop state: the active session and at most one request in flight
#[derive(Debug)]
struct ReplLoop<'a> {
    relay: &'a Relay,
    active_name: String,
    active: Arc<Session>,
    in_flight: Option<InFlight>,
}

impl<'a> ReplLoop<'a> {
    fn new(relay: &'a Relay) -> Self {
        Self {
            relay,
            active_name: DEFAULT_SESSION.to_string(),
            active: Arc::clone(&relay.session),
            in_flight: None,
        }
    }

    /// Cancel the in-flight request if it runs on `session`
    fn cancel_in_flight(&self, session: &Arc<Session>) -> bool {
        match &self.in_flight {
            Some(request)
                if Arc::ptr_eq(&request.session, session) && !request.cancel.is_cancelled() =>
            {
                request.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let Some(command) = RelayCommand::parse(line) else {
            return Flow::Continue;
        };
        tracing::debug!(command = ?command, session = %self.active_name, "Front-end command");

        match command {
            RelayCommand::Ask(message) => {
                if self.in_flight.is_some() {
                    println!("{}", render_reply(&Err(RelayError::AlreadyBusy)));
                } else {
                    self.start_request(message);
                }
            }
            RelayCommand::New => {
                self.cancel_in_flight(&self.active);
                self.active.reset().await;
                println!("Started a new conversation.");
            }
            RelayCommand::Kill => {
                let cancelled = self.cancel_in_flight(&self.active);
                let killed = self.active.kill().await;
                if cancelled || killed {
                    println!("Killed the running request.");
                } else {
                    println!("Nothing is running.");
                }
            }
            RelayCommand::Info => {
                println!("Session:           {}", self.active_name);
                println!("{}", render_info(&self.active.info(), Utc::now()));
            }
            RelayCommand::History(count) => {
                println!("{}", render_history(&self.active.history(Some(count))));
            }
            RelayCommand::Session(command) => self.handle_session(command).await,
            RelayCommand::Help => println!("{HELP_TEXT}"),
            RelayCommand::Quit => return Flow::Quit,
            RelayCommand::Usage(usage) => println!("{usage}"),
            RelayCommand::Unknown(input) => {
                println!("Unknown command: {input}. Type /help for commands.");
            }
        }
        Flow::Continue
    }

    fn start_request(&mut self, message: String) {
        let session = Arc::clone(&self.active);
        let cancel = CancellationToken::new();
        let retry = self.relay.retry;
        let task = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            async move { ask(&session, retry, &cancel, &message).await }
        });
        self.in_flight = Some(InFlight {
            session,
            cancel,
            task,
        });
    }

    async fn handle_session(&mut self, command: SessionCommand) {
        let relay = self.relay;
        let manager = &relay.manager;
        match command {
            SessionCommand::List => {
                let sessions: Vec<_> = manager
                    .session_names()
                    .into_iter()
                    .filter_map(|name| {
                        let info = manager.get_session(&name)?.info();
                        Some((name, info))
                    })
                    .collect();
                println!("{}", render_session_list(&sessions, &self.active_name));
            }
            SessionCommand::Create { name, tool } => {
                let tool = tool.as_deref().unwrap_or(relay.default_tool.as_str());
                match manager.create_session(&name, tool, relay.cwd.clone()) {
                    Ok(session) => {
                        tracing::info!(session = %name, tool = %session.tool().id, "Session created");
                        println!(
                            "Created session '{name}' ({}). Use /session switch {name} to talk to it.",
                            session.tool().name
                        );
                    }
                    Err(e) => println!("{}", e.user_message()),
                }
            }
            SessionCommand::Switch(name) => match manager.get_session_or_error(&name) {
                Ok(session) => {
                    println!("Switched to session '{name}' ({}).", session.tool().name);
                    self.active = session;
                    self.active_name = name;
                }
                Err(e) => println!("{}", e.user_message()),
            },
            SessionCommand::Delete(name) => {
                if name == DEFAULT_SESSION {
                    println!("The {DEFAULT_SESSION} session cannot be deleted; use /new to reset it.");
                    return;
                }
                if let Some(session) = manager.get_session(&name) {
                    self.cancel_in_flight(&session);
                }
                if manager.remove_session(&name).await.is_none() {
                    println!("{}", RelayError::session_not_found(&name).user_message());
                    return;
                }
                println!("Deleted session '{name}'.");
                if self.active_name == name {
                    self.active = Arc::clone(&relay.session);
                    self.active_name = DEFAULT_SESSION.to_string();
                    println!("Switched to session '{DEFAULT_SESSION}'.");
                }
            }
        }
    }

    fn finish_request(&mut self, joined: std::result::Result<Result<String>, tokio::task::JoinError>) {
        self.in_flight = None;
        match joined {
            Ok(result) => println!("{}", render_reply(&result)),
            Err(e) => tracing::error!(error = %e, "Request task failed"),
        }
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        tracing::info!("End of input");
                        break;
                    };
                    if self.handle_line(&line).await == Flow::Quit {
                        break;
                    }
                }
                joined = join_in_flight(&mut self.in_flight) => self.finish_request(joined),
            }
        }

        // A request still running at exit is killed, not awaited
        if let Some(request) = self.in_flight.take() {
            request.cancel.cancel();
            self.relay.shutdown().await;
            drop(request.task.await);
        }
        Ok(())
    }
}

async fn join_in_flight(
    request: &mut Option<InFlight>,
) -> std::result::Result<Result<String>, tokio::task::JoinError> {
    match request {
        Some(request) => (&mut request.task).await,
        None => std::future::pending().await,
    }
}

/// Run the relay with CLI arguments
///
/// Initializes logging, resolves configuration (environment first, then
/// command-line overrides), and either answers the single `--message` or
/// runs the interactive loop until end of input or `/quit`.
pub async fn run_relay_with_cli(cli: &Cli) -> anyhow::Result<()> {
    let startup_time = std::time::Instant::now();

    // Initialize logging first (must happen before any tracing)
    init_logging(cli)?;

    let mut config = RelayConfig::from_env();
    cli.apply_overrides(&mut config);

    let relay = {
        let startup_span = tracing::info_span!(
            "relay_startup",
            version = %env!("CARGO_PKG_VERSION"),
            pid = %std::process::id(),
            diagnostic = %cli.is_diagnostic(),
            otel_enabled = %cli.otel_endpoint.is_some(),
        );
        let _enter = startup_span.enter();

        tracing::info!("========== CLI Relay Starting ==========");
        if cli.is_diagnostic() {
            tracing::info!(
                log_path = %cli.log_path().display(),
                "Diagnostic mode enabled"
            );
        }

        let relay = Relay::from_config(&config).inspect_err(|e| {
            e.trace_error();
        })?;
        let tool = relay.session.tool();
        tracing::info!(
            tool = %tool.id,
            command = %tool.command,
            cwd = %relay.session.cwd().display(),
            timeout_secs = tool.max_duration.as_secs(),
            resumable = tool.supports_resume(),
            retries = relay.retry.max_retries,
            init_elapsed_ms = startup_time.elapsed().as_millis(),
            "Relay configured"
        );
        relay
    };

    let result = if let Some(message) = &cli.message {
        let reply = relay.ask(message).await;
        relay.shutdown().await;
        reply.map(|reply| println!("{reply}")).map_err(|e| anyhow::anyhow!(e.user_message()))
    } else {
        if std::io::stdin().is_terminal() {
            eprintln!(
                "Relaying to {} in {}. Type /help for commands.",
                relay.session.tool().name,
                relay.session.cwd().display()
            );
        }
        let result = ReplLoop::new(&relay).run().await;
        relay.shutdown().await;
        result
    };

    emit_relay_shutdown_trace(startup_time.elapsed()).await;

    result
}

/// Emit a short-lived trace to indicate the relay is shutting down
#[tracing::instrument(name = "relay_shutdown", skip_all, fields(
    uptime_secs = %total_uptime.as_secs(),
))]
async fn emit_relay_shutdown_trace(total_uptime: std::time::Duration) {
    tracing::info!(
        uptime_secs = total_uptime.as_secs(),
        uptime_ms = total_uptime.as_millis(),
        "========== Relay Shutdown Complete =========="
    );
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::session::{ProcessLauncher, SystemLauncher, WrappedChild};
    use crate::types::ToolDescriptor;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Runs every tool command through `/bin/sh -c` with the message as `$1`
    #[derive(Debug)]
    struct ScriptLauncher(&'static str);

    impl ProcessLauncher for ScriptLauncher {
        fn launch(&self, argv: &[String], cwd: &Path) -> std::io::Result<WrappedChild> {
            let mut sh_argv = vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                self.0.to_string(),
                "tool".to_string(),
            ];
            sh_argv.extend(argv.iter().skip(2).cloned());
            SystemLauncher.launch(&sh_argv, cwd)
        }
    }

    /// Fails the first launch with a transient error, then runs the script
    #[derive(Debug)]
    struct FlakyLauncher {
        script: ScriptLauncher,
        launches: AtomicUsize,
    }

    impl FlakyLauncher {
        fn new(script: &'static str) -> Self {
            Self {
                script: ScriptLauncher(script),
                launches: AtomicUsize::new(0),
            }
        }

        fn launches(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }
    }

    impl ProcessLauncher for FlakyLauncher {
        fn launch(&self, argv: &[String], cwd: &Path) -> std::io::Result<WrappedChild> {
            if self.launches.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(std::io::Error::other("resource temporarily unavailable"));
            }
            self.script.launch(argv, cwd)
        }
    }

    fn relay_with(launcher: Arc<dyn ProcessLauncher>, retry: RetryPolicy) -> Relay {
        let mut registry = ToolRegistry::new();
        registry.insert(
            ToolDescriptor::new("echo", "echo").with_max_duration(Duration::from_secs(10)),
        );
        let manager = SessionManager::with_launcher(registry, launcher);
        Relay::with_manager(manager, "echo", std::env::temp_dir(), retry).unwrap()
    }

    fn relay(script: &'static str) -> Relay {
        relay_with(Arc::new(ScriptLauncher(script)), RetryPolicy::none())
    }

    async fn wait_for_pid(session: &Session) {
        for _ in 0..500 {
            if session.info().pid.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_relay_ask() {
        let relay = relay(r#"printf 'you said: %s\n' "$1""#);
        let reply = relay.ask("hello").await;
        assert_eq!(render_reply(&reply), "you said: hello");
        assert_eq!(relay.session().info().message_count, 1);
    }

    #[tokio::test]
    async fn test_relay_error_is_rendered() {
        let relay = relay("echo 'quota exceeded' >&2; exit 1");
        let reply = relay.ask("hello").await;
        assert_eq!(render_reply(&reply), "[Error] quota exceeded");
    }

    #[tokio::test]
    async fn test_relay_retries_launch_fault() {
        let launcher = Arc::new(FlakyLauncher::new(r#"printf 'ok %s' "$1""#));
        let relay = relay_with(
            launcher.clone(),
            RetryPolicy::new(2, Duration::from_millis(10)),
        );

        let reply = relay.ask("hello").await;
        assert_eq!(render_reply(&reply), "ok hello");
        assert_eq!(launcher.launches(), 2);
    }

    #[test]
    fn test_relay_unknown_tool() {
        let manager = SessionManager::new(ToolRegistry::builtin(Duration::from_secs(1)));
        let err = Relay::with_manager(manager, "codex", "/tmp".into(), RetryPolicy::none())
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_repl_commands() {
        let relay = relay(r#"printf 'ok %s' "$1""#);
        let mut repl = ReplLoop::new(&relay);

        assert_eq!(repl.handle_line("").await, Flow::Continue);
        assert_eq!(repl.handle_line("/help").await, Flow::Continue);
        assert_eq!(repl.handle_line("/kill").await, Flow::Continue);
        assert_eq!(repl.handle_line("/history 0").await, Flow::Continue);

        assert_eq!(repl.handle_line("first").await, Flow::Continue);
        let request = repl.in_flight.take().unwrap();
        assert_eq!(request.task.await.unwrap().unwrap(), "ok first");
        assert_eq!(relay.session().info().message_count, 1);
        assert_eq!(relay.session().history(Some(10)).len(), 2);
        assert_eq!(repl.handle_line("/history 1").await, Flow::Continue);

        assert_eq!(repl.handle_line("/new").await, Flow::Continue);
        assert_eq!(relay.session().info().message_count, 0);
        assert!(relay.session().history(None).is_empty());
        assert_eq!(repl.handle_line("/quit").await, Flow::Quit);
    }

    #[tokio::test]
    async fn test_repl_kill_running_request() {
        let relay = relay("exec sleep 30");
        let mut repl = ReplLoop::new(&relay);

        repl.handle_line("wait forever").await;
        wait_for_pid(relay.session()).await;
        assert!(relay.session().is_busy());

        // second message while busy is answered, not queued
        repl.handle_line("are you there").await;
        assert!(repl.in_flight.is_some());

        repl.handle_line("/kill").await;
        let joined = join_in_flight(&mut repl.in_flight).await.unwrap();
        assert!(matches!(joined, Err(RelayError::Cancelled)));
        assert!(!relay.session().is_busy());
    }

    #[tokio::test]
    async fn test_repl_kill_during_retry_backoff() {
        let launcher = Arc::new(FlakyLauncher::new("exec sleep 3"));
        let relay = relay_with(
            launcher.clone(),
            RetryPolicy::new(2, Duration::from_millis(500)),
        );
        let mut repl = ReplLoop::new(&relay);
        let started = Instant::now();

        repl.handle_line("hello").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        // first launch failed, the request is waiting to retry
        assert_eq!(launcher.launches(), 1);
        assert!(!relay.session().is_busy());

        // a message typed now is refused without launching anything
        repl.handle_line("are you there").await;
        assert_eq!(launcher.launches(), 1);

        repl.handle_line("/kill").await;
        let joined = join_in_flight(&mut repl.in_flight).await.unwrap();
        assert!(matches!(joined, Err(RelayError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));

        // the retry never fires
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(launcher.launches(), 1);
        assert!(!relay.session().is_busy());
    }

    #[tokio::test]
    async fn test_repl_new_during_retry_backoff() {
        let launcher = Arc::new(FlakyLauncher::new(r#"printf 'ok %s' "$1""#));
        let relay = relay_with(
            launcher.clone(),
            RetryPolicy::new(2, Duration::from_millis(500)),
        );
        let mut repl = ReplLoop::new(&relay);

        repl.handle_line("hello").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        repl.handle_line("/new").await;

        let joined = join_in_flight(&mut repl.in_flight).await.unwrap();
        assert!(matches!(joined, Err(RelayError::Cancelled)));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(launcher.launches(), 1);
        assert_eq!(relay.session().info().message_count, 0);
    }

    #[tokio::test]
    async fn test_repl_sessions() {
        let relay = relay(r#"printf 'ok %s' "$1""#);
        let mut repl = ReplLoop::new(&relay);

        repl.handle_line("/session create review").await;
        repl.handle_line("/session create review").await;
        repl.handle_line("/session create bad name").await;
        repl.handle_line("/session create other codex").await;
        assert_eq!(
            relay.manager().session_names(),
            vec!["main".to_string(), "review".to_string()]
        );

        repl.handle_line("/session switch missing").await;
        assert_eq!(repl.active_name, "main");
        repl.handle_line("/session switch review").await;
        assert_eq!(repl.active_name, "review");
        repl.handle_line("/session list").await;

        repl.handle_line("for review").await;
        let request = repl.in_flight.take().unwrap();
        assert_eq!(request.task.await.unwrap().unwrap(), "ok for review");
        let review = relay.manager().get_session("review").unwrap();
        assert_eq!(review.info().message_count, 1);
        assert_eq!(relay.session().info().message_count, 0);

        repl.handle_line("/session delete main").await;
        assert!(relay.manager().has_session("main"));

        repl.handle_line("/session delete review").await;
        assert!(!relay.manager().has_session("review"));
        assert_eq!(repl.active_name, "main");
        assert!(Arc::ptr_eq(&repl.active, relay.session()));
    }

    #[tokio::test]
    async fn test_repl_delete_session_kills_its_request() {
        let relay = relay("exec sleep 30");
        let mut repl = ReplLoop::new(&relay);

        repl.handle_line("/session create work").await;
        repl.handle_line("/session switch work").await;
        repl.handle_line("wait forever").await;
        let work = relay.manager().get_session("work").unwrap();
        wait_for_pid(&work).await;
        assert!(work.is_busy());

        repl.handle_line("/session delete work").await;
        let joined = join_in_flight(&mut repl.in_flight).await.unwrap();
        assert!(matches!(joined, Err(RelayError::Cancelled)));
        assert!(!work.is_busy());
        assert_eq!(repl.active_name, "main");
    }
}
