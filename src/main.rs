//! streamtalk - terminal client for a streaming chat backend.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use streamtalk::auth::{CredentialStore, CHAT_CREDENTIAL};
use streamtalk::classify::SentinelClassifier;
use streamtalk::cli::{run_single_prompt, Repl};
use streamtalk::client::ChatApi;
use streamtalk::config::Settings;
use streamtalk::db::Database;
use streamtalk::notify::{FocusSignal, TitleNotifier};
use streamtalk::session::SessionController;
use streamtalk::view::{TerminalRenderer, TerminalSink};

/// Terminal client for a streaming chat backend
#[derive(Parser, Debug)]
#[command(name = "streamtalk")]
#[command(version, about, long_about = None)]
struct Args {
    /// Backend server URL (overrides the stored setting)
    #[arg(short, long, env = "STREAMTALK_SERVER")]
    server: Option<String>,

    /// Store a bearer token and continue
    #[arg(long)]
    token: Option<String>,

    /// Send a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let default_filter = if args.verbose {
            "trace"
        } else if args.debug {
            "debug"
        } else {
            "warn"
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        let db = Database::open()?;
        db.migrate()?;

        let settings = Settings::new(&db);
        let credentials = CredentialStore::new(&db);

        if let Some(token) = &args.token {
            credentials.save(CHAT_CREDENTIAL, token, None)?;
            eprintln!("Token stored.");
        }

        let token = credentials.bearer_token(CHAT_CREDENTIAL)?;
        let server_url = args.server.clone().unwrap_or_else(|| settings.server_url());
        let assistant_name = settings.assistant_name();

        let api = ChatApi::new(server_url.as_str(), token)?;
        let classifier = SentinelClassifier::with_markers(settings.markers());
        let sink = TerminalSink::new(TerminalRenderer::new(assistant_name.as_str()));

        let focus = FocusSignal::new();
        let notifier = TitleNotifier::new(
            "streamtalk",
            settings.title_alert_text(),
            settings.title_alert_ms(),
            focus.clone(),
        );

        let mut controller = SessionController::new(api, classifier, sink)
            .with_notifier(notifier)
            .with_spinner();

        // The client is useless without a server-side session; an init
        // failure is fatal.
        let info = controller
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!("could not resume session at {}: {}", server_url, e))?;

        if let Some(prompt) = &args.prompt {
            run_single_prompt(&mut controller, prompt).await
        } else {
            Repl::new(controller, focus, assistant_name, info.model_id)
                .run()
                .await
        }
    })
}
