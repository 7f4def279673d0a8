use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chatbot_ui::chat::{self, ChatExit};
use chatbot_ui::web_server;
use chatbot_ui::{ChatMode, CredentialGate, CredentialStore, Orchestrator, Session, Settings};
use clap::Parser;
use tracing::{error, info};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the OpenAI-compatible API.
    #[arg(long, global = true, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Where the validated API key is stored between runs.
    #[arg(long, global = true, env = "CHATBOT_CREDENTIAL_FILE")]
    credential_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the chat web UI.
    Serve {
        #[arg(long, default_value = "127.0.0.1", help = "Address to bind the web server to.")]
        host: IpAddr,
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
    },
    /// Chat in the terminal using the stored API key.
    Chat {
        #[arg(long, help = "Answer every message in web search mode.")]
        search: bool,
    },
    /// Validate an OpenAI API key and store it.
    Login {
        #[arg(env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,
    },
    /// Forget the stored API key.
    Logout,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(api_base) = &self.api_base {
            settings = settings.with_api_base(api_base.as_str());
        }
        if let Some(path) = &self.credential_file {
            settings = settings.with_credential_file(path.clone());
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,chatbot_ui=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();
    let store = CredentialStore::new(settings.credential_file.clone());

    match cli.command {
        Commands::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            info!("Starting web UI on {}...", addr);

            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(settings, addr).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { search } => {
            let Some(session) = Session::resume(&store)? else {
                bail!("No stored API key. Run `chatbot-ui login <API_KEY>` first.");
            };
            let orchestrator = Orchestrator::new(&settings);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();

            let exit = chat::run_chat(
                &orchestrator,
                &store,
                session,
                ChatMode::from_search_flag(search),
                stdin,
                &mut stdout,
            )
            .await
            .context("Chat session failed")?;
            if exit == ChatExit::LoggedOut {
                info!("Stored API key cleared");
            }
        }
        Commands::Login { api_key } => {
            let orchestrator = Orchestrator::new(&settings);
            let gate = CredentialGate::new(orchestrator.provider().clone());
            let Ok(credential) = gate.authorize(&api_key).await else {
                bail!("{}", chatbot_ui::constants::INVALID_KEY_MESSAGE);
            };
            Session::establish(&store, credential).context("Failed to store API key")?;
            println!("API key saved to {}", store.path().display());
        }
        Commands::Logout => {
            store.clear().context("Failed to clear stored API key")?;
            println!("Stored API key removed.");
        }
    }

    Ok(())
}
