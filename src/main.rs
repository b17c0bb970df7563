use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
#[cfg(unix)]
use daemonize::Daemonize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, RwLock};
use sysinfo::{Pid, System};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{load_config, Config};
use crate::extractor::{MediaExtractor, YtDlp};

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod models;

pub type ConfigState = Arc<RwLock<Config>>;

/// Shared per-request context: the runtime configuration and the extraction
/// client behind its trait seam.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigState,
    pub extractor: Arc<dyn MediaExtractor>,
}

// --- Command-Line Argument Parsing ---
#[derive(Parser, Debug)]
#[command(author, version, about = "A web agent for listing and downloading media formats.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manages the server process.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServerAction {
    /// Start the server as a background process.
    Start,
    /// Stop the background server process.
    Stop,
    /// Restart the background server process.
    Restart,
    /// Run the server in the foreground.
    Run,
    /// Check the status of the background server process.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Server { action } => match action {
            ServerAction::Start => start_server()?,
            ServerAction::Stop => stop_server()?,
            ServerAction::Restart => {
                stop_server()?;
                std::thread::sleep(std::time::Duration::from_secs(1));
                start_server()?;
            }
            ServerAction::Run => run_server().await?,
            ServerAction::Status => check_status()?,
        },
    }

    Ok(())
}

// --- Server Action Functions ---

/// The core function that runs the Axum web server.
async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = load_config().await?;
    let state = AppState {
        config: Arc::new(RwLock::new(config)),
        extractor: Arc::new(YtDlp::new()),
    };
    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port_str = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("{}:{}", host, port_str);
    let app = Router::new()
        .route("/", get(handlers::index))
        .route("/get-video-info", post(handlers::get_video_info))
        .route("/download", post(handlers::download))
        .route("/config", get(handlers::get_config).post(handlers::update_config))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state);
    tracing::info!("Starting server in foreground, listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Starts the server as a detached background process.
fn start_server() -> anyhow::Result<()> {
    if running_pid()?.is_some() {
        println!("Server is already running.");
        return Ok(());
    }

    let pid_file = pid_file_path()?;
    let myself = env::current_exe()?;
    println!("Starting server in the background...");

    #[cfg(unix)]
    {
        // Detach, then re-launch ourselves in foreground mode.
        match Daemonize::new().pid_file(&pid_file).start() {
            Ok(_) => {
                Command::new(&myself).arg("server").arg("run").spawn()?;
            }
            Err(e) => eprintln!("Error, failed to daemonize: {}", e),
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;

        let child = Command::new(&myself)
            .arg("server")
            .arg("run")
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()?;

        fs::write(&pid_file, child.id().to_string())?;
    }

    println!("Server started. PID file at: {}", pid_file.display());
    Ok(())
}

/// Stops the background server process.
fn stop_server() -> anyhow::Result<()> {
    let pid_file = pid_file_path()?;
    match running_pid()? {
        Some(pid) => {
            println!("Stopping server process with PID: {}", pid);
            let system = System::new_all();
            if let Some(process) = system.process(Pid::from_u32(pid)) {
                process.kill();
            }
            fs::remove_file(&pid_file)?;
            println!("Server stopped.");
        }
        None => {
            if pid_file.exists() {
                fs::remove_file(&pid_file)?;
                println!("Removed stale PID file; server was not running.");
            } else {
                println!("Server is not running.");
            }
        }
    }
    Ok(())
}

/// Reports whether the background server process is alive.
fn check_status() -> anyhow::Result<()> {
    match running_pid()? {
        Some(pid) => println!("Server is running with PID: {}", pid),
        None => println!("Server is not running."),
    }
    Ok(())
}

// --- Helper Functions ---

/// Path of the server's PID file, creating its directory if needed.
fn pid_file_path() -> anyhow::Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "vidgrab", "vidgrab")
        .ok_or_else(|| anyhow::anyhow!("Could not find a valid project directory"))?;
    let data_dir = project_dirs.data_local_dir();
    fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("server.pid"))
}

/// The recorded PID, if the PID file exists and the process is still alive.
fn running_pid() -> anyhow::Result<Option<u32>> {
    let pid_file = pid_file_path()?;
    if !pid_file.exists() {
        return Ok(None);
    }
    let pid: u32 = fs::read_to_string(pid_file)?.trim().parse()?;
    let system = System::new_all();
    Ok(system.process(Pid::from_u32(pid)).is_some().then_some(pid))
}
