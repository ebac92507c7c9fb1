use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use ngxdash::api::Lifecycle;
use ngxdash::config::Config;
use ngxdash::routes::{Router, View};
use ngxdash::store::StatusStore;
use ngxdash::views::{self, ConfigEditor, StatusLog};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Lines kept by the live status log
const LOG_CAPACITY: usize = 500;

#[derive(Debug, Parser)]
#[command(name = "ngxdash", version, about = "Control and monitor nginx through its manager backend")]
struct Cli {
    /// Config file (default: <config dir>/ngxdash/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file and NGXDASH_URL
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current nginx status
    Status,
    /// Start nginx
    Start,
    /// Stop nginx
    Stop,
    /// Restart nginx
    Restart,
    /// Reload the nginx configuration
    Reload,
    /// Read, validate and write the nginx config file
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage config backups
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Live dashboard over the status channel
    Watch,
    /// Live status log
    Logs,
    /// Print the route table
    Routes,
    /// Render the page mounted at a route path, e.g. "/backup"
    View { path: String },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the current config file
    Show,
    /// Print the backend's config template
    Template,
    /// Validate a local file against nginx
    Validate { file: PathBuf },
    /// Upload a local file as the new config
    Save { file: PathBuf },
    /// Edit the config in $VISUAL / $EDITOR, validate, then save
    Edit,
}

#[derive(Debug, Subcommand)]
enum BackupCommand {
    /// List backups, newest first
    List,
    /// Restore a backup over the current config
    Restore { id: String },
    /// Delete a backup
    Delete { id: String },
    /// Download a backup file
    Download {
        id: String,
        /// Output path (default: the backup ID in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    config.apply_env();
    if let Some(url) = cli.url {
        config.server.base_url = url;
    }
    config.validate()?;

    // Initialize logging; stdout is reserved for page output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(base_url = %config.server.base_url, "Configuration loaded");

    let store = StatusStore::from_config(&config)?;

    match cli.command {
        Command::Status => {
            store.fetch_status().await;
            if let Some(err) = store.error() {
                bail!(err);
            }
            print!("{}", views::render_dashboard(&store.snapshot()));
        }
        Command::Start => run_action(&store, Lifecycle::Start).await?,
        Command::Stop => run_action(&store, Lifecycle::Stop).await?,
        Command::Restart => run_action(&store, Lifecycle::Restart).await?,
        Command::Reload => run_action(&store, Lifecycle::Reload).await?,
        Command::Config(cmd) => handle_config(&store, cmd).await?,
        Command::Backup(cmd) => handle_backup(&store, cmd).await?,
        Command::Watch => watch(&store, config.push.enabled).await?,
        Command::Logs => follow_logs(&store, config.push.enabled).await?,
        Command::Routes => print_routes(),
        Command::View { path } => render_view(&store, &path).await?,
    }

    Ok(())
}

async fn run_action(store: &StatusStore, action: Lifecycle) -> anyhow::Result<()> {
    let result = store.run_action(action).await;
    if !result.success {
        bail!(result.message);
    }
    println!("{}", views::render_action(&result));
    println!();
    print!("{}", views::render_dashboard(&store.snapshot()));
    Ok(())
}

async fn handle_config(store: &StatusStore, cmd: ConfigCommand) -> anyhow::Result<()> {
    let api = store.api();

    match cmd {
        ConfigCommand::Show => {
            let mut editor = ConfigEditor::new(api.clone());
            editor.load().await?;
            print!("{}", views::render_config(&editor));
        }
        ConfigCommand::Template => {
            print!("{}", api.get_template().await?);
        }
        ConfigCommand::Validate { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = api.validate_config(&content).await?;
            if !report.valid {
                bail!("✗ {}", report.message);
            }
            println!("✓ {}", report.message);
        }
        ConfigCommand::Save { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("✓ {}", api.save_config(&content).await?);
        }
        ConfigCommand::Edit => edit_config(ConfigEditor::new(api.clone())).await?,
    }

    Ok(())
}

async fn edit_config(mut editor: ConfigEditor) -> anyhow::Result<()> {
    editor.load().await?;

    let mut file = tempfile::Builder::new()
        .prefix("nginx-")
        .suffix(".conf")
        .tempfile()
        .context("Failed to create temporary file")?;
    file.write_all(editor.content().as_bytes())?;
    file.flush()?;

    let editor_cmd = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());
    let mut parts = shell_words::split(&editor_cmd)
        .with_context(|| format!("Invalid editor command: {}", editor_cmd))?;
    if parts.is_empty() {
        bail!("Editor command is empty");
    }
    let program = parts.remove(0);

    let status = tokio::process::Command::new(&program)
        .args(&parts)
        .arg(file.path())
        .status()
        .await
        .with_context(|| format!("Failed to launch editor '{}'", program))?;
    if !status.success() {
        bail!("Editor exited with {}", status);
    }

    let edited = std::fs::read_to_string(file.path())?;
    editor.set_content(edited);
    if !editor.is_dirty() {
        println!("No changes");
        return Ok(());
    }

    let report = editor.validate().await?;
    if !report.valid {
        bail!("✗ {} (not saved)", report.message);
    }
    println!("✓ {}", report.message);
    println!("✓ {}", editor.save().await?);
    Ok(())
}

async fn handle_backup(store: &StatusStore, cmd: BackupCommand) -> anyhow::Result<()> {
    let api = store.api();

    match cmd {
        BackupCommand::List => {
            print!("{}", views::render_backups(&api.list_backups().await?));
        }
        BackupCommand::Restore { id } => {
            println!("✓ {}", api.restore_backup(&id).await?);
        }
        BackupCommand::Delete { id } => {
            println!("✓ {}", api.delete_backup(&id).await?);
        }
        BackupCommand::Download { id, output } => {
            let bytes = api.download_backup(&id).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&id));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "✓ Saved {} ({})",
                path.display(),
                views::format_size(bytes.len() as u64)
            );
        }
    }

    Ok(())
}

/// Start receiving live updates: the push channel if enabled, else polling
fn start_updates(store: &StatusStore, push_enabled: bool) -> Option<tokio::task::JoinHandle<()>> {
    if push_enabled {
        store.connect();
        return None;
    }

    let store = store.clone();
    let interval = store.push_settings().reconnect_delay.max(Duration::from_secs(1));
    info!(interval_ms = interval.as_millis() as u64, "Push channel disabled, polling status");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.fetch_status().await;
        }
    }))
}

async fn watch(store: &StatusStore, push_enabled: bool) -> anyhow::Result<()> {
    let mut updates = store.subscribe();
    store.fetch_status().await;
    let poller = start_updates(store, push_enabled);

    loop {
        let state = updates.borrow_and_update().clone();
        print!("\x1B[2J\x1B[H");
        println!("{}", views::render_nav(View::Dashboard));
        println!();
        print!("{}", views::render_dashboard(&state));
        std::io::stdout().flush()?;

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    store.disconnect();
    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}

async fn follow_logs(store: &StatusStore, push_enabled: bool) -> anyhow::Result<()> {
    let mut updates = store.subscribe();
    let mut log = StatusLog::new(LOG_CAPACITY);
    store.fetch_status().await;
    let poller = start_updates(store, push_enabled);

    println!("{}", views::render_nav(View::LogViewer));
    println!();

    loop {
        let state = updates.borrow_and_update().clone();
        let added = log.observe(&state, Utc::now());
        let lines: Vec<&str> = log.lines().collect();
        for line in &lines[lines.len() - added..] {
            println!("{}", line);
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    store.disconnect();
    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}

fn print_routes() {
    println!("{:<9} {:<15} {:<16} ICON", "PATH", "NAME", "TITLE");
    for route in Router.routes() {
        println!(
            "{:<9} {:<15} {:<16} {}",
            route.path, route.name, route.meta.title, route.meta.icon
        );
    }
}

async fn render_view(store: &StatusStore, path: &str) -> anyhow::Result<()> {
    let Some(route) = Router.resolve(path) else {
        bail!("No page is mounted at '{}'", path);
    };

    println!("{}", views::render_nav(route.view));
    println!();

    match route.view {
        View::Dashboard => {
            store.fetch_status().await;
            print!("{}", views::render_dashboard(&store.snapshot()));
        }
        View::ConfigEditor => {
            let mut editor = ConfigEditor::new(store.api().clone());
            editor.load().await?;
            print!("{}", views::render_config(&editor));
        }
        View::LogViewer => {
            store.fetch_status().await;
            let mut log = StatusLog::new(LOG_CAPACITY);
            log.observe(&store.snapshot(), Utc::now());
            print!("{}", views::render_log(&log));
        }
        View::BackupManager => {
            print!("{}", views::render_backups(&store.api().list_backups().await?));
        }
    }

    Ok(())
}
