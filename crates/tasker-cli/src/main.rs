//! Tasker CLI
//!
//! Thin wrapper around tasker-core for operating a deployment from the
//! command line. Commands act as the account named by `--user`, or as an
//! anonymous reader when it is omitted.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a key pair and point the CLI at it
//! tasker key generate --out tasker.key
//! export TASKER_KEY=$(cat tasker.key)
//!
//! # Register an account and create a public list
//! tasker account register alice alice@example.com --password hunter2
//! tasker --user alice list create garden --public
//!
//! # Add and browse tasks
//! tasker --user alice task add garden "Plant tomatoes" "After the last frost"
//! tasker --user alice task page garden
//! tasker task page garden --owner alice
//!
//! # Offline maintenance
//! tasker --user alice compact garden
//! tasker rekey --old old.key --new new.key
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tasker_core::crypto::DEFAULT_KEY_BITS;
use tasker_core::{
    rekey, AccountService, FieldCipher, ListRegistry, PageWindow, Permissions, Principal, Task,
    TaskDraft, TaskId, TaskList, TaskStatus, Tasker, TaskerConfig, TaskerError,
};

/// Tasker - Encrypted Task Lists
#[derive(Parser)]
#[command(name = "tasker")]
#[command(version)]
#[command(about = "Tasker - Encrypted Task Lists")]
#[command(
    long_about = "Multi-tenant task lists with per-list permissions. Task titles, summaries and descriptions are stored RSA-OAEP encrypted."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (default: ~/.tasker)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend: redb or snapshot
    #[arg(long, global = true)]
    backend: Option<String>,

    /// File holding the base64 PKCS#1 private key (overrides TASKER_KEY)
    #[arg(short, long, global = true)]
    key_file: Option<PathBuf>,

    /// Act as this account
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Account management
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// List management
    List {
        #[command(subcommand)]
        action: ListAction,
    },

    /// Task operations
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Physically remove deleted tasks from one of your lists
    Compact {
        /// List name
        list: String,
    },

    /// Re-encrypt every task from one key to another (run offline)
    Rekey {
        /// File with the current key
        #[arg(long)]
        old: PathBuf,
        /// File with the replacement key
        #[arg(long)]
        new: PathBuf,
    },

    /// Create the read-only public account with its welcome tasks
    SeedPublic,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Generate a new private key
    Generate {
        /// Modulus size in bits
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        /// Write the key here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the configured key's size and per-field capacity
    Capacity,
}

#[derive(Subcommand)]
enum AccountAction {
    /// Register a new account
    Register {
        handle: String,
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Open a session and print its token
    Login {
        handle: String,
        #[arg(long)]
        password: String,
    },

    /// Delete the --user account with all its lists and tasks
    Delete,
}

#[derive(Subcommand)]
enum ListAction {
    /// Create a list
    Create {
        name: String,
        /// Readable by everyone, including anonymous visitors
        #[arg(long)]
        public: bool,
    },

    /// Show the lists of an account you can read
    Show {
        /// Account to inspect (default: --user)
        owner: Option<String>,
    },

    /// Delete a list and all its tasks
    Delete { name: String },

    /// Make a list readable by anyone, or only by signed-in accounts with --off
    Public {
        name: String,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task
    Add {
        list: String,
        title: String,
        summary: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Due date as a Unix timestamp
        #[arg(long)]
        due: Option<i64>,
        /// List owner (default: --user)
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show one task in full
    Show {
        list: String,
        id: TaskId,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show a page of tasks, newest first
    Page {
        list: String,
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Page size (default: the account's display limit)
        #[arg(long)]
        size: Option<usize>,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Edit a task; omitted fields keep their value
    Edit {
        list: String,
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Active, Blocked or Done
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Delete a task
    Delete {
        list: String,
        id: TaskId,
        #[arg(long)]
        owner: Option<String>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.tasker)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tasker")
}

/// Read a key file, trimming surrounding whitespace
fn read_key_file(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;
    Ok(text.trim().to_string())
}

/// Config file, then environment, then command-line flags
fn load_config(cli: &Cli) -> Result<TaskerConfig> {
    let config = match &cli.config {
        Some(path) => TaskerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TaskerConfig {
            data_dir: default_data_dir(),
            ..Default::default()
        },
    };
    let mut config = config.apply_env()?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend = backend.parse()?;
    }
    if let Some(path) = &cli.key_file {
        config.key = Some(read_key_file(path)?);
    }
    Ok(config)
}

/// Principal for `--user`, or the anonymous reader
fn acting_as(accounts: &AccountService, user: Option<&str>) -> Result<Principal> {
    match user {
        Some(handle) => {
            let account = accounts.get_account(handle)?;
            Ok(Principal::new(account.handle, account.permissions))
        }
        None => Ok(Principal::anonymous()),
    }
}

/// The principal must be a real account
fn require_user(principal: &Principal) -> Result<()> {
    if principal.is_anonymous() {
        anyhow::bail!("This command needs --user");
    }
    Ok(())
}

/// Explicit `--owner`, else the acting account
fn owner_or_user(owner: Option<String>, principal: &Principal) -> Result<String> {
    match owner {
        Some(owner) => Ok(owner),
        None if !principal.is_anonymous() => Ok(principal.handle.clone()),
        None => anyhow::bail!("--owner is required without --user"),
    }
}

/// Who can read a list, spelled out from its mask
fn audience(list: &TaskList) -> &'static str {
    if list.is_public() {
        "anyone, including anonymous visitors"
    } else if list.permissions.has(Permissions::READ_TASK) {
        "signed-in accounts only"
    } else {
        "its owner only"
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_task(task: &Task) {
    println!("Task {} in {}/{}:", task.id, task.owner, task.list);
    println!("  Title: {}", task.title);
    println!("  Summary: {}", task.summary);
    println!("  Status: {}", task.status);
    println!("  Creator: {}", task.creator);
    println!("  Created: {}", format_timestamp(task.created_at));
    if let Some(due) = task.due {
        println!("  Due: {}", format_timestamp(due));
    }
    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<TaskerError>() {
            if err.is_internal() {
                tracing::error!(error = %err, "Command failed");
            }
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let user = cli.user.clone();

    match cli.command {
        Commands::Key { action } => match action {
            KeyAction::Generate { bits, out } => {
                let cipher = FieldCipher::generate(bits)?;
                let text = cipher.to_base64_pkcs1()?;
                match out {
                    Some(path) => {
                        std::fs::write(&path, format!("{}\n", text))
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Wrote {}-bit key to {}", bits, path.display());
                    }
                    None => println!("{}", text),
                }
            }

            KeyAction::Capacity => {
                let cipher = config.load_cipher()?;
                println!("Key size: {} bits", cipher.key_bits());
                println!("Max field size: {} bytes", cipher.max_plaintext_len());
            }
        },

        Commands::Account { action } => {
            let backend = config.open_backend()?;
            let accounts = AccountService::new(backend, config.session_ttl_hours)
                .with_account_defaults(config.account_defaults());

            match action {
                AccountAction::Register {
                    handle,
                    email,
                    password,
                } => {
                    let account = accounts.register(&handle, &email, &password)?;
                    println!("Registered account: {}", account.handle);
                    println!("  Default list: {}", account.config.default_list);
                    println!("  Permissions: {}", account.permissions);
                }

                AccountAction::Login { handle, password } => {
                    let session = accounts.login(&handle, &password)?;
                    println!("Token: {}", session.token);
                    println!("Expires: {}", format_timestamp(session.expires_at));
                }

                AccountAction::Delete => {
                    let principal = acting_as(&accounts, user.as_deref())?;
                    require_user(&principal)?;
                    accounts.delete_account(&principal, &principal.handle)?;
                    println!("Deleted account: {}", principal.handle);
                }
            }
        }

        Commands::List { action } => {
            let backend = config.open_backend()?;
            let accounts = AccountService::new(backend.clone(), config.session_ttl_hours);
            let registry = ListRegistry::new(backend);
            let principal = acting_as(&accounts, user.as_deref())?;

            match action {
                ListAction::Create { name, public } => {
                    require_user(&principal)?;
                    let list = registry.create_list(&principal, &name, public)?;
                    println!("Created list: {}/{}", list.owner, list.name);
                    println!("  Permissions: {}", list.permissions);
                    println!("  Readable by: {}", audience(&list));
                }

                ListAction::Show { owner } => {
                    let owner = owner_or_user(owner, &principal)?;
                    let lists = registry.visible_lists(&principal, &owner)?;
                    if lists.is_empty() {
                        println!("No visible lists for {}.", owner);
                    } else {
                        println!("Lists of {}:", owner);
                        for list in lists {
                            println!(
                                "  {}  [{}]  next id {}",
                                list.name, list.permissions, list.task_number
                            );
                        }
                    }
                }

                ListAction::Delete { name } => {
                    require_user(&principal)?;
                    registry.delete_list(&principal, &name)?;
                    println!("Deleted list: {}/{}", principal.handle, name);
                }

                ListAction::Public { name, off } => {
                    require_user(&principal)?;
                    let list = registry.get_list(&principal.handle, &name)?;
                    let permissions = if off {
                        list.permissions.without(Permissions::PUBLIC_LIST)
                    } else {
                        list.permissions.with(Permissions::PUBLIC_LIST)
                    };
                    let list = registry.set_list_permissions(&principal, &name, permissions)?;
                    println!(
                        "List {}/{} is now readable by {}",
                        list.owner,
                        list.name,
                        audience(&list)
                    );
                }
            }
        }

        Commands::Task { action } => {
            let tasker = Tasker::open(config)?;
            let principal = acting_as(tasker.accounts(), user.as_deref())?;
            let store = tasker.tasks();

            match action {
                TaskAction::Add {
                    list,
                    title,
                    summary,
                    description,
                    due,
                    owner,
                } => {
                    let owner = owner_or_user(owner, &principal)?;
                    let mut draft = TaskDraft::new(title, summary).with_description(description);
                    if let Some(due) = due {
                        draft = draft.with_due(due);
                    }
                    let task = store.create(&principal, &owner, &list, draft).await?;
                    println!("Created task {} in {}/{}", task.id, task.owner, task.list);
                }

                TaskAction::Show { list, id, owner } => {
                    let owner = owner_or_user(owner, &principal)?;
                    let task = store.fetch_one(&principal, &owner, &list, id).await?;
                    print_task(&task);
                }

                TaskAction::Page {
                    list,
                    page,
                    size,
                    owner,
                } => {
                    let owner = owner_or_user(owner, &principal)?;
                    let size = match size {
                        Some(size) => size,
                        None => tasker.accounts().get_account(&owner)?.config.task_display_limit,
                    };

                    let tasks = store
                        .fetch_page(&principal, &owner, &list, page, size)
                        .await?;
                    if tasks.is_empty() {
                        println!("No tasks on page {} of {}/{}.", page, owner, list);
                    } else {
                        println!("{}/{} page {}:", owner, list, page);
                        for task in &tasks {
                            println!(
                                "  {:>4}  {}  [{}] {} - {}",
                                task.id,
                                format_timestamp(task.created_at),
                                task.status,
                                task.title,
                                task.summary
                            );
                        }
                    }

                    let next_id = tasker.registry().get_list(&owner, &list)?.task_number;
                    if PageWindow::new(next_id, page, size).has_older() {
                        println!("Older tasks: --page {}", page + 1);
                    }
                }

                TaskAction::Edit {
                    list,
                    id,
                    title,
                    summary,
                    description,
                    status,
                    owner,
                } => {
                    let owner = owner_or_user(owner, &principal)?;
                    let current = store.fetch_one(&principal, &owner, &list, id).await?;
                    let status = match status {
                        Some(s) => s.parse::<TaskStatus>()?,
                        None => current.status,
                    };

                    let mut draft = TaskDraft::new(
                        title.unwrap_or(current.title),
                        summary.unwrap_or(current.summary),
                    )
                    .with_description(description.unwrap_or(current.description))
                    .with_status(status);
                    draft.due = current.due;

                    let task = store.update(&principal, &owner, &list, id, draft).await?;
                    println!("Updated task {} in {}/{}", task.id, task.owner, task.list);
                    println!("  Status: {}", task.status);
                }

                TaskAction::Delete { list, id, owner } => {
                    let owner = owner_or_user(owner, &principal)?;
                    store.delete(&principal, &owner, &list, id).await?;
                    println!("Deleted task {} from {}/{}", id, owner, list);
                }
            }
        }

        Commands::Compact { list } => {
            let tasker = Tasker::open(config)?;
            let principal = acting_as(tasker.accounts(), user.as_deref())?;
            require_user(&principal)?;
            let removed = tasker
                .tasks()
                .compact(&principal, &principal.handle, &list)
                .await?;
            println!("Removed {} deleted task(s) from {}/{}", removed, principal.handle, list);
        }

        Commands::Rekey { old, new } => {
            let old = FieldCipher::from_base64_pkcs1(&read_key_file(&old)?)?;
            let new = FieldCipher::from_base64_pkcs1(&read_key_file(&new)?)?;
            let backend = config.open_backend()?;

            let report = rekey::rotate(backend.as_ref(), &old, &new)?;
            println!("Rotated: {}", report.rotated);
            println!("Skipped (deleted): {}", report.skipped);
            if !report.is_clean() {
                println!("Failed: {}", report.failed.len());
                for (key, reason) in &report.failed {
                    println!("  {}: {}", key, reason);
                }
                anyhow::bail!("{} task(s) could not be rotated", report.failed.len());
            }
        }

        Commands::SeedPublic => {
            let tasker = Tasker::open(config)?;
            let account = tasker.seed_public().await?;
            let list = tasker
                .registry()
                .get_list(&account.handle, &account.config.default_list)?;
            println!(
                "Seeded account {} with {} task(s) in {}",
                account.handle, list.task_number, list.name
            );
        }
    }

    Ok(())
}
