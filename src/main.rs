//! Gallery Vault - CLI
//!
//! Command-line interface for imports, catalog queries and the content server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use gallery_vault::config::CONFIG_FILE;
use gallery_vault::{server, storage, AppConfig, GalleryVault, ImportMode, ItemFilter};

#[derive(Parser)]
#[command(name = "gallery-vault")]
#[command(author = "Karen Tonoyan")]
#[command(version = gallery_vault::VERSION)]
#[command(about = "Gallery Vault - encrypted image library")]
struct Cli {
    /// Base directory (vault, cache and catalog)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Server bind address
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write config.json with the effective settings
    Init,

    /// Run the content server
    Serve,

    /// Import a directory of images as one book
    Import {
        /// Book name
        name: String,

        /// Source directory
        source: PathBuf,

        /// Only add pages that are not in the vault yet
        #[arg(long)]
        sync: bool,
    },

    /// Import every sub-directory as its own book
    Batch {
        /// Directory holding one sub-directory per book
        root: PathBuf,
    },

    /// List books
    List {
        /// Title contains
        #[arg(short, long, default_value = "")]
        query: String,

        /// Required tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Favorites only
        #[arg(long)]
        favorites: bool,

        /// Hidden-zone password; includes hidden books
        #[arg(long)]
        hidden: Option<String>,
    },

    /// List tags with usage counts
    Tags,

    /// Show library statistics
    Stats,

    /// Protect a book with a password
    Lock {
        /// Book (directory name)
        item: String,

        #[arg(short, long)]
        password: String,
    },

    /// Remove the password from a book
    Unlock {
        /// Book (directory name)
        item: String,
    },

    /// Catalog vault directories written by older releases
    Migrate,

    /// Set the master password
    SetMaster {
        #[arg(short, long)]
        password: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.base_dir.as_deref()).context("loading config")?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    let vault = GalleryVault::open(config).context("opening vault")?;

    match cli.command {
        Commands::Init => {
            vault.config().save()?;
            let path = vault.config().base_dir.join(CONFIG_FILE);
            println!("⚙️ Config written to {}", path.display());
        }

        Commands::Serve => {
            let addr: SocketAddr = vault
                .config()
                .bind_address
                .parse()
                .with_context(|| format!("invalid bind address {}", vault.config().bind_address))?;

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(Arc::new(vault), addr))?;
        }

        Commands::Import { name, source, sync } => {
            let mode = if sync { ImportMode::Sync } else { ImportMode::Create };
            println!("📥 Importing {} from {}", name, source.display());

            let summary = vault.import(&name, &source, mode)?;
            println!(
                "✅ {} images imported into {} ({} already present, {} pages total)",
                summary.succeeded, summary.item, summary.skipped_existing, summary.total_pages
            );
            for failure in &summary.failed {
                println!("   ⚠️ {}", failure);
            }
        }

        Commands::Batch { root } => {
            println!("📚 Batch import from {}", root.display());
            let batch = vault.batch_import(&root)?;

            println!("✅ {} books imported", batch.imported.len());
            for (name, reason) in &batch.skipped {
                println!("   Skip [{}]: {}", name, reason);
            }
        }

        Commands::List {
            query,
            tags,
            favorites,
            hidden,
        } => {
            if let Some(password) = hidden {
                if !vault.access().unlock_hidden_zone(&password)? {
                    bail!("wrong hidden-zone password");
                }
            }

            let items = vault.list_items(ItemFilter {
                query,
                tags,
                only_favorite: favorites,
                ..Default::default()
            })?;

            if items.is_empty() {
                println!("📭 No books found");
            } else {
                println!("📖 Books ({}):", items.len());
                println!("{:-<60}", "");
                for item in items {
                    let hidden = if item.hidden { "👁" } else { "  " };
                    let locked = if item.locked { "🔒" } else { "  " };
                    let fav = if item.favorite { "⭐" } else { "  " };
                    println!(
                        "{} {} {} {} ({} pages) [{}]",
                        hidden,
                        locked,
                        fav,
                        item.title,
                        item.progress.total_pages,
                        item.tags.join(", ")
                    );
                }
            }
        }

        Commands::Tags => {
            let tags = vault.catalog().list_tags()?;
            println!("🏷️ Tags ({}):", tags.len());
            for tag in tags {
                println!("   {:<30} {}", tag.name, tag.count);
            }
        }

        Commands::Stats => {
            let stats = vault.stats()?;
            println!("📊 Gallery Vault Statistics");
            println!("{:-<40}", "");
            println!("Total books:      {}", stats.total_items);
            println!("Total series:     {}", stats.total_collections);
            println!("Total tags:       {}", stats.total_tags);
            println!(
                "Vault size:       {} MB",
                storage::dir_size(vault.vault_dir())? / 1024 / 1024
            );
            println!("Top tags:");
            for tag in &stats.top_tags {
                println!("   {:<28} {}", tag.name, tag.count);
            }
            println!("Recently read:");
            for item in &stats.recently_read {
                println!("   {} (page {})", item.title, item.progress.last_page);
            }
        }

        Commands::Lock { item, password } => {
            vault.access().lock_item(&item, &password)?;
            println!("🔒 {} locked", item);
        }

        Commands::Unlock { item } => {
            vault.access().remove_item_lock(&item)?;
            println!("🔓 {} unlocked", item);
        }

        Commands::Migrate => {
            let report = vault.migrate_legacy()?;
            println!(
                "📦 {} books migrated, {} already cataloged",
                report.migrated.len(),
                report.skipped.len()
            );
        }

        Commands::SetMaster { password } => {
            vault.access().set_master_password(&password)?;
            println!("🔑 Master password set");
        }
    }

    Ok(())
}
