use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;

use rssview::config::{AppPaths, Config};
use rssview::feed::write_link_list;
use rssview::palette::Palette;
use rssview::storage::{Group, Item, Store, TODAY_GROUP_TITLE};
use rssview::sync::{AddOutcome, SyncProgress, Syncer};
use rssview::util::validate_url_for_open;

#[derive(Parser, Debug)]
#[command(name = "rssview", about = "Terminal RSS/Atom reader with grouped, colored feeds")]
struct Args {
    /// Application directory (defaults to $RSSVIEW_HOME, then the user config dir)
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscribed feeds and groups
    List,
    /// Show the items of a feed (by link) or a group (by title)
    Show {
        /// Feed link, group title, or "today"
        target: String,
    },
    /// Subscribe to a feed URL or shell command
    Add { identity: String },
    /// Subscribe to every identity in the import list
    Import {
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Write every feed link to the export list
    Export {
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Refetch every feed
    Refresh,
    /// Create a group, or add feeds to an existing one
    Group {
        title: String,
        #[arg(required = true)]
        links: Vec<String>,
    },
    /// Unsubscribe from a feed
    DeleteFeed { link: String },
    /// Delete a group (its feeds stay)
    DeleteGroup { title: String },
    /// Set a feed's color, or pick a new random one
    Color { link: String, code: Option<u8> },
    /// Print the colors allowed by the config
    Colors,
    /// Open the n-th item (1-based) of a feed in the browser
    Open { link: String, n: usize },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let paths = AppPaths::resolve(args.root).context("Failed to resolve application directory")?;
    paths
        .ensure()
        .with_context(|| format!("Failed to create {}", paths.data_dir.display()))?;
    let config = Config::load_or_init(&paths.config_file)
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;

    let mut store = Store::open(&paths.data_dir).context("Failed to load feed store")?;
    let syncer = Syncer::from_config(&config, &paths).context("Failed to build HTTP client")?;
    let palette = syncer.palette();

    match args.command {
        Command::List => {
            for feed in store.feeds() {
                println!("{}  {}", palette.paint(feed.color, &feed.title), feed.link);
            }
            println!();
            println!("[{}]", TODAY_GROUP_TITLE);
            for group in store.groups() {
                println!("[{}] {} feeds", group.title, group.feed_links.len());
            }
        }
        Command::Show { target } => {
            let items = if target.eq_ignore_ascii_case("today") {
                store.group_items(TODAY_GROUP_TITLE)
            } else if store.contains_feed(&target) {
                store.feed_items(&target)
            } else if store.group(&target).is_some() || target == TODAY_GROUP_TITLE {
                store.group_items(&target)
            } else {
                anyhow::bail!("No feed or group named '{}'", target);
            };
            print_items(&store, palette, &items);
        }
        Command::Add { identity } => match syncer.add_feed(&mut store, &identity).await? {
            AddOutcome::Added(link) => {
                let title = store.feed(&link).map(|f| f.title.as_str()).unwrap_or_default();
                println!("Added {}", title);
            }
            AddOutcome::AlreadyPresent => println!("Already subscribed to {}", identity),
            AddOutcome::Failed(failure) => anyhow::bail!("Failed to add feed: {}", failure),
        },
        Command::Import { file } => {
            let list = file.unwrap_or_else(|| paths.import_list.clone());
            let (syncer, store) = (&syncer, &mut store);
            let report = with_progress(|tx| async move {
                syncer.import_from_list(store, &list, Some(&tx)).await
            })
            .await?;
            println!(
                "Imported {} of {} listed feeds ({} already subscribed)",
                report.added.len(),
                report.listed,
                report.already_present
            );
            for failure in &report.failed {
                eprintln!("  {}", failure);
            }
        }
        Command::Export { file } => {
            let out = file.unwrap_or_else(|| paths.export_list.clone());
            let count = write_link_list(&out, store.export_links())
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Exported {} feeds to {}", count, out.display());
        }
        Command::Refresh => {
            let (syncer, store) = (&syncer, &mut store);
            let report = with_progress(|tx| async move {
                syncer.refresh_all(store, Some(&tx)).await
            })
            .await?;
            println!("Updated {} of {} feeds", report.updated.len(), report.total);
            for failure in &report.failed {
                eprintln!("  {}", failure);
            }
        }
        Command::Group { title, links } => {
            if let Some(unknown) = links.iter().find(|l| !store.contains_feed(l)) {
                anyhow::bail!("Not subscribed to '{}'", unknown);
            }
            store.add_or_update_group(Group::new(title.clone(), links))?;
            println!("Saved group {}", title);
        }
        Command::DeleteFeed { link } => {
            store.delete_feed(&link)?;
            println!("Deleted {}", link);
        }
        Command::DeleteGroup { title } => {
            store.delete_group(&title)?;
            println!("Deleted group {}", title);
        }
        Command::Color { link, code } => {
            let code = match code {
                Some(c) if !palette.is_allowed(c) => {
                    anyhow::bail!("Color {} is outside the configured range (see `rssview colors`)", c)
                }
                Some(c) => c,
                None => palette.random(),
            };
            store.set_feed_color(&link, code)?;
            println!("{}", palette.paint(code, &link));
        }
        Command::Colors => print_colors(palette),
        Command::Open { link, n } => {
            let items = store.feed_items(&link);
            let item = n
                .checked_sub(1)
                .and_then(|i| items.get(i))
                .with_context(|| format!("Feed has {} items", items.len()))?;
            let url = validate_url_for_open(&item.link)
                .with_context(|| format!("Refusing to open '{}'", item.link))?;
            open::that(url.as_str()).context("Failed to open browser")?;
        }
    }

    Ok(())
}

/// Run a sync cycle while printing its progress to stderr.
async fn with_progress<F, Fut, T>(cycle: F) -> Result<T>
where
    F: FnOnce(mpsc::Sender<SyncProgress>) -> Fut,
    Fut: std::future::Future<Output = Result<T, rssview::sync::SyncError>>,
{
    let (tx, mut rx) = mpsc::channel::<SyncProgress>(32);
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if progress.failed {
                eprintln!("{}  failed: {}", progress, progress.link);
            } else {
                eprintln!("{}", progress);
            }
        }
    });

    let result = cycle(tx).await;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Progress printer task failed");
    }
    Ok(result?)
}

fn print_items(store: &Store, palette: &Palette, items: &[Item]) {
    for (i, item) in items.iter().enumerate() {
        let date = item
            .published
            .map(|p| p.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let source = store
            .item_parent(item)
            .map(|f| f.title.as_str())
            .unwrap_or_default();
        println!(
            "{:>3}. {}  {}  ({})",
            i + 1,
            date,
            palette.paint(item.color, &item.title),
            source
        );
        if !item.link.is_empty() {
            println!("     {}", item.link);
        }
    }
}

fn print_colors(palette: &Palette) {
    for (i, code) in palette.allowed().iter().enumerate() {
        print!("{} ", palette.paint(*code, &format!("{:>3}", code)));
        if (i + 1) % 16 == 0 {
            println!();
        }
    }
    println!();
}
