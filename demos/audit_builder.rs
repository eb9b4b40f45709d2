use clap::Parser;
use img_audit::crawlers::http::HttpFetcher;
use img_audit::events::{NullSink, StorageBridge, TableEvent};
use img_audit::store::{JsonFileStore, storage_namespace};
use img_audit::{Action, Audit, PageRecord, TableSession};
use std::error::Error;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sitemap page to audit
    #[arg(short, long)]
    url: String,

    /// Path to JSON configuration file
    #[arg(short, long)]
    config_file: Option<String>,

    /// Audit only the given page instead of its links
    #[arg(long)]
    single_page: bool,

    /// Maximum number of sitemap links (0 for no limit)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Pause before each request, in milliseconds
    #[arg(short, long)]
    delay: Option<u64>,

    /// Fetch one chunk of pages at a time in the background
    #[arg(long)]
    lazy: bool,

    /// Save the result into this JSON store
    #[arg(short, long)]
    store: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger
    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    println!("Starting audit of: {}", args.url);

    let mut audit = Audit::new(&args.url);

    // Apply configuration from file if specified
    if let Some(config_file) = args.config_file {
        println!("Loading configuration from file: {}", config_file);
        audit = audit.with_config_file(config_file)?;
    }

    // Apply command-line overrides
    if args.single_page {
        println!("Auditing the page itself");
        audit = audit.with_action(Action::UsePage);
    }

    if let Some(limit) = args.limit {
        println!("Overriding link limit: {}", limit);
        audit = audit.with_link_limit(limit);
    }

    if let Some(delay) = args.delay {
        println!("Overriding fetch delay: {}ms", delay);
        audit = audit.with_fetch_delay(delay);
    }

    if args.lazy {
        println!("Fetching lazily");
        audit = audit.with_lazy(true);
    }

    let fetcher = Arc::new(HttpFetcher::new(&audit.config().user_agent)?);
    let start_time = std::time::Instant::now();
    let dataset = if audit.config().lazy && audit.action(None) == Action::UseSitemap {
        let lazy = audit.start_lazy(fetcher, None).await?;
        if let Some(first) = lazy.navigate(1).await {
            println!("First {} pages are in", first.len());
        }
        lazy.spawn_prefetch(audit.config().prefetch_quiet()).await?;
        lazy.snapshot().unwrap_or_default()
    } else {
        audit.crawl(fetcher.as_ref(), None, audit.action(None)).await?
    };

    for record in dataset.records() {
        match record {
            PageRecord::Audited(page) => {
                let missing = page.images.iter().filter(|image| image.alt.is_empty()).count();
                println!(
                    "{}: {} images, {} with empty alt ({})",
                    page.page_link,
                    page.images.len(),
                    missing,
                    page.page_title
                );
            }
            PageRecord::Failed(page) => println!("{}: {}", page.page_link, page.error),
        }
    }

    println!(
        "Audit complete. {} pages in {:.2} seconds.",
        dataset.records().count(),
        start_time.elapsed().as_secs_f64()
    );

    if let Some(path) = args.store {
        let store = JsonFileStore::open(&path)?;
        println!("Saving to {}", store.path().display());

        let session = TableSession::new(dataset, audit.action(None), 1, NullSink);
        let action = session.action();
        let mut bridge = StorageBridge::new(store, storage_namespace(&audit.start_url()?));
        bridge.apply(&TableEvent::TableDataChange {
            table_data: session.into_dataset(),
        })?;
        bridge.apply(&TableEvent::TableRendered { action })?;
    }

    Ok(())
}
