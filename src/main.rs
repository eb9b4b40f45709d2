use clap::Parser;
use img_audit::cache::load_stored;
use img_audit::config::{self, AuditConfig, FetcherKind};
use img_audit::crawlers::Fetcher;
use img_audit::crawlers::http::HttpFetcher;
use img_audit::crawlers::webdriver::WebDriverFetcher;
use img_audit::error::StoreError;
use img_audit::events::{ChannelSink, EventSink, StorageBridge, TableEvent};
use img_audit::host::HostDocument;
use img_audit::locate::locate_deep_link;
use img_audit::pagination::PaginationState;
use img_audit::render;
use img_audit::session::RowControls;
use img_audit::store::{self, JsonFileStore};
use img_audit::utils::report_filename;
use img_audit::{Action, Audit, AuditError, Dataset, Result, TableAction, TableSession};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use url::Url;

mod args;
use args::{Args, ClearArgs, Command, CrawlArgs, LocateArgs, RenderArgs, ReviewArgs};

type Bridge = JoinHandle<std::result::Result<JsonFileStore, StoreError>>;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let result = match args.command {
        Command::Crawl(crawl_args) => crawl(crawl_args, args.store).await,
        Command::Render(render_args) => render_stored(render_args, store_path(args.store)).await,
        Command::Review(review_args) => review(review_args, store_path(args.store)).await,
        Command::Clear(clear_args) => clear(clear_args, store_path(args.store)),
        Command::Locate(locate_args) => locate(locate_args).await,
    };

    if let Err(e) = result {
        ::log::error!("{}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn store_path(store: Option<PathBuf>) -> PathBuf {
    store.unwrap_or_else(config::default_store_path)
}

fn spawn_bridge(
    store: JsonFileStore,
    namespace: String,
    rx: UnboundedReceiver<TableEvent>,
) -> Bridge {
    tokio::spawn(StorageBridge::new(store, namespace).run(rx))
}

/// Waits until every event of the finished session has been persisted
async fn finish_bridge(bridge: Bridge) -> Result<()> {
    match bridge.await {
        Ok(result) => {
            result?;
            Ok(())
        }
        Err(e) => {
            ::log::error!("Storage bridge task failed: {}", e);
            Ok(())
        }
    }
}

fn write_report(out: &Path, html: &str) -> Result<()> {
    std::fs::write(out, html)?;
    ::log::info!("Wrote {}", out.display());
    Ok(())
}

fn go_to_page<E: EventSink>(session: &mut TableSession<E>, page: Option<usize>) -> Result<()> {
    match page {
        Some(page) if page != session.pagination().current_page() => session.change_page(page),
        _ => Ok(()),
    }
}

/// Renders the requested page of a session to `out` and announces it
fn present<E: EventSink>(session: &mut TableSession<E>, page: Option<usize>, out: &Path) -> Result<()> {
    go_to_page(session, page)?;
    let html = session.render()?;
    write_report(out, &html)?;
    session.rendered();

    let pagination = session.pagination();
    println!(
        "Rendered page {} of {} to {}",
        pagination.current_page(),
        pagination.total_pages(),
        out.display()
    );
    Ok(())
}

async fn crawl(args: CrawlArgs, store: Option<PathBuf>) -> Result<()> {
    let config = args.audit_config(store)?;
    let host = args
        .host_document
        .as_ref()
        .map(HostDocument::from_file)
        .transpose()?;

    match config.fetcher {
        FetcherKind::Http => {
            let fetcher = Arc::new(HttpFetcher::new(&config.user_agent)?);
            crawl_with(fetcher, config, host.as_ref(), &args).await
        }
        FetcherKind::WebDriver => {
            println!("Note: WebDriver fetching requires a WebDriver server (e.g., ChromeDriver).");
            println!(
                "Set WEBDRIVER_URL environment variable if not using {}",
                config.webdriver_url
            );
            let fetcher = Arc::new(WebDriverFetcher::new(&config.webdriver_url));
            let result = crawl_with(Arc::clone(&fetcher), config, host.as_ref(), &args).await;
            fetcher.close().await;
            result
        }
    }
}

async fn crawl_with<F: Fetcher + 'static>(
    fetcher: Arc<F>,
    config: AuditConfig,
    host: Option<&HostDocument>,
    args: &CrawlArgs,
) -> Result<()> {
    let audit = Audit::new(&config.start_url).with_config(config);
    let namespace = audit.namespace()?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(report_filename(&audit.config().start_url, args.page.unwrap_or(1))));
    let store = JsonFileStore::open(&audit.config().store_path)?;
    let action = audit.action(host);
    let (sink, rx) = ChannelSink::new();

    let lazy = audit.config().lazy
        && action == Action::UseSitemap
        && (args.fresh || audit.cached(host, &store)?.is_none());

    let mut session = if lazy {
        let dataset = crawl_lazily(&audit, fetcher, host, args.page.unwrap_or(1), &out).await?;
        let session = TableSession::new(dataset, action, 1, sink);
        session.notify_data_change();
        session
    } else if args.fresh {
        let dataset = audit.crawl(fetcher.as_ref(), host, action).await?;
        let session = TableSession::new(dataset, action, 1, sink);
        session.notify_data_change();
        session
    } else {
        audit.run(fetcher, host, &store, sink).await?
    };

    let bridge = spawn_bridge(store, namespace, rx);
    let result = present(&mut session, args.page, &out);
    drop(session);
    finish_bridge(bridge).await?;
    result
}

/// Renders the requested page as soon as its chunk is in, then lets the
/// pre-fetcher finish the rest and returns the complete dataset
async fn crawl_lazily<F: Fetcher + 'static>(
    audit: &Audit,
    fetcher: Arc<F>,
    host: Option<&HostDocument>,
    page: usize,
    out: &Path,
) -> Result<Dataset> {
    let lazy = audit.start_lazy(fetcher, host).await?;
    let prefetch = lazy.spawn_prefetch(audit.config().prefetch_quiet());
    let pagination = PaginationState::new(page, lazy.total_pages());

    if let Some(records) = lazy.navigate(pagination.current_page()).await {
        let html = render::render_page(&records, &pagination, &RowControls::default())?;
        write_report(out, &html)?;
        println!(
            "Page {} is ready in {}; fetching the remaining {} pages",
            pagination.current_page(),
            out.display(),
            lazy.total_pages().saturating_sub(lazy.ready_pages())
        );
    }

    if let Err(e) = prefetch.await {
        ::log::warn!("Pre-fetch task failed: {}", e);
    }

    Ok(lazy.snapshot().unwrap_or_else(|| {
        ::log::warn!("Some pages were never fetched; keeping no data");
        Dataset::default()
    }))
}

/// Stored dataset, crawl mode and last viewed page of `url`
fn stored_audit(store: &JsonFileStore, url: &Url) -> Result<(String, Dataset, Action, usize)> {
    let namespace = store::storage_namespace(url);
    let stored = load_stored(store, &namespace)?;
    let dataset = stored
        .data
        .ok_or_else(|| AuditError::NothingStored(namespace.clone()))?;
    Ok((
        namespace,
        dataset,
        stored.action.unwrap_or_default(),
        stored.page.unwrap_or(1),
    ))
}

async fn render_stored(args: RenderArgs, store_path: PathBuf) -> Result<()> {
    let url = Url::parse(&args.url)?;
    let store = JsonFileStore::open(&store_path)?;
    let (namespace, dataset, action, last_page) = stored_audit(&store, &url)?;
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(report_filename(&args.url, args.page.unwrap_or(last_page))));

    let (sink, rx) = ChannelSink::new();
    let bridge = spawn_bridge(store, namespace, rx);
    let mut session = TableSession::new(dataset, action, last_page, sink);

    let result = present(&mut session, args.page, &out);
    drop(session);
    finish_bridge(bridge).await?;
    result
}

async fn review(args: ReviewArgs, store_path: PathBuf) -> Result<()> {
    let url = Url::parse(&args.url)?;
    let store = JsonFileStore::open(&store_path)?;
    let (namespace, dataset, action, last_page) = stored_audit(&store, &url)?;

    let (sink, rx) = ChannelSink::new();
    let bridge = spawn_bridge(store, namespace, rx);
    let mut session = TableSession::new(dataset, action, last_page, sink);

    let text = args.text.clone();
    let result = go_to_page(&mut session, args.page).and_then(|()| {
        let mut changed = false;
        for kind in args.kind.actions(text) {
            changed = session.dispatch(TableAction::new(kind, args.page_index, args.image_index))?;
        }
        Ok(changed)
    });
    let page = session.pagination().current_page();
    drop(session);
    finish_bridge(bridge).await?;

    println!("{}", args.outcome(result?, page));
    Ok(())
}

fn confirm(question: &str) -> std::io::Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn clear(args: ClearArgs, store_path: PathBuf) -> Result<()> {
    let url = Url::parse(&args.url)?;
    let target = if args.site {
        format!("every stored audit of {}", url.origin().ascii_serialization())
    } else {
        format!("the stored audit of {}", store::storage_namespace(&url))
    };

    if !args.yes && !confirm(&format!("Remove {target}?"))? {
        ::log::debug!("Clear declined");
        return Ok(());
    }

    let mut store = JsonFileStore::open(&store_path)?;
    if args.site {
        let removed = store::clear_site(&mut store, &url)?;
        println!("Removed {removed} stored audits");
    } else if store::clear_page(&mut store, &url)? {
        println!("Removed {target}");
    } else {
        println!("Nothing stored for {}", store::storage_namespace(&url));
    }
    Ok(())
}

async fn locate(args: LocateArgs) -> Result<()> {
    let html = match &args.html {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let fetcher = HttpFetcher::new(&config::default_user_agent())?;
            fetcher.fetch(&args.deep_link).await?.body
        }
    };

    match locate_deep_link(&html, &args.deep_link)? {
        Some(image) => println!(
            "Image #{}: src={} alt={}",
            image.index,
            image.src,
            image.alt.as_deref().unwrap_or("(missing)")
        ),
        None => println!("No image on the page matches the link"),
    }
    Ok(())
}
