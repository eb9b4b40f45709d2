use clap::{Parser, Subcommand, ValueEnum};
use img_audit::config::{AuditConfig, FetcherKind};
use img_audit::{Action, ActionKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "img-audit")]
#[command(about = "Audits the alt text of every image on a site")]
#[command(version)]
pub struct Args {
    /// JSON file holding the persisted audits
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl a sitemap page (or a single page) and render the first table page
    Crawl(CrawlArgs),

    /// Render one page of stored audit data
    Render(RenderArgs),

    /// Apply one reviewer action to stored audit data
    Review(ReviewArgs),

    /// Remove stored audit data
    Clear(ClearArgs),

    /// Find the image an `image-url` deep link points at
    Locate(LocateArgs),
}

#[derive(clap::Args, Debug)]
pub struct CrawlArgs {
    /// Sitemap page to crawl, or the page to audit with --action use-page
    pub url: String,

    /// JSON configuration file; flags given here take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    pub action: Option<ActionArg>,

    /// Saved host page carrying data-action, data-table and data-page markers
    #[arg(long)]
    pub host_document: Option<PathBuf>,

    /// Maximum number of sitemap links (0 for no limit)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Pause before each request, in milliseconds
    #[arg(long)]
    pub delay: Option<u64>,

    /// Fetch pages through a WebDriver server instead of plain HTTP
    #[arg(long)]
    pub webdriver: bool,

    /// Ignore images inside <header>
    #[arg(long)]
    pub skip_header_images: bool,

    /// Fetch the requested page first and the rest in the background
    #[arg(long)]
    pub lazy: bool,

    /// Ignore cached data and crawl again
    #[arg(long)]
    pub fresh: bool,

    /// Table page to render
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Output file for the rendered table
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Audited URL whose stored data is rendered
    pub url: String,

    /// Table page to render (defaults to the last viewed page)
    #[arg(short, long)]
    pub page: Option<usize>,

    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ReviewArgs {
    /// Audited URL whose stored data is reviewed
    pub url: String,

    #[arg(value_enum)]
    pub kind: ReviewKind,

    /// Position of the page record on the table page
    pub page_index: usize,

    /// Position of the image within the page record
    pub image_index: usize,

    /// Table page the row is on (defaults to the last viewed page)
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Note text for `note`
    #[arg(long, required_if_eq("kind", "note"))]
    pub text: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    pub url: String,

    /// Remove every stored audit of the URL's origin
    #[arg(long)]
    pub site: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct LocateArgs {
    /// Page URL carrying an image-url parameter
    pub deep_link: String,

    /// Read the page from a file instead of fetching it
    #[arg(long)]
    pub html: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    UseSitemap,
    UsePage,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::UseSitemap => Action::UseSitemap,
            ActionArg::UsePage => Action::UsePage,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReviewKind {
    Check,
    Fail,
    Note,
}

impl ReviewKind {
    /// Session actions for this review; a note is edited and then saved
    pub fn actions(self, text: Option<String>) -> Vec<ActionKind> {
        match self {
            ReviewKind::Check => vec![ActionKind::ToggleChecked],
            ReviewKind::Fail => vec![ActionKind::ToggleFailed],
            ReviewKind::Note => vec![
                ActionKind::EditNote(text.unwrap_or_default()),
                ActionKind::SaveNote,
            ],
        }
    }
}

impl ReviewArgs {
    /// What the review did, given whether the dataset changed
    pub fn outcome(&self, changed: bool, page: usize) -> String {
        let row = format!(
            "image {} of record {} on page {}",
            self.image_index, self.page_index, page
        );
        match (changed, self.kind) {
            (true, _) => format!("Updated {row}"),
            (false, ReviewKind::Fail) => {
                format!("Ignored: {row} is not checked; check it before marking it as failed")
            }
            (false, _) => format!("Nothing changed for {row}"),
        }
    }
}

impl CrawlArgs {
    /// Configuration from the optional file, the environment and the flags,
    /// in increasing precedence
    pub fn audit_config(&self, store: Option<PathBuf>) -> img_audit::Result<AuditConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = AuditConfig::from_file(path)?;
                config.start_url = self.url.clone();
                config
            }
            None => AuditConfig::new(&self.url),
        };
        config.apply_env();

        if let Some(action) = self.action {
            config.action = action.into();
        }
        if let Some(limit) = self.limit {
            config.link_limit = limit;
        }
        if let Some(delay) = self.delay {
            config.fetch_delay_ms = delay;
        }
        if self.webdriver {
            config.fetcher = FetcherKind::WebDriver;
        }
        if self.skip_header_images {
            config.skip_header_images = true;
        }
        if self.lazy {
            config.lazy = true;
        }
        if let Some(store) = store {
            config.store_path = store;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "img-audit",
            "--store",
            "s.json",
            "crawl",
            "https://e.com/sitemap",
            "--action",
            "use-page",
            "--limit",
            "0",
            "--webdriver",
        ]);
        let Command::Crawl(crawl) = args.command else {
            panic!("expected crawl");
        };

        let config = crawl.audit_config(args.store).unwrap();
        assert_eq!(config.action, Action::UsePage);
        assert_eq!(config.link_limit(), None);
        assert_eq!(config.fetcher, FetcherKind::WebDriver);
        assert_eq!(config.store_path, PathBuf::from("s.json"));
    }

    #[test]
    fn test_review_outcome_reports_ignored_fail() {
        let args = Args::parse_from(["img-audit", "review", "https://e.com", "fail", "0", "2"]);
        let Command::Review(review) = args.command else {
            panic!("expected review");
        };

        assert_eq!(review.outcome(true, 1), "Updated image 2 of record 0 on page 1");
        let ignored = review.outcome(false, 1);
        assert!(ignored.starts_with("Ignored: image 2 of record 0 on page 1 is not checked"));
    }

    #[test]
    fn test_note_requires_text() {
        assert!(Args::try_parse_from(["img-audit", "review", "https://e.com", "note", "0", "1"]).is_err());

        let args = Args::parse_from([
            "img-audit", "review", "https://e.com", "note", "0", "1", "--text", "Blurry",
        ]);
        let Command::Review(review) = args.command else {
            panic!("expected review");
        };
        assert_eq!(
            review.kind.actions(review.text),
            vec![ActionKind::EditNote("Blurry".into()), ActionKind::SaveNote]
        );
    }
}
