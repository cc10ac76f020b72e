use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_scraper::config::CrawlArgs;
use catalog_scraper::crawler::CatalogCrawler;
use catalog_scraper::database::ProductStore;
use catalog_scraper::fetcher::HttpFetcher;
use catalog_scraper::scrapers::Site;
use catalog_scraper::sink::JsonLinesSink;
use catalog_scraper::stats::RunStatistics;

#[derive(Debug, Parser)]
#[command(name = "catalog-scraper")]
#[command(about = "Scrape product catalogs from retail sitemaps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl one site and emit a JSON line per color variant
    Crawl {
        #[arg(value_enum)]
        site: Site,

        /// Start from this sitemap instead of the site's default
        #[arg(long)]
        sitemap_url: Option<String>,

        /// Write JSON Lines here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also upsert records into this SQLite database, e.g. sqlite:data/products.db
        #[arg(long, env = "DATABASE_URL")]
        database: Option<String>,

        #[command(flatten)]
        crawl: CrawlArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Crawl {
            site,
            sitemap_url,
            output,
            database,
            crawl,
        } => {
            let config = crawl.to_config();
            let mut profile = site.profile()?;
            if let Some(url) = sitemap_url {
                profile = profile.with_sitemap_url(url);
            }
            let site_name = profile.name.clone();
            info!("Starting {} catalog crawl", site_name);

            let fetcher = Arc::new(HttpFetcher::new(&config)?);
            let stats = Arc::new(RunStatistics::new());
            let json_sink = match output {
                Some(path) => JsonLinesSink::create(path).await?,
                None => JsonLinesSink::stdout(),
            };
            let mut crawler = CatalogCrawler::new(fetcher, site.extractor(profile), stats, &config)
                .with_sink(Arc::new(json_sink));

            let store = match database {
                Some(url) => Some(Arc::new(ProductStore::connect(&url, &site_name).await?)),
                None => None,
            };
            if let Some(store) = &store {
                crawler = crawler.with_sink(store.clone());
            }

            crawler.run().await?;

            if let Some(store) = store {
                info!("{} {} products stored", store.count().await?, site_name);
            }
        }
    }

    Ok(())
}
