//! Product catalog scraper for Indian retail sites.
//!
//! Each site is a [`traits::SiteExtractor`] driven by a [`crawler::CatalogCrawler`]:
//! sitemap discovery, color-variant enumeration, field extraction and image
//! resolution, with records handed to one or more [`sink::RecordSink`]s.

pub mod config;
pub mod crawler;
pub mod database;
pub mod error;
pub mod fetcher;
pub mod fields;
pub mod gallery;
pub mod images;
pub mod models;
pub mod scrapers;
pub mod sink;
pub mod sitemap;
pub mod stats;
pub mod traits;
