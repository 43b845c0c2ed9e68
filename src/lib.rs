//! Scraper service for seguros.sura.cl.
//!
//! An [`extractor::Extractor`] drives a page source (headless Chromium, plain
//! HTTP or the offline catalog), parses the search results against an
//! explicit [`extractor::ResultSchema`] and appends them to a
//! [`store::ResultStore`]. The [`api`] module serves those results behind
//! bearer tokens issued by [`auth::TokenIssuer`].

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod data_models;
pub mod extractor;
pub mod store;
