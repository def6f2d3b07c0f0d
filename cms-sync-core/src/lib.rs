#![doc = "cms-sync-core: content pipeline from a headless CMS into static-site collections."]

//! This crate holds the whole sync pipeline: schema resolution, paginated
//! fetching, document building, the association pass and the writer. It
//! talks to the CMS only through the [`contract::ContentSource`] trait, so it
//! has no HTTP stack of its own.
//!
//! # Usage
//! Load a [`config::SiteConfig`], pick [`config::SyncOptions`], then call
//! [`synchronise::synchronise`] with a `ContentSource` and a [`writer::Writer`].

pub mod associations;
pub mod cache;
pub mod config;
pub mod contract;
pub mod document;
pub mod error;
pub mod fetch;
pub mod inflect;
pub mod schema;
pub mod synchronise;
pub mod template;
pub mod timestamp;
pub mod writer;
