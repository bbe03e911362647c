//! dotmoe library.
//!
//! Curates anime artwork from page webhooks and booru sources, lets a
//! moderator approve candidates, and republishes approved posts to Mastodon
//! from a scheduled one-shot worker.

#![allow(clippy::needless_raw_string_hashes)]

pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod imaging;
pub mod ingest;
pub mod logging;
pub mod moderation;
pub mod providers;
pub mod publisher;
pub mod web;
