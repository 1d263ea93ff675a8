//! Sourcing API - typed marketplace endpoints
//!
//! Account profile, quotes, suppliers, orders, messages and notifications, each decoded
//! defensively from whatever shape the backend returns

pub mod account;
pub mod client;
pub mod messages;
pub mod notifications;
pub mod orders;
pub mod parse;
pub mod quotes;
pub mod suppliers;
pub mod types;

pub use client::MarketplaceClient;
pub use parse::{list_items, parse_list};
pub use types::*;
