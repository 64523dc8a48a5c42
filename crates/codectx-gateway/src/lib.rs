//! HTTP surface for context ingestion, query and debug listing.

mod error;
mod guard;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::{ContextSlot, GatewayServer};
