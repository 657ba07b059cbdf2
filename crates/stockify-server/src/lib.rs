pub mod config;
pub mod observability;
pub mod server;

pub use server::{AuthComponents, ServerBuilder, StockifyServer, build_app};
