pub mod cli;
pub mod config;
pub mod db;
pub mod distance;
pub mod error;
pub mod fusion;
pub mod imdb;
pub mod ingest;
mod metrics;
pub mod search;
pub mod server;
pub mod service;
pub mod sync;
pub mod upsert;
pub mod utils;

pub use config::Opts;
pub use error::{Error, Result};
pub use imdb::{Imagen, ImagenBuilder};
