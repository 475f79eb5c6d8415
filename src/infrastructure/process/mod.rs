pub mod asset_fetcher;

pub use asset_fetcher::{ScriptAssetFetcher, DEFAULT_FETCH_SCRIPT};
