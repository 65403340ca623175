// Cached SSO token discovery
mod token_cache;

pub use token_cache::{default_cache_dir, find_token_file, load_token};
