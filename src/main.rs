//! # photo-index CLI
//!
//! Command-line front end for the photo indexer.
//!
//! ## Usage
//! ```bash
//! photo-index run --config config.toml
//! photo-index duplicates --root ~/Pictures --output json
//! ```

mod cli;

use photo_indexer::Result;

fn main() -> Result<()> {
    photo_indexer::init_tracing();
    cli::run()
}
