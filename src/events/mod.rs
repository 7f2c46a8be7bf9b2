//! # Events Module
//!
//! Progress reporting over channels, so any front end (CLI, service,
//! test) can observe scans and indexing runs without the core knowing it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Batch(BatchEvent::Progress(p)) = event {
//!             println!("{}/{}", p.processed, p.total);
//!         }
//!     }
//! });
//!
//! let indexer = Indexer::builder(config).store(store).events(sender).build()?;
//! indexer.run()?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
