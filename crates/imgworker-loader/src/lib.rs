//! imgworker loader - placeholder-aware image loading
//!
//! An [`ImageLoadController`] takes one image from "requested" to
//! "displayed":
//! - Sends the source to the shared [`imgworker_pool::WorkerPool`]
//! - Decodes the fetched blob, or probes its header when full decode is unavailable
//! - Shows a placeholder until the first result, then the image
//! - Degrades to a broken image instead of erroring (configurable)
//!
//! # Example
//!
//! ```rust,ignore
//! use imgworker_loader::{ImageProps, Prefetcher, PrefetchConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let prefetcher = Prefetcher::from_config(PrefetchConfig::default())?;
//!
//! let props = ImageProps::new("https://example.com/cat.png").placeholder("spinner.gif");
//! let controller = prefetcher.load(props)?;
//!
//! let status = controller.wait_settled().await;
//! println!("{:?} -> {:?}", status.state, controller.render());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod prefetcher;
pub mod props;
pub mod render;

// Re-exports for convenience
pub use config::{FailurePolicy, LoaderConfig, PrefetchConfig};
pub use controller::{DisplayedImage, ImageLoadController, ImageStatus, LoadState};
pub use decode::{Decoder, ImageCrateDecoder, ImageInfo};
pub use error::{DecodeError, LoaderError};
pub use prefetcher::Prefetcher;
pub use props::{Decoding, Element, ImageProps, Placeholder, PlaceholderFn};
pub use render::Rendered;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the loader
    pub use crate::{
        FailurePolicy, ImageLoadController, ImageProps, LoadState, LoaderConfig, Placeholder,
        PrefetchConfig, Prefetcher, Rendered,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
