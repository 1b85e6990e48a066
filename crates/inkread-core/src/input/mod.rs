//! Image input: finding files on disk and turning them into data URLs.

mod discovery;
mod loader;

pub use discovery::{DiscoveredImage, ImageDiscovery, SUPPORTED_EXTENSIONS};
pub use loader::{ImageLoader, LoadedImage};
