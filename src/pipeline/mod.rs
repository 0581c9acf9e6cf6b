//! The color-extraction pipeline: a static snapshot of the page, an image
//! sampler, and the ordered strategy cascade that turns one into a single
//! primary color.

pub mod cascade;
pub mod sampler;
pub mod snapshot;

pub use cascade::{default_strategies, run_cascade, ExtractStrategy};
pub use sampler::ImageSampler;
pub use snapshot::PageSnapshot;
