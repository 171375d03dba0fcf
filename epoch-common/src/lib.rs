pub mod config;
pub mod error;
pub mod histogram;
pub mod plot;
pub mod sdf;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{AnalysisConfig, OutputConfig, RadiographConfig, SpectrumConfig};
pub use error::{AnalysisError, AnalysisResult};
pub use histogram::{linspace, BinAxis, Histogram1D, Histogram2D};
pub use snapshot::{particle_grid_key, particle_key, Block, BlockData, Snapshot, GRID_KEY};
pub use vecmath::{ballistic_projection, Vec2};
