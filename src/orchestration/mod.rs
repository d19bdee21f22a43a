pub mod reconstruct;

pub use reconstruct::{ReconstructError, Reconstruction, Reconstructor};
