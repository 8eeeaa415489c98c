pub mod convolve;
pub mod special;

pub use convolve::convolve;
