pub mod matrix;
pub mod statistics;
pub mod vector;

pub use matrix::Matrix;
pub use statistics::Statistics;
