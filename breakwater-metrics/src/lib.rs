pub mod rolling_number;
pub mod rolling_percentile;
pub mod window;

pub use rolling_number::*;
pub use rolling_percentile::*;
pub use window::*;
