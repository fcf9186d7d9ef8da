mod bounds;
pub use self::bounds::*;

mod percentile;
pub use self::percentile::*;
