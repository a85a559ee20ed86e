pub mod car;
pub mod track;
pub mod weather;

pub use car::{Car, CarCatalog, Drivetrain};
pub use track::{Surface, Track, TrackCatalog, TrackConfig, TrackPoint};
pub use weather::{Environment, Weather};
