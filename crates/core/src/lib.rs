pub mod error;
pub mod events;
pub mod models;
pub mod traits;
pub mod wire;

pub use error::*;
pub use events::*;
pub use models::*;
pub use traits::*;
