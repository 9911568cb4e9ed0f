pub mod errors;
pub mod portfolio;
pub mod provocation;
pub mod signals;

pub use errors::*;
pub use portfolio::*;
pub use provocation::*;
pub use signals::*;
