pub mod account;
pub mod amount;
pub mod constants;
pub mod error;
pub mod license;
pub mod params;
pub mod queue;
pub mod transaction;
pub mod types;

pub use account::*;
pub use amount::*;
pub use constants::*;
pub use error::CyclexError;
pub use license::*;
pub use params::*;
pub use queue::*;
pub use transaction::*;
pub use types::*;
