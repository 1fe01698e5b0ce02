//! # KeedaVault – Core
//!
//! Error taxonomy and the clock abstraction shared by the vault engine and the
//! persistence layer.

pub mod error;
pub mod clock;

pub use error::{VaultError, VaultErrorKind, VaultResult};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
