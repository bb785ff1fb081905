//! Gallery Vault - Cryptographic Core
//!
//! Page encryption at rest and password hashing.

pub mod keys;
pub mod codec;
pub mod password;

pub use keys::*;
pub use codec::*;
pub use password::*;
