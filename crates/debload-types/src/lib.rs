//! Foundation types for debload.
//!
//! This crate provides the identity and value types shared by every other
//! debload crate. It performs no I/O and no hashing of its own.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Git-compatible content-addressed identifier (`sha1_git`)
//! - [`MultiHash`] -- The full hash set computed for a file
//! - [`Person`] -- Normalized `name <email>` identity
//! - [`Timestamp`] -- Second/microsecond instant with a fixed UTC offset
//! - [`DebianVersion`] -- Debian version string with dpkg ordering

pub mod error;
pub mod hashes;
pub mod object;
pub mod person;
pub mod timestamp;
pub mod version;

pub use error::TypeError;
pub use hashes::MultiHash;
pub use object::ObjectId;
pub use person::Person;
pub use timestamp::Timestamp;
pub use version::DebianVersion;
