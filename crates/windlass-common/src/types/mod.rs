//! Type definitions shared across Windlass.
//!
//! A stored row is addressed by a [`PartitionKey`] and a [`Timestamp`].

mod keys;
mod timestamps;

pub use keys::PartitionKey;
pub use timestamps::Timestamp;
