//! Key-to-node distribution: the adapter vocabulary, the consistent-hash
//! ring, and the distributor facade built on top of it.

pub mod adapter;
pub mod distributor;
pub mod ring;

pub use adapter::{Adapter, LocalAdapter, RemoteAdapter};
pub use distributor::Distributor;
pub use ring::NodeRouter;
