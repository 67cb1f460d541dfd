//! Repository identity, declared configuration and lifecycle state.

mod config;
mod key;
mod state;

pub use config::{PortPair, RepositoryConfig, Visibility};
pub use key::RepositoryKey;
pub use state::{RepositoryState, StateDelta};
