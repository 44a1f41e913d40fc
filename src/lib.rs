//! Cache coordination and paging state machine for a spatial cuboid
//! database: the protocol by which concurrent readers and writers bring
//! cuboids from object storage into cache, serialize writes into object
//! storage, preserve write ordering within a channel, and surface errors via
//! write-locks. See [`facade::SpatialDb`] for the entry point.

pub mod cache_store;
pub mod config;
pub mod delayed_write;
pub mod error;
pub mod facade;
pub mod key_codec;
pub mod logging;
pub mod object_store;
pub mod page_in;
pub mod page_out;
pub mod region;
pub mod resource;
pub mod state_store;
pub mod write_lock;

pub use error::SpdbError;
pub use facade::SpatialDb;
pub use key_codec::CuboidAddress;
pub use resource::{ChannelOrLayer, Collection, CoordinateFrame, Datatype, Experiment, ResourceDescriptor};
