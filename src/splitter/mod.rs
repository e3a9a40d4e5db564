// ABOUTME: Session routing between miners and upstream mappers
// ABOUTME: Routing table, lifecycle, eviction, reload and the control loop around them

pub mod controller;
pub mod counters;
pub mod diagnostics;
pub mod events;
pub mod mapper;
pub mod miner;
pub mod simple;

pub use controller::{ControlMessage, Controller, ControllerHandle, Stopped};
pub use counters::Counters;
pub use diagnostics::{ConnectionSummary, UpstreamCounts};
pub use events::{LoginRequest, ProxyEvent, SubmitEvent};
pub use mapper::{Mapper, MapperFactory, MapperId};
pub use miner::{Miner, MinerHandle, MinerId};
pub use simple::{SimpleSplitter, Splitter};
