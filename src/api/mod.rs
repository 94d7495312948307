pub mod feeds;

pub use feeds::{HazardFeeds, QuakeQuery};
