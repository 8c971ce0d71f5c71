pub mod cache;
pub mod calc;
pub mod model;
pub mod next;
pub mod phase;
pub mod remote;
pub mod resolver;
pub mod zones;
