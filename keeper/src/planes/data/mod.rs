pub mod gateway;
pub mod operation;

pub use gateway::CacheGateway;
pub use operation::ObjectOperations;
