mod service;

pub use service::{Acknowledgement, CommandService, CommandStatus, IgnoredAck};
