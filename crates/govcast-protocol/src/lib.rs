pub mod events;
pub mod frames;

pub use events::DomainEvent;
pub use frames::{ClientRequest, InboundFrame, OutboundFrame};
