//! Topic-addressed publish/subscribe bus: five logical channels with
//! priority delivery, TTL, and bounded back-pressure (spec §4.4, §6.2).

pub mod bus;
pub mod error;
pub mod mailbox;
pub mod types;

pub use bus::Bus;
pub use error::{BusError, Result};
pub use types::{Channel, Envelope, Payload};
