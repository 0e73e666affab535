//! Transport abstraction for receiving payloads and delivering media.
//!
//! A transport carries three kinds of traffic: short text notices that can be
//! edited and deleted, payload downloads, and media uploads. Deliveries
//! return a [`MediaHandle`] that can be re-sent later without moving bytes.

mod error;
mod local;
mod traits;
mod types;

pub use error::TransportError;
pub use local::{LocalTransport, LocalTransportConfig};
pub use traits::{NoProgress, ProgressObserver, Transport};
pub use types::{Destination, DestinationKind, MediaHandle, NoticeId, OutgoingMedia};
