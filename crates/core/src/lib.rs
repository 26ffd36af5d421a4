pub mod address;
pub mod banner;
pub mod compose;
pub mod config;
pub mod event;
pub mod forwarder;
pub mod message;
pub mod mime;
pub mod router;
pub mod storage;
pub mod transformer;
pub mod transport;
pub mod transports;

pub use address::*;
pub use banner::*;
pub use compose::*;
pub use config::*;
pub use event::*;
pub use forwarder::*;
pub use message::*;
pub use mime::*;
pub use router::*;
pub use storage::*;
pub use transformer::*;
pub use transport::*;
pub use transports::*;
