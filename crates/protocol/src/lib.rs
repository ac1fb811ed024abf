//! Wire types shared by the mserv client and processing servers.
//!
//! - [`ServerUrl`] / [`Scheme`]: addressing of remote servers
//! - [`Request`] / [`Response`] / [`Message`]: RPC envelopes
//! - [`CapabilityDescriptor`]: a loadable capability as shipped to a session
//! - [`methods`]: method names understood by a processing engine

pub mod capability;
pub mod rpc;
pub mod url;

pub use capability::{CapabilityDescriptor, CapabilityScope};
pub use rpc::{ErrorPayload, Message, Request, Response, methods};
pub use url::{DEFAULT_PORT, Scheme, ServerUrl, UrlError, parse_url_list};
