//! mserv - multi-server session manager
//!
//! A client holds one built-in processing session plus any number of remote
//! ones. Each [`Connection`] has a private capability registry and object
//! namespace; the [`ConnectionRegistry`] tracks which one is *active* and
//! routes capability loading and object creation to it.
//!
//! ```ignore
//! let mut registry = ConnectionRegistry::new(RegistryConfig::default());
//! let mut symbols = SymbolTable::new();
//!
//! let render = registry.connect("render-01", 11111).await?;
//! registry.load("Widget", &BinaryLocator::path("plugins/libWidget.so"), false, Some(&mut symbols)).await?;
//! let widget = registry.call(&symbols, "Widget").await?;
//!
//! registry.switch_active(ConnectionId::BUILTIN, None)?;
//! assert_eq!(registry.call(&symbols, "Widget").await.unwrap_err().kind(), ErrorKind::WrongSession);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod loader;
pub mod object;
pub mod plugin;
pub mod registry;
pub mod symbols;

pub use config::RegistryConfig;
pub use connection::{Connection, ConnectionId, ConnectionInfo, ConnectionKind, ConnectionState};
pub use error::{Error, ErrorKind, Result};
pub use object::{ObjectHandle, ObjectId};
pub use plugin::{BinaryLocator, DiscoveryError, FsPluginLocator, PluginLocator, find_plugin};
pub use registry::ConnectionRegistry;
pub use symbols::{Symbol, SymbolTable};

pub use mserv_protocol::{CapabilityDescriptor, CapabilityScope, Scheme, ServerUrl};
pub use mserv_runtime::{DialOptions, Dialer, NetDialer, Session};
