//! FlexLogic Host Abstraction Layer
//!
//! The simulation engine never owns the graph of nets it simulates. A host
//! (a scene graph, a netlist loader, a test fixture) owns the identities and
//! the authored peer references; the engine only polls it. This crate holds
//! that boundary:
//!
//! - **Identity**: `NetId`, an opaque token the engine compares but never
//!   interprets
//! - **Lookup**: `NetHost`, which turns authored `PeerRef`s into live
//!   identities and reports readiness
//! - **Notification**: `ChangeSink`, fire-and-forget change events
//!
//! # Example
//!
//! ```ignore
//! use flexlogic_env::{MemoryHost, NetHost};
//!
//! let mut host = MemoryHost::new();
//! let x = host.insert("x")?;
//! let y = host.insert("y")?;
//! host.connect(x, y)?;
//!
//! let peers = host.declared_peers(&x);
//! assert_eq!(host.resolve(&x, &peers[0]), Some(y));
//! ```

mod error;
mod host;
mod memory_impl;
mod notify;
mod types;

pub use error::HostError;
pub use host::NetHost;
pub use memory_impl::{MemoryHost, RecordingSink};
pub use notify::{ChangeEvent, ChangeSink, NullSink};
pub use types::{NetId, PeerRef};
