//! Broadcast hub
//!
//! The hub is an actor: one task owns the set of live connections and every
//! other task talks to it through a [`HubHandle`]. Nothing outside the hub
//! task can read or mutate the registry.
//!
//! # Architecture
//!
//! ```text
//!        read pump A       read pump B       entry point
//!             │                 │                 │
//!   Broadcast │       Unregister│        Register │
//!             ▼                 ▼                 ▼
//!        ┌─────────────────────────────────────────────┐
//!        │ Hub task                                    │
//!        │   registry: HashMap<ConnectionId, Sender>   │
//!        └──────┬──────────────────┬─────────────┬─────┘
//!               │ try_send         │ try_send    │ try_send
//!               ▼                  ▼             ▼
//!         outbound queue A   outbound queue B   ...
//!               │                  │
//!          write pump A       write pump B
//! ```
//!
//! # Events
//!
//! - **Register**: admit the connection, announce "joined" to everyone else.
//! - **Unregister**: if still registered, close its outbound queue, remove it,
//!   announce "left" to everyone remaining. Repeats are ignored.
//! - **Broadcast**: offer the message to every member, sender included.
//!
//! # Backpressure
//!
//! Outbound queues are bounded and the hub never waits on one. A member
//! whose queue is full is evicted (see [`registry`]), so a single stalled
//! consumer cannot hold up delivery to anyone else. Nobody else is told; the
//! evicted connection gets an [`Eviction`] notice and closes its transport
//! without waiting for the queue to drain.

pub mod config;
pub mod handle;
pub mod registry;
pub mod run;

pub use config::HubConfig;
pub use handle::{Admission, Eviction, HubEvent, HubHandle, OutboundReceiver, Registration};
pub use registry::{EvictReason, FanOut, Member, Registry};
pub use run::Hub;
