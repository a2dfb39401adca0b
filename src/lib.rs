#![doc(html_root_url = "https://docs.rs/keyhole/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A reconciliation engine for server-owned UI.
//!
//! A [`Template`] replays the same call sequence against a [`Composer`] on every render.
//! [`capture`] records it into a flat [`Snapshot`] of [`Keyhole`]s, [`Differ`] compares two consecutive snapshots into [`MutationOp`]s,
//! and a [`MutationBatch`] hands those to a [`Transport`] as one [`Message`].
//! [`Session`] ties this together with event handling, and [`SessionRunner`] runs a session as its own task.
//!
//! ```text
//! Template → Composer → Snapshot ⇄ Differ → MutationBatch → Transport (out)
//! Transport (in) → SessionRunner → Session → Handler → Composer → …
//! ```

pub mod batch;
pub mod compose;
pub mod config;
pub mod diff;
pub mod error;
pub mod handler;
pub mod key;
pub mod markup;
pub mod op;
pub mod pool;
pub mod replica;
pub mod runner;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod value;
pub mod wire;

pub use batch::{Delivery, MutationBatch};
pub use compose::{capture, stream, template, ComposeResult, Composer, Render, Template};
pub use config::EngineConfig;
pub use diff::{diff, Differ};
pub use error::{ComposeError, DiffError, ReplicaError, SessionError, TransportError};
pub use handler::{EventPayload, Handler, HandlerResult, HandlerTable};
pub use key::Key;
pub use op::MutationOp;
pub use pool::SnapshotPool;
pub use replica::Replica;
pub use runner::{SessionHandle, SessionRunner};
pub use session::{Outcome, Phase, Session, SessionId};
pub use snapshot::{Fragment, Keyhole, KeyholeKind, Range, Siblings, Snapshot, Tree};
pub use transport::{ChannelTransport, Transport};
pub use value::ScalarValue;
pub use wire::{InboundEvent, Message, Notification};
