//! Unibridge Protocol - wire types shared between the host bridge and the
//! embedded engine.
//!
//! This crate contains the value types that cross the native boundary:
//! - Outbound commands (`Message`, `Payload`) and their wire serialization
//! - Inbound notifications (`PlatformNotification`) and engine events
//!   (`EngineEvent`, `SceneInfo`)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, chrono, thiserror
//! 2. **No business logic** - Pure data types, serialization, and
//!    schema-on-read parsing at the boundary
//! 3. **Opaque payloads** - Core logic never inspects payload contents;
//!    payloads are constructed at the boundary and parsed schema-on-read

pub mod event;
pub mod message;
pub mod notification;

pub use event::{EngineEvent, EngineEventKind, SceneInfo};
pub use message::{Message, Payload, DEFAULT_METHOD_NAME, DEFAULT_TARGET_ID};
pub use notification::{
    parse_inbound_message, NotificationError, PlatformNotification, RawNotification,
    RAW_MESSAGE_TYPE,
};
