//! FrameCanvas Core Library
//!
//! Platform-agnostic scene graph for a collaborative design canvas: objects,
//! frames that contain and clip their children, drawing tools, undo history
//! and whole-document snapshot replication between peers.
//!
//! The host owns rendering. It attaches a [`DrawingSurface`] and a
//! [`RealtimeChannel`] to an [`Engine`], forwards pointer, wheel and key input,
//! and renders whatever the engine publishes through [`HostView`].

pub mod config;
pub mod containment;
pub mod engine;
pub mod error;
pub mod history;
pub mod layers;
pub mod media;
pub mod objects;
pub mod presence;
pub mod replication;
pub mod scene;
pub mod selection;
pub mod surface;
pub mod testing;
pub mod tools;
#[cfg(not(target_arch = "wasm32"))]
pub mod transport;
pub mod viewport;

pub use config::EngineConfig;
pub use engine::{Engine, HostView, SuppressionMode};
pub use error::{EngineError, EngineResult};
pub use history::History;
pub use layers::{LayerExpansion, LayerNode, project_layers};
pub use objects::{
    FramePreset, Geometry, ObjectId, ObjectKind, Paint, PolygonTemplate, SceneObject,
    SerializableColor, TextRun,
};
pub use presence::{CursorMode, PeerPresence, PresenceState};
pub use replication::{ChannelEvent, CursorPosition, Inbound, RealtimeChannel, Replicator, SessionId};
pub use scene::{DocumentSnapshot, Scene};
pub use selection::{ActiveObjectAttributes, ObjectPatch, Selection, UpdateOptions};
pub use surface::{DrawingSurface, Modifiers, PointerInput, SurfaceEvent};
pub use tools::{GestureOutcome, ToolInterpreter, ToolKind, ToolState};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::{ConnectionState, WebSocketChannel};
pub use viewport::{Viewport, WheelDeltaMode, WheelInput};
