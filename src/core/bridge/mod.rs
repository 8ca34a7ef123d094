//! Bidirectional bridge between a client WebSocket and a live model session.
//!
//! # Architecture
//!
//! - [`SessionBridge`] owns the lifecycle and the upstream handle
//! - [`IngressPump`] forwards classified client chunks upstream
//! - [`EgressPump`] delivers model output and runs tool round-trips
//!
//! Both pumps share one `LiveSender`. Client-bound messages from both go
//! through the same `mpsc` channel to the connection's writer task.

pub mod classifier;
pub mod egress;
pub mod ingress;
pub mod messages;
pub mod session;

pub use classifier::{ClassifyError, MediaChunk, classify};
pub use egress::{EgressPump, TurnState};
pub use ingress::IngressPump;
pub use messages::{
    ClientEnvelope, ClientFrame, ClientMessage, LiveMessageRoute, RawMediaChunk, RealtimeInput,
    ServerContentSignal,
};
pub use session::{
    BridgeContext, DEFAULT_SETUP_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, HandshakeError, PumpExit,
    SessionBridge, SessionState,
};
