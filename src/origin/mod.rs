//! Origin-side control plane: the director heartbeat watchdog and the
//! endpoint the director reports to.

pub mod heartbeat;
pub mod http;
pub mod server;

pub use heartbeat::{HeartbeatDeadlineMonitor, HeartbeatReport, Liveness, DIRECTOR_COMPONENT};
pub use server::OriginServer;
