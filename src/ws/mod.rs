//! Real-time WebSocket input dispatch plane.

pub mod motion;
pub mod mouse;
