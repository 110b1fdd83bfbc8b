//! Gateway: HTTP endpoint the email provider posts inbound messages to.
//!
//! One route for the webhook, one for health probes. Each request is handled
//! end to end by the shared [`crate::pipeline::Bridge`].

mod payload;
mod server;

pub use payload::decode_payload;
pub use server::{router, run_gateway, GatewayState};
