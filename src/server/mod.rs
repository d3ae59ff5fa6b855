// Gateway module for the HTTP / websocket server - follows the Train Station Pattern
// All external access must go through this gateway

mod error;
mod health;
mod knowledge;
mod protocol;
mod router;
mod ws;

pub use error::ApiError;
pub use protocol::{decode, ClientFrame, Decoded, ServerFrame};
pub use router::{create_router, serve};
pub use ws::process_frame;
