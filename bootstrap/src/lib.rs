//! credvault-bootstrap - 统一启动骨架
//!
//! Config → telemetry → Vault adapter → manager wiring shared by the CLI and
//! anything else that embeds the vault client.

mod infrastructure;

pub use infrastructure::*;
