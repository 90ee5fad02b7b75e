use std::path::PathBuf;

use clap::Parser;

/// Command-line options for the relay.
#[derive(Debug, Clone, Parser)]
#[command(name = "netpong-relay", version, about = "Intercepting WebSocket relay for netpong")]
pub struct RelayArgs {
    /// Port to accept client connections on
    #[arg(long, default_value_t = 8080)]
    pub listen: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Upstream server WebSocket URL
    #[arg(long, default_value = "ws://localhost:9000/ws")]
    pub target: String,

    /// Append-only interception log (one JSON object per line)
    #[arg(long, default_value = "mitm_log.jsonl")]
    pub logfile: PathBuf,
}

impl RelayArgs {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.listen)
    }

    /// Reject a target that cannot be dialed. The upstream client is built
    /// without TLS, so only plain `ws://` URLs work.
    pub fn validate(&self) -> Result<(), String> {
        if self.target.starts_with("wss://") {
            return Err(format!(
                "target {:?} uses TLS, which this relay does not support; use ws://",
                self.target
            ));
        }
        if !self.target.starts_with("ws://") {
            return Err(format!("target {:?} must be a ws:// URL", self.target));
        }
        Ok(())
    }
}
