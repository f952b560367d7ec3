//! OS shutdown signals.

use tracing::warn;

/// Listener for the first SIGINT or SIGTERM.
pub struct Terminate {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl Terminate {
    pub fn register() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for a signal and return its name.
    #[cfg(unix)]
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => "SIGINT",
                Err(e) => {
                    warn!(error = %e, "failed to listen for SIGINT, waiting for SIGTERM only");
                    self.sigterm.recv().await;
                    "SIGTERM"
                }
            },
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}
