//! Failures of the settings listener itself.
//!
//! # Design
//! - Request-level failures never surface here; handlers answer those with
//!   problem documents. Only the listener lifecycle ends up in this type.
//! - Both variants carry the listener address so the host can report which
//!   endpoint went away without parsing the message.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::net::SocketAddr;

/// Result alias for listener operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// The settings listener could not start or stopped abnormally.
#[derive(Debug)]
pub enum ApiServerError {
    /// The settings endpoint could not claim its address.
    Bind {
        /// Address requested for the settings endpoint.
        addr: SocketAddr,
        /// Socket error.
        source: io::Error,
    },
    /// The accept loop ended with an error; settings edits are unavailable.
    Serve {
        /// Address the endpoint was serving on.
        addr: SocketAddr,
        /// Socket error.
        source: io::Error,
    },
}

impl ApiServerError {
    /// Address of the affected settings endpoint.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        match self {
            Self::Bind { addr, .. } | Self::Serve { addr, .. } => *addr,
        }
    }
}

impl Display for ApiServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { .. } => formatter.write_str("settings endpoint could not bind"),
            Self::Serve { .. } => formatter.write_str("settings endpoint stopped serving"),
        }
    }
}

impl Error for ApiServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Serve { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn occupied_address_reports_bind_failure() -> Result<(), Box<dyn Error>> {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = taken.local_addr()?;
        let err = match tokio::net::TcpListener::bind(addr).await {
            Ok(_) => return Ok(()),
            Err(source) => ApiServerError::Bind { addr, source },
        };
        assert_eq!(err.addr(), addr);
        assert_eq!(err.to_string(), "settings endpoint could not bind");
        assert!(err.source().is_some());
        Ok(())
    }

    #[test]
    fn serve_failure_keeps_the_endpoint() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 7070));
        let err = ApiServerError::Serve {
            addr,
            source: io::Error::other("accept loop closed"),
        };
        assert_eq!(err.addr(), addr);
        assert_eq!(err.to_string(), "settings endpoint stopped serving");
    }
}
