//! Delivery mode configuration for Waiter.

use serde::{Deserialize, Serialize};

/// How file bytes reach the client.
///
/// Chosen once at startup. Deployments behind nginx hand the transfer to the
/// proxy; standalone deployments stream from this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Stream bytes directly from this process
    #[default]
    Direct,
    /// Emit an `X-Accel-Redirect` header and let the reverse proxy send the file
    Offload,
}

impl DeliveryMode {
    /// Check if the reverse proxy performs the transfer.
    pub fn is_offload(self) -> bool {
        matches!(self, Self::Offload)
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Offload => write!(f, "offload"),
        }
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "offload" | "nginx" => Ok(Self::Offload),
            _ => Err(format!(
                "Invalid delivery mode: '{s}'. Valid options are: direct, offload"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_mode_parsing() {
        assert_eq!("direct".parse::<DeliveryMode>(), Ok(DeliveryMode::Direct));
        assert_eq!("NGINX".parse::<DeliveryMode>(), Ok(DeliveryMode::Offload));
        assert!("proxy".parse::<DeliveryMode>().is_err());
        assert!(DeliveryMode::Offload.is_offload());
        assert_eq!(DeliveryMode::default().to_string(), "direct");
    }
}
