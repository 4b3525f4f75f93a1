use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;

use crate::errors::DomainError;

const DEFAULT_PREFIX: u8 = 24;

/// Address family numbers used by the EDNS0 CLIENT-SUBNET option.
pub const FAMILY_IPV4: u16 = 1;
pub const FAMILY_IPV6: u16 = 2;

/// An EDNS0 client subnet: the network address and its source prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientSubnet {
    pub addr: IpAddr,
    pub source_prefix: u8,
}

impl ClientSubnet {
    pub fn family(&self) -> u16 {
        match self.addr {
            IpAddr::V4(_) => FAMILY_IPV4,
            IpAddr::V6(_) => FAMILY_IPV6,
        }
    }
}

impl fmt::Display for ClientSubnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.source_prefix)
    }
}

impl FromStr for ClientSubnet {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_edns0_subnet(s)
    }
}

/// Parses a client subnet for EDNS0 augmentation.
///
/// A bare IP address is widened to a /24 and the network address is kept, so
/// `1.1.1.1`, `1.1.1.0` and `1.1.1.1/24` all yield `1.1.1.0/24`. Prefixes of
/// 32 and above are rejected for both families.
pub fn parse_edns0_subnet(input: &str) -> Result<ClientSubnet, DomainError> {
    let raw = input.trim();
    let network: IpNetwork = match raw.parse::<IpAddr>() {
        Ok(ip) => IpNetwork::new(ip, DEFAULT_PREFIX)
            .map_err(|e| DomainError::InvalidSubnet(format!("{raw}: {e}")))?,
        Err(_) => raw
            .parse()
            .map_err(|e| DomainError::InvalidSubnet(format!("{raw}: {e}")))?,
    };

    let prefix = network.prefix();
    if prefix >= 32 {
        return Err(DomainError::InvalidSubnet(format!(
            "{raw}: mask {prefix} is too wide for a client subnet"
        )));
    }

    Ok(ClientSubnet {
        addr: network.network(),
        source_prefix: prefix,
    })
}
