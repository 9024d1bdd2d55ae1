//! The Version Gate (VG, §4.5): two immutable integer constants shared by
//! the Sync Engine and the server, plus a header-comparison helper used by
//! both sides so their mismatch logic cannot drift apart.

use crate::error::{Error, Result};

/// Current on-disk/datastore schema version.
pub const DATASTORE_VERSION: u32 = 1;

/// Current wire-protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

pub const HEADER_DATASTORE_VERSION: &str = "X-Peek-Datastore-Version";
pub const HEADER_PROTOCOL_VERSION: &str = "X-Peek-Protocol-Version";
pub const HEADER_CLIENT: &str = "X-Peek-Client";

/// Version headers observed on a response (or a request, on the server side).
///
/// Missing headers are tolerated for rolling deployments; only a header
/// that is present AND numerically different from this side's constant is
/// a mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedVersions {
    pub datastore: Option<u32>,
    pub protocol: Option<u32>,
}

/// Compare headers observed from a peer against this side's constants.
/// Fails with [`Error::VersionMismatch`] if either present header disagrees.
pub fn check_versions(observed: ObservedVersions) -> Result<()> {
    let datastore_ok = observed.datastore.map_or(true, |v| v == DATASTORE_VERSION);
    let protocol_ok = observed.protocol.map_or(true, |v| v == PROTOCOL_VERSION);

    if datastore_ok && protocol_ok {
        return Ok(());
    }

    Err(Error::VersionMismatch {
        client_datastore: DATASTORE_VERSION,
        client_protocol: PROTOCOL_VERSION,
        server_datastore: observed.datastore.unwrap_or(DATASTORE_VERSION),
        server_protocol: observed.protocol.unwrap_or(PROTOCOL_VERSION),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_headers_are_tolerated() {
        assert!(check_versions(ObservedVersions::default()).is_ok());
    }

    #[test]
    fn matching_headers_pass() {
        let observed = ObservedVersions {
            datastore: Some(DATASTORE_VERSION),
            protocol: Some(PROTOCOL_VERSION),
        };
        assert!(check_versions(observed).is_ok());
    }

    #[test]
    fn mismatched_datastore_version_fails() {
        let observed = ObservedVersions {
            datastore: Some(DATASTORE_VERSION + 1),
            protocol: Some(PROTOCOL_VERSION),
        };
        assert!(matches!(
            check_versions(observed),
            Err(Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn mismatched_protocol_version_fails() {
        let observed = ObservedVersions {
            datastore: Some(DATASTORE_VERSION),
            protocol: Some(PROTOCOL_VERSION + 1),
        };
        assert!(check_versions(observed).is_err());
    }
}
