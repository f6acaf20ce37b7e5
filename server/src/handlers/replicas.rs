//! Replica handler - mints identities for new devices.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tally_engine::{validate_replica_id, Error, IdentityMinter, ReplicaId};

/// A freshly minted replica id.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaResponse {
    pub replica_id: ReplicaId,
}

/// Mint a replica id. The server keeps no record of it.
pub fn handle_mint(minter: &dyn IdentityMinter) -> Result<ReplicaResponse> {
    let replica_id = minter.mint().map_err(Error::IdentityUnavailable)?;
    validate_replica_id(&replica_id)
        .map_err(|e| Error::IdentityUnavailable(format!("minted id rejected: {}", e)))?;

    tracing::info!(replica = %replica_id, "minted replica id");
    Ok(ReplicaResponse { replica_id })
}
