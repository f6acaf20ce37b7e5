//! Submit handler - accepts changes from replicas.

use crate::backend::Backend;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tally_engine::{ChangeRequest, Timestamp};

/// Response for an accepted change.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Always true; rejected changes get an error body instead
    pub accepted: bool,
    /// Timestamp the change was stored with, assigned if the request had none
    pub timestamp: Timestamp,
}

/// Process a change submitted by a replica.
///
/// Resubmitting the same change is accepted again without a second copy.
pub async fn handle_submit(backend: &Backend, request: ChangeRequest) -> Result<SubmitResponse> {
    let change = backend.submit(request).await?;
    Ok(SubmitResponse {
        accepted: true,
        timestamp: change.timestamp,
    })
}
