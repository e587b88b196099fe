use async_trait::async_trait;
use ciborium::Value;

use super::FormatVerifier;
use crate::authnr_data::AuthnrData;
use crate::error::Result;

/// `fmt: "none"`. The authenticator made no attestation claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneAttestation;

#[async_trait]
impl FormatVerifier for NoneAttestation {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn verify(&self, _: &Value, _: &AuthnrData, _: &[u8; 32]) -> Result<()> {
        Ok(())
    }
}
