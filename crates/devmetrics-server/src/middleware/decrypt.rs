use devmetrics_crypto::RsaPrivateKey;

use crate::error::ServerError;

/// Reverses the agent's chunked RSA-OAEP envelope (spec §4.6) when a private key is
/// configured; otherwise the body is returned unchanged. Applied after gzip decoding, so the
/// wire order is `encrypt(gzip(json))`.
pub fn decrypt_if_configured(
    key: Option<&RsaPrivateKey>,
    body: Vec<u8>,
) -> Result<Vec<u8>, ServerError> {
    let Some(key) = key else {
        return Ok(body);
    };

    devmetrics_crypto::decrypt(&body, key)
        .map_err(|e| ServerError::BadRequest(format!("decryption failed: {e}")))
}
