use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::CryptoError;

/// OAEP-SHA256 overhead for a 4096-bit (512-byte) modulus: `k - 2*hLen - 2`.
const PLAINTEXT_CHUNK: usize = 446;

/// Encrypts `message` under `key`, chunking it into `PLAINTEXT_CHUNK`-byte windows so payloads
/// larger than a single RSA block can still be carried (§4.6, Testable Property 5).
///
/// Each window produces exactly one `key.size()`-byte ciphertext block; the blocks are
/// concatenated in order with no separators, since the fixed block size makes the boundaries
/// self-describing to [`decrypt`].
pub fn encrypt(message: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    let mut rng = OsRng;
    let padding = Oaep::new::<Sha256>();

    let mut ciphertext = Vec::with_capacity(
        message.len().div_ceil(PLAINTEXT_CHUNK) * key.size(),
    );

    if message.is_empty() {
        let block = key
            .encrypt(&mut rng, padding, &[])
            .map_err(CryptoError::Encrypt)?;
        ciphertext.extend_from_slice(&block);
        return Ok(ciphertext);
    }

    for chunk in message.chunks(PLAINTEXT_CHUNK) {
        let block = key
            .encrypt(&mut rng, padding.clone(), chunk)
            .map_err(CryptoError::Encrypt)?;
        ciphertext.extend_from_slice(&block);
    }

    Ok(ciphertext)
}

/// Reverses [`encrypt`]: splits `ciphertext` into `key.size()`-byte blocks and decrypts each,
/// concatenating the recovered plaintext windows.
pub fn decrypt(ciphertext: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let block_size = RsaPublicKey::from(key).size();

    if ciphertext.len() % block_size != 0 {
        return Err(CryptoError::MisalignedCiphertext(
            ciphertext.len(),
            block_size,
        ));
    }

    let padding = Oaep::new::<Sha256>();
    let mut plaintext = Vec::with_capacity(ciphertext.len());

    for block in ciphertext.chunks(block_size) {
        let chunk = key
            .decrypt(padding.clone(), block)
            .map_err(CryptoError::Decrypt)?;
        plaintext.extend_from_slice(&chunk);
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut OsRng, crate::keys::KEY_BITS).unwrap()
    }

    #[test]
    fn round_trips_a_message_smaller_than_one_block() {
        let private = test_key();
        let public = RsaPublicKey::from(&private);

        let ciphertext = encrypt(b"hello devmetrics", &public).unwrap();
        assert_eq!(ciphertext.len(), public.size());

        let plaintext = decrypt(&ciphertext, &private).unwrap();
        assert_eq!(plaintext, b"hello devmetrics");
    }

    #[test]
    fn thousand_byte_message_produces_three_blocks() {
        let private = test_key();
        let public = RsaPublicKey::from(&private);

        let message = vec![0x42u8; 1000];
        let ciphertext = encrypt(&message, &public).unwrap();
        assert_eq!(ciphertext.len(), 3 * public.size());

        let plaintext = decrypt(&ciphertext, &private).unwrap();
        assert_eq!(plaintext, message);
    }

    #[test]
    fn misaligned_ciphertext_is_rejected() {
        let private = test_key();
        let err = decrypt(&[0u8; 10], &private).unwrap_err();
        assert!(matches!(err, CryptoError::MisalignedCiphertext(10, _)));
    }
}
