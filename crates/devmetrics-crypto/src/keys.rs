use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::CryptoError;

/// RSA key bit length used throughout devmetrics (§4.6).
pub const KEY_BITS: usize = 4096;

/// Reads a PKCS#1 PEM-encoded RSA private key from `path`.
pub fn read_private_key(path: &str) -> Result<RsaPrivateKey, CryptoError> {
    let pem = std::fs::read_to_string(path).map_err(|source| CryptoError::KeyFileRead {
        path: path.to_string(),
        source,
    })?;

    RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|_| CryptoError::NotPem {
        path: path.to_string(),
    })
}

/// Reads a PKCS#1 PEM-encoded RSA public key from `path`.
pub fn read_public_key(path: &str) -> Result<RsaPublicKey, CryptoError> {
    let pem = std::fs::read_to_string(path).map_err(|source| CryptoError::KeyFileRead {
        path: path.to_string(),
        source,
    })?;

    RsaPublicKey::from_pkcs1_pem(&pem).map_err(|_| CryptoError::NotPem {
        path: path.to_string(),
    })
}

/// Generates a fresh 4096-bit RSA keypair and returns it as a `(public, private)` PEM pair,
/// matching `CertManager.GenerateKeys`'s output shape.
pub fn generate_keys() -> Result<(String, String), CryptoError> {
    let mut rng = OsRng;
    let private = RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(CryptoError::Encrypt)?;
    let public = RsaPublicKey::from(&private);

    let public_pem = public
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|_| CryptoError::NotPem {
            path: "<generated public key>".to_string(),
        })?;
    let private_pem = private
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|_| CryptoError::NotPem {
            path: "<generated private key>".to_string(),
        })?
        .to_string();

    Ok((public_pem, private_pem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn generated_keys_round_trip_through_pem_files() {
        let (public_pem, private_pem) = generate_keys().unwrap();

        let mut pub_file = tempfile::NamedTempFile::new().unwrap();
        pub_file.write_all(public_pem.as_bytes()).unwrap();
        let mut priv_file = tempfile::NamedTempFile::new().unwrap();
        priv_file.write_all(private_pem.as_bytes()).unwrap();

        let public = read_public_key(pub_file.path().to_str().unwrap()).unwrap();
        let private = read_private_key(priv_file.path().to_str().unwrap()).unwrap();

        assert_eq!(public, RsaPublicKey::from(&private));
    }

    #[test]
    fn missing_key_file_errors() {
        let err = read_private_key("/nonexistent/path/to/key.pem").unwrap_err();
        assert!(matches!(err, CryptoError::KeyFileRead { .. }));
    }
}
