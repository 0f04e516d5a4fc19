use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to read key file {path:?}: {source}")]
    KeyFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {path:?} does not contain a PEM block")]
    NotPem { path: String },

    #[error("failed to parse RSA key: {0}")]
    InvalidKey(#[from] rsa::pkcs1::Error),

    #[error("RSA OAEP encryption failed: {0}")]
    Encrypt(rsa::Error),

    #[error("RSA OAEP decryption failed: {0}")]
    Decrypt(rsa::Error),

    #[error("ciphertext length {0} is not a multiple of the RSA block size {1}")]
    MisalignedCiphertext(usize, usize),
}
