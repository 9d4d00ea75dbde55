use crate::core::errors::ClientError;
use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use secrecy::Secret;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use zeroize::Zeroizing;

/// Header carrying the signer's compressed public key.
pub const IDENTITY_HEADER: &str = "x-identity";
/// Header carrying the DER signature over the canonical payload.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Version and type bytes of an ephemeral BitPay SIN.
const SIN_PREFIX: [u8; 2] = [0x0F, 0x02];

/// Result type for signing operations: headers to attach to the request
pub type SignatureResult = Result<HashMap<String, String>, ClientError>;

/// Public half of a client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Compressed SEC1 public key, lowercase hex
    pub public_key: String,
    /// Secure Identification Number derived from the public key
    pub sin: String,
}

/// Signer trait for request authentication
///
/// Implementations turn the canonical payload of a request into the headers
/// the API needs to authenticate it.
pub trait Signer: Send + Sync {
    /// Sign the canonical payload and return the headers to attach
    fn sign_request(&self, data_to_sign: &str) -> SignatureResult;

    /// Identity the signatures can be verified against
    fn identity(&self) -> ClientIdentity;
}

/// BitAuth signer: ECDSA over secp256k1 with SHA-256 message digests.
#[derive(Clone)]
pub struct IdentitySigner {
    secret_key: SecretKey,
    public_key_hex: String,
    sin: String,
    secp: Secp256k1<secp256k1::All>,
}

impl std::fmt::Debug for IdentitySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySigner")
            .field("public_key", &self.public_key_hex)
            .field("sin", &self.sin)
            .finish_non_exhaustive()
    }
}

impl IdentitySigner {
    /// Create a signer from a hex-encoded 32-byte private key (`0x` prefix allowed)
    pub fn from_hex(private_key: &str) -> Result<Self, ClientError> {
        let key_bytes = Zeroizing::new(
            hex::decode(private_key.trim().trim_start_matches("0x"))
                .map_err(|e| ClientError::Signing(format!("Invalid private key hex: {}", e)))?,
        );

        let secret_key = SecretKey::from_slice(&key_bytes)
            .map_err(|e| ClientError::Signing(format!("Invalid private key: {}", e)))?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Create a signer with a freshly generated private key
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::new(&mut rand::thread_rng()))
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let public_key_hex = hex::encode(public_key.serialize());
        let sin = sin_from_public_key(&public_key);

        Self {
            secret_key,
            public_key_hex,
            sin,
            secp,
        }
    }

    /// Compressed public key as lowercase hex
    pub fn public_key(&self) -> &str {
        &self.public_key_hex
    }

    pub fn sin(&self) -> &str {
        &self.sin
    }

    /// Hex-encoded private key, e.g. to persist a generated key.
    pub fn export_private_key(&self) -> Secret<String> {
        let bytes = Zeroizing::new(self.secret_key.secret_bytes());
        Secret::new(hex::encode(bytes.as_slice()))
    }

    /// Sign `payload` and return the DER signature as lowercase hex.
    ///
    /// Nonces follow RFC 6979, so equal payloads produce equal signatures.
    pub fn sign(&self, payload: &str) -> Result<String, ClientError> {
        let message = payload_message(payload)?;
        let signature = self.secp.sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(&*signature.serialize_der()))
    }

    /// Check one of this signer's own signatures
    pub fn verify(&self, payload: &str, signature_hex: &str) -> bool {
        verify_signature(payload, signature_hex, &self.public_key_hex)
    }
}

impl Signer for IdentitySigner {
    fn sign_request(&self, data_to_sign: &str) -> SignatureResult {
        let signature = self.sign(data_to_sign)?;

        let mut headers = HashMap::new();
        headers.insert(IDENTITY_HEADER.to_string(), self.public_key_hex.clone());
        headers.insert(SIGNATURE_HEADER.to_string(), signature);

        Ok(headers)
    }

    fn identity(&self) -> ClientIdentity {
        ClientIdentity {
            public_key: self.public_key_hex.clone(),
            sin: self.sin.clone(),
        }
    }
}

fn payload_message(payload: &str) -> Result<Message, ClientError> {
    let digest = Sha256::digest(payload.as_bytes());
    Message::from_digest_slice(&digest)
        .map_err(|e| ClientError::Signing(format!("Failed to create message: {}", e)))
}

/// Verify a hex DER signature over `payload` against a hex public key.
///
/// Malformed input verifies as `false`.
pub fn verify_signature(payload: &str, signature_hex: &str, public_key_hex: &str) -> bool {
    let (Ok(signature_bytes), Ok(key_bytes)) =
        (hex::decode(signature_hex), hex::decode(public_key_hex))
    else {
        return false;
    };

    let (Ok(signature), Ok(public_key)) = (
        Signature::from_der(&signature_bytes),
        PublicKey::from_slice(&key_bytes),
    ) else {
        return false;
    };

    let Ok(message) = payload_message(payload) else {
        return false;
    };

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}

/// Base58check of `0x0F 0x02 || RIPEMD160(SHA256(compressed public key))`.
pub fn sin_from_public_key(public_key: &PublicKey) -> String {
    let sha = Sha256::digest(public_key.serialize());
    let hash160 = Ripemd160::digest(sha);

    let mut payload = Vec::with_capacity(SIN_PREFIX.len() + hash160.len());
    payload.extend_from_slice(&SIN_PREFIX);
    payload.extend_from_slice(&hash160);

    bs58::encode(payload).with_check().into_string()
}
