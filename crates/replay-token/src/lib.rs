//! Obfuscated report location tokens.
//!
//! A token is the URL-safe, unpadded base64 encoding of `IV || ciphertext`,
//! where the ciphertext is the report URL encrypted with AES-128 in counter
//! mode. The key is the first 16 bytes of a shared secret.
//!
//! Tokens hide the location of a report from casual inspection. They are
//! **not** authenticated: decrypting with the wrong secret, or decrypting a
//! tampered token, produces garbage text instead of an error.
//!
//! # Example
//!
//! ```
//! let secret = "0123456789abcdef-shared";
//! let token = replay_token::encrypt("https://example.com/report.json", secret).unwrap();
//! let url = replay_token::decrypt(&token, secret).unwrap();
//! assert_eq!(url, "https://example.com/report.json");
//! ```

use aes::Aes128;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher};

/// Length of the initialization vector prefix.
pub const IV_LEN: usize = 16;

/// Number of secret bytes used as the cipher key.
pub const KEY_LEN: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Standard alphabet, accepting input with or without padding.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Token error.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No secret configured.
    #[error("token secret is not configured")]
    MissingSecret,

    /// Secret is too short to key the cipher.
    #[error("token secret must be at least {KEY_LEN} bytes, got {len}")]
    SecretTooShort {
        /// Actual secret length in bytes.
        len: usize,
    },

    /// Token is not valid base64.
    #[error("malformed token: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Decoded token is too short to contain an IV.
    #[error("malformed token: decoded length {len} is shorter than the {IV_LEN}-byte IV")]
    TooShort {
        /// Decoded length in bytes.
        len: usize,
    },
}

/// Encrypt a URL into a token using a random IV.
///
/// # Errors
///
/// Returns [`TokenError::MissingSecret`] or [`TokenError::SecretTooShort`] if
/// the secret cannot key the cipher.
pub fn encrypt(url: &str, secret: &str) -> Result<String, TokenError> {
    let iv: [u8; IV_LEN] = rand::random();
    encrypt_with_iv(url, secret, iv)
}

/// Encrypt a URL into a token using the given IV.
///
/// Deterministic: identical inputs produce identical tokens.
///
/// # Errors
///
/// Returns [`TokenError::MissingSecret`] or [`TokenError::SecretTooShort`] if
/// the secret cannot key the cipher.
pub fn encrypt_with_iv(url: &str, secret: &str, iv: [u8; IV_LEN]) -> Result<String, TokenError> {
    let key = derive_key(secret)?;

    let mut payload = Vec::with_capacity(IV_LEN + url.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(url.as_bytes());
    apply_keystream(&key, &iv, &mut payload[IV_LEN..]);

    Ok(BASE64_URL_SAFE_NO_PAD.encode(payload))
}

/// Decrypt a token back into the URL it was created from.
///
/// The URL-safe alphabet is mapped back to the standard one and missing
/// padding is tolerated. Invalid UTF-8 in the plaintext (the usual symptom of
/// a wrong secret) is replaced rather than reported.
///
/// # Errors
///
/// Returns a [`TokenError`] if the secret is unusable, the token is not
/// base64, or the decoded token is shorter than the IV.
pub fn decrypt(token: &str, secret: &str) -> Result<String, TokenError> {
    let key = derive_key(secret)?;

    let standard = token
        .trim_end_matches('=')
        .replace('-', "+")
        .replace('_', "/");
    let mut decoded = STANDARD_LENIENT.decode(standard)?;

    if decoded.len() < IV_LEN {
        return Err(TokenError::TooShort { len: decoded.len() });
    }

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&decoded[..IV_LEN]);
    let plaintext = &mut decoded[IV_LEN..];
    apply_keystream(&key, &iv, plaintext);

    Ok(String::from_utf8_lossy(plaintext).into_owned())
}

/// Take the first [`KEY_LEN`] bytes of the secret as the cipher key.
fn derive_key(secret: &str) -> Result<[u8; KEY_LEN], TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    secret
        .as_bytes()
        .get(..KEY_LEN)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(TokenError::SecretTooShort { len: secret.len() })
}

/// XOR `buf` in place with the AES-128-CTR keystream.
fn apply_keystream(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], buf: &mut [u8]) {
    let mut cipher = Aes128Ctr::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));
    cipher.apply_keystream(buf);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SECRET: &str = "correct-horse-battery-staple";

    #[test]
    fn test_round_trip() {
        let url = "https://example.com/report.json";
        let token = encrypt(url, SECRET).unwrap();

        assert_eq!(decrypt(&token, SECRET).unwrap(), url);
    }

    #[test]
    fn test_round_trip_all_printable_ascii() {
        let url: String = (0x20u8..0x7f).map(char::from).collect();
        let token = encrypt(&url, SECRET).unwrap();

        assert_eq!(decrypt(&token, SECRET).unwrap(), url);
    }

    #[test]
    fn test_round_trip_various_urls() {
        for url in [
            "",
            "h",
            "https://bucket.s3.eu-west-1.amazonaws.com/reports/2024/run%201.json",
            "http://localhost:9000/minio-bucket/a/b/c.json?x=1&y=2#frag",
            "https://example.com/ünïcödé/report.json",
        ] {
            let token = encrypt(url, SECRET).unwrap();
            assert_eq!(decrypt(&token, SECRET).unwrap(), url, "url: {url}");
        }
    }

    #[test]
    fn test_token_is_url_safe_and_unpadded() {
        let token = encrypt("https://example.com/?q=~~~~~~~~~~~", SECRET).unwrap();

        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_encrypt_with_iv_is_deterministic() {
        let iv = [7u8; IV_LEN];
        let a = encrypt_with_iv("https://example.com/report.json", SECRET, iv).unwrap();
        let b = encrypt_with_iv("https://example.com/report.json", SECRET, iv).unwrap();

        assert_eq!(a, b);
        // The IV is carried verbatim in front of the ciphertext
        let decoded = BASE64_URL_SAFE_NO_PAD.decode(&a).unwrap();
        assert_eq!(&decoded[..IV_LEN], &iv);
    }

    #[test]
    fn test_random_iv_differs_between_tokens() {
        let a = encrypt("https://example.com/report.json", SECRET).unwrap();
        let b = encrypt("https://example.com/report.json", SECRET).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_accepts_padding_and_standard_alphabet() {
        let url = "https://example.com/report.json";
        let token = encrypt(url, SECRET).unwrap();

        let padded = format!("{token}{}", "=".repeat((4 - token.len() % 4) % 4));
        assert_eq!(decrypt(&padded, SECRET).unwrap(), url);

        let standard = token.replace('-', "+").replace('_', "/");
        assert_eq!(decrypt(&standard, SECRET).unwrap(), url);
    }

    #[test]
    fn test_only_first_sixteen_secret_bytes_matter() {
        let url = "https://example.com/report.json";
        let token = encrypt(url, "0123456789abcdefXXXX").unwrap();

        assert_eq!(decrypt(&token, "0123456789abcdefYYYY").unwrap(), url);
    }

    #[test]
    fn test_wrong_secret_yields_garbage_not_error() {
        let url = "https://example.com/report.json";
        let token = encrypt(url, SECRET).unwrap();

        let decrypted = decrypt(&token, "a-completely-different-secret").unwrap();
        assert_ne!(decrypted, url);
    }

    #[test]
    fn test_malformed_token_is_decode_error() {
        let err = decrypt("abc$%^&", SECRET).unwrap_err();
        assert!(matches!(err, TokenError::Decode(_)), "got {err:?}");

        let err = decrypt("a", SECRET).unwrap_err();
        assert!(matches!(err, TokenError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_short_token_is_rejected() {
        let token = BASE64_URL_SAFE_NO_PAD.encode([1u8; 10]);
        let err = decrypt(&token, SECRET).unwrap_err();

        assert!(matches!(err, TokenError::TooShort { len: 10 }), "got {err:?}");
    }

    #[test]
    fn test_iv_only_token_decrypts_to_empty_string() {
        let token = BASE64_URL_SAFE_NO_PAD.encode([1u8; IV_LEN]);

        assert_eq!(decrypt(&token, SECRET).unwrap(), "");
    }

    #[test]
    fn test_missing_secret() {
        assert!(matches!(
            decrypt("AAAA", "").unwrap_err(),
            TokenError::MissingSecret
        ));
        assert!(matches!(
            encrypt("https://example.com", "").unwrap_err(),
            TokenError::MissingSecret
        ));
    }

    #[test]
    fn test_short_secret() {
        let err = encrypt("https://example.com", "short").unwrap_err();
        assert!(matches!(err, TokenError::SecretTooShort { len: 5 }));
    }

    #[test]
    fn test_keystream_matches_nist_vector() {
        // NIST SP 800-38A, F.5.1 CTR-AES128.Encrypt, block #1
        let key = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ];
        let iv = [
            0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd,
            0xfe, 0xff,
        ];
        let mut block = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];

        apply_keystream(&key, &iv, &mut block);

        assert_eq!(
            block,
            [
                0x87, 0x4d, 0x61, 0x91, 0xb6, 0x20, 0xe3, 0x26, 0x1b, 0xef, 0x68, 0x64, 0x99, 0x0d,
                0xb6, 0xce,
            ]
        );
    }
}
