//! Déchiffrement des références de piste jiosaavn
//!
//! jiosaavn encode l'URL du flux audio en DES-ECB avec une clé fixe ;
//! l'appli mobile officielle embarque la même clé, ce n'est pas un secret.

use crate::error::{DownloadError, Result};
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, KeyInit};
use des::Des;

const KEY: &[u8; 8] = b"38346591";

type DesEcbDec = ecb::Decryptor<Des>;

/// Déchiffre la référence opaque jiosaavn en l'URL de flux en clair
/// (qualité `_96` par défaut).
fn decrypt(encrypted_b64: &str) -> Result<String> {
    let encrypted = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encrypted_b64)
        .map_err(|_| DownloadError::Decrypt)?;

    let cipher = DesEcbDec::new(KEY.into());
    let decrypted = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
        .map_err(|_| DownloadError::Decrypt)?;

    String::from_utf8(decrypted).map_err(|_| DownloadError::Decrypt)
}

/// Déchiffre `encrypted_b64` et sélectionne la qualité 320 kbps en
/// substituant le marqueur `_96` embarqué dans l'URL.
pub fn decrypt_to_320kbps_url(encrypted_b64: &str) -> Result<String> {
    let link = decrypt(encrypted_b64)?;
    Ok(link.replace("_96", "_320"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cipher::BlockEncryptMut;

    fn encrypt_for_test(plaintext: &str) -> String {
        type DesEcbEnc = ecb::Encryptor<Des>;
        let cipher = DesEcbEnc::new(KEY.into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, ciphertext)
    }

    #[test]
    fn decrypts_and_upgrades_to_320kbps() {
        let encrypted = encrypt_for_test("https://cdn.example/song_96.mp4");
        let resolved = decrypt_to_320kbps_url(&encrypted).unwrap();
        assert_eq!(resolved, "https://cdn.example/song_320.mp4");
    }

    #[test]
    fn invalid_base64_is_a_decrypt_error() {
        let err = decrypt_to_320kbps_url("not base64 !!!").unwrap_err();
        assert!(matches!(err, DownloadError::Decrypt));
    }
}
