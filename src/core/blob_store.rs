use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::core::config::BlobStorageConfig;
use crate::core::{AppError, AppErrorType};

type HmacSha256 = Hmac<Sha256>;

/// Filesystem-backed blob store. Blobs live under `{root}/{patient_id}/{file_name}`
/// and are handed out through HMAC-signed, time-limited URLs. A signed URL is a
/// capability token: once issued it stays valid until its expiry, it is not
/// re-checked against the permission table.
pub struct BlobStore {
    root: PathBuf,
    signing_key: Secret<String>,
    public_base_url: String,
    signed_url_ttl_seconds: i64,
}

impl BlobStore {
    pub fn new(config: BlobStorageConfig) -> Self {
        Self {
            root: PathBuf::from(config.root_dir),
            signing_key: config.signing_key,
            public_base_url: config.public_base_url,
            signed_url_ttl_seconds: config.signed_url_ttl_seconds,
        }
    }

    fn blob_path(&self, patient_id: &str, file_name: &str) -> Result<PathBuf, AppError> {
        // file names are server-generated, but never trust them blindly
        if file_name.contains('/') || file_name.contains("..") || patient_id.contains('/') {
            return Err(AppError {
                message: Some("Invalid blob path".to_string()),
                cause: None,
                error_type: AppErrorType::PayloadValidationError,
            });
        }
        Ok(self.root.join(patient_id).join(file_name))
    }

    pub fn upload(&self, patient_id: &str, file_name: &str, bytes: &[u8]) -> Result<(), AppError> {
        let path = self.blob_path(patient_id, file_name)?;
        fs::create_dir_all(self.root.join(patient_id))?;
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        Ok(())
    }

    pub fn read(&self, patient_id: &str, file_name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.blob_path(patient_id, file_name)?;
        if !path.exists() {
            return Err(AppError::not_found("Stored file not found"));
        }
        Ok(fs::read(path)?)
    }

    pub fn remove(&self, patient_id: &str, file_name: &str) -> Result<(), AppError> {
        let path = self.blob_path(patient_id, file_name)?;
        fs::remove_file(path)?;
        Ok(())
    }

    fn signature(&self, patient_id: &str, file_name: &str, expires: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{}/{}|{}", patient_id, file_name, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Issue a time-limited download URL for a stored blob. Returns the URL and
    /// its absolute expiry as a unix timestamp.
    pub fn create_signed_url(&self, patient_id: &str, file_name: &str) -> (String, i64) {
        let expires = Utc::now().timestamp() + self.signed_url_ttl_seconds;
        let sig = self.signature(patient_id, file_name, expires);
        let url = format!(
            "{}/api/v1/records/blob/{}/{}?expires={}&sig={}",
            self.public_base_url, patient_id, file_name, expires, sig
        );
        (url, expires)
    }

    /// Check a presented signature against the expected one and the expiry clock.
    pub fn verify_signed_url(
        &self,
        patient_id: &str,
        file_name: &str,
        expires: i64,
        sig: &str,
    ) -> bool {
        if expires <= Utc::now().timestamp() {
            return false;
        }
        let raw_sig = match hex::decode(sig) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let mut mac = HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{}/{}|{}", patient_id, file_name, expires).as_bytes());
        mac.verify_slice(&raw_sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use uuid::Uuid;

    fn test_store() -> BlobStore {
        let root = std::env::temp_dir().join(format!("carevault-test-{}", Uuid::new_v4()));
        BlobStore::new(BlobStorageConfig {
            root_dir: root.to_string_lossy().to_string(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
            signing_key: Secret::new("test-signing-key".to_string()),
            signed_url_ttl_seconds: 300,
        })
    }

    #[test]
    fn uploaded_blob_reads_back_and_removes() {
        let store = test_store();
        let patient = Uuid::new_v4().to_string();

        assert_ok!(store.upload(&patient, "scan.pdf", b"report-bytes"));
        let bytes = store.read(&patient, "scan.pdf").unwrap();
        assert_eq!(bytes, b"report-bytes");

        assert_ok!(store.remove(&patient, "scan.pdf"));
        assert_err!(store.read(&patient, "scan.pdf"));
    }

    #[test]
    fn signed_url_verifies_until_tampered() {
        let store = test_store();
        let patient = Uuid::new_v4().to_string();

        let expires = Utc::now().timestamp() + 300;
        let sig = store.signature(&patient, "scan.pdf", expires);

        assert!(store.verify_signed_url(&patient, "scan.pdf", expires, &sig));
        assert!(!store.verify_signed_url(&patient, "other.pdf", expires, &sig));
        assert!(!store.verify_signed_url(&patient, "scan.pdf", expires + 1, &sig));
        assert!(!store.verify_signed_url(&patient, "scan.pdf", expires, "deadbeef"));
    }

    #[test]
    fn expired_signature_is_rejected_even_when_valid() {
        let store = test_store();
        let patient = Uuid::new_v4().to_string();

        let expires = Utc::now().timestamp() - 10;
        let sig = store.signature(&patient, "scan.pdf", expires);
        assert!(!store.verify_signed_url(&patient, "scan.pdf", expires, &sig));
    }

    #[test]
    fn path_traversal_names_are_rejected() {
        let store = test_store();
        assert_err!(store.read("p", "../etc/passwd"));
        assert_err!(store.read("p", "a/b"));
    }

    #[test]
    fn create_signed_url_embeds_expiry_and_signature() {
        let store = test_store();
        let patient = Uuid::new_v4().to_string();

        let (url, expires) = store.create_signed_url(&patient, "scan.pdf");
        assert!(url.contains(&format!("expires={}", expires)));
        assert!(url.contains("&sig="));
        assert!(expires > Utc::now().timestamp());

        let sig = url.split("&sig=").nth(1).unwrap();
        assert!(store.verify_signed_url(&patient, "scan.pdf", expires, sig));
    }
}
