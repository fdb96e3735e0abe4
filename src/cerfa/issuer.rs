use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use opendal::{ErrorKind, Operator};

use crate::db::{self, models::BeneficiaryOrganization, DbPool};
use crate::error::CerfaError;

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureImage {
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl SignatureImage {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }
}

pub fn media_type_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// The issuing organization as seen by one receipt request: the authoritative
/// beneficiary row plus its signature bytes, loaded once up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Issuer {
    pub organization: BeneficiaryOrganization,
    pub signature: Option<SignatureImage>,
}

impl Issuer {
    pub fn new(organization: BeneficiaryOrganization, signature: Option<SignatureImage>) -> Self {
        Self { organization, signature }
    }

    pub async fn resolve(pool: &DbPool, storage: &Operator) -> Result<Self, CerfaError> {
        let organization = db::get_beneficiary_organization(pool)
            .await?
            .ok_or(CerfaError::MissingIssuerConfiguration)?;

        let signature = match organization.signature.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => Some(load_signature(storage, path).await?),
            None => None,
        };

        Ok(Self::new(organization, signature))
    }
}

async fn load_signature(storage: &Operator, path: &str) -> Result<SignatureImage, CerfaError> {
    let media_type = media_type_for(path)
        .ok_or_else(|| CerfaError::Storage(format!("unsupported signature format: {}", path)))?;
    let buffer = storage.read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            CerfaError::Storage(format!("signature {} is missing from storage", path))
        } else {
            CerfaError::Storage(format!("{}: {}", path, e))
        }
    })?;
    Ok(SignatureImage { media_type, bytes: buffer.to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Address, BeneficiaryForm};
    use opendal::services::Memory;

    fn memory_storage() -> Operator {
        Operator::new(Memory::default()).expect("memory storage").finish()
    }

    fn beneficiary_form() -> BeneficiaryForm {
        BeneficiaryForm {
            label: "Test Beneficiary".into(),
            repository_code: "12345".into(),
            object: String::new(),
            address: Address {
                street_number: None,
                street: None,
                postal_code: "75001".into(),
                municipality: "Paris".into(),
            },
        }
    }

    #[test]
    fn media_types_follow_the_extension() {
        assert_eq!(media_type_for("signatures/a.PNG"), Some("image/png"));
        assert_eq!(media_type_for("a.jpeg"), Some("image/jpeg"));
        assert_eq!(media_type_for("a.gif"), None);
        assert_eq!(media_type_for("noext"), None);
    }

    #[test]
    fn data_uri_is_base64() {
        let image = SignatureImage { media_type: "image/png", bytes: b"abc".to_vec() };
        assert_eq!(image.data_uri(), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn missing_beneficiary_is_a_configuration_error() {
        let pool = db::init_memory_pool().await.expect("init pool");
        let err = Issuer::resolve(&pool, &memory_storage()).await.unwrap_err();
        assert!(matches!(err, CerfaError::MissingIssuerConfiguration));
    }

    #[tokio::test]
    async fn signature_bytes_are_loaded_from_storage() {
        let pool = db::init_memory_pool().await.expect("init pool");
        let storage = memory_storage();
        db::upsert_beneficiary_organization(&pool, &beneficiary_form()).await.unwrap();

        let issuer = Issuer::resolve(&pool, &storage).await.unwrap();
        assert!(issuer.signature.is_none());

        storage.write("signatures/sig.png", b"png-bytes".to_vec()).await.unwrap();
        db::set_beneficiary_signature(&pool, "signatures/sig.png").await.unwrap();
        let issuer = Issuer::resolve(&pool, &storage).await.unwrap();
        let signature = issuer.signature.expect("signature");
        assert_eq!(signature.media_type, "image/png");
        assert_eq!(signature.bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn dangling_signature_path_fails_instead_of_dropping_the_signature() {
        let pool = db::init_memory_pool().await.expect("init pool");
        db::upsert_beneficiary_organization(&pool, &beneficiary_form()).await.unwrap();
        db::set_beneficiary_signature(&pool, "signatures/gone.png").await.unwrap();

        let err = Issuer::resolve(&pool, &memory_storage()).await.unwrap_err();
        assert!(matches!(err, CerfaError::Storage(_)));
    }
}
