use crate::config::BlobConfig;
use crate::error::{ServiceError, ServiceResult};

/// Uploaded object handle. `url` is what clients see, `object_key` is what
/// the store needs for later deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub object_key: String,
}

/// Seam over the external object store. Post creation uploads through this
/// before touching the database; rollback deletes through it best-effort.
pub trait BlobStore: Send + Sync {
    fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = ServiceResult<StoredObject>> + Send;

    fn delete(&self, key: &str) -> impl std::future::Future<Output = ServiceResult<()>> + Send;
}

/// S3-compatible HTTP client: `PUT {endpoint}/{bucket}/{key}` and
/// `DELETE {endpoint}/{bucket}/{key}`. Credentials are expected to be
/// handled by the endpoint (gateway-signed deployments).
#[derive(Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    config: BlobConfig,
}

impl HttpBlobStore {
    pub fn new(config: BlobConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            key
        )
    }
}

impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<StoredObject> {
        let response = self
            .client
            .put(self.object_url(key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| ServiceError::Blob(format!("upload {key}: {err}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::Blob(format!(
                "upload {key}: status {}",
                response.status()
            )));
        }

        Ok(StoredObject {
            url: self.public_url(key),
            object_key: key.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> ServiceResult<()> {
        let response = self
            .client
            .delete(self.object_url(key))
            .send()
            .await
            .map_err(|err| ServiceError::Blob(format!("delete {key}: {err}")))?;

        // 404 on delete is fine: rollback may race an already-failed upload.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::Blob(format!(
                "delete {key}: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpBlobStore {
        HttpBlobStore::new(BlobConfig {
            endpoint: "https://blobs.internal/".into(),
            bucket: "post-images".into(),
            public_base_url: "https://cdn.example.com/".into(),
        })
    }

    #[test]
    fn object_url_joins_endpoint_bucket_and_key() {
        assert_eq!(
            store().object_url("posts/42/0-cover.png"),
            "https://blobs.internal/post-images/posts/42/0-cover.png"
        );
    }

    #[test]
    fn public_url_uses_cdn_base() {
        assert_eq!(
            store().public_url("posts/42/0-cover.png"),
            "https://cdn.example.com/posts/42/0-cover.png"
        );
    }
}
