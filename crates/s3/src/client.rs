//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bt-core.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::debug;

use bt_core::{
    EndpointConfig, Error, ListOptions, ListPage, ObjectDescriptor, ObjectReader, ObjectStore,
    RemotePath, Result,
};

/// Provider name reported for explicitly configured credentials
const STATIC_CREDENTIALS_PROVIDER: &str = "bt-static-credentials";

/// S3 client wrapper
#[derive(Debug, Clone)]
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a client from endpoint settings.
    ///
    /// Explicit access keys win; otherwise the SDK's default chain resolves
    /// credentials (environment, shared profile, instance role).
    pub async fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Self::build(endpoint, None).await
    }

    /// Create a client that takes credentials from `provider` only
    pub async fn with_credentials_provider(
        endpoint: &EndpointConfig,
        provider: impl ProvideCredentials + 'static,
    ) -> Result<Self> {
        Self::build(endpoint, Some(SharedCredentialsProvider::new(provider))).await
    }

    async fn build(
        endpoint: &EndpointConfig,
        provider: Option<SharedCredentialsProvider>,
    ) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(url) = &endpoint.url {
            url::Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid endpoint URL '{url}': {e}")))?;
            loader = loader.endpoint_url(url);
        }

        if let Some(region) = &endpoint.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(profile) = &endpoint.profile {
            loader = loader.profile_name(profile);
        }

        if let Some(provider) = provider {
            loader = loader.credentials_provider(provider);
        } else if let Some((access_key, secret_key)) = endpoint.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                STATIC_CREDENTIALS_PROVIDER,
            );
            loader = loader.credentials_provider(credentials);
        }

        let timeout = endpoint.timeout_config();
        loader = loader.timeout_config(
            aws_config::timeout::TimeoutConfig::builder()
                .connect_timeout(timeout.connect_timeout())
                .read_timeout(timeout.read_timeout())
                .build(),
        );

        // Retries are driven by the transfer engine so attempts stay bounded.
        loader = loader.retry_config(aws_config::retry::RetryConfig::disabled());

        let config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(endpoint.force_path_style)
            .build();

        debug!(
            endpoint = endpoint.url.as_deref().unwrap_or("default"),
            region = ?config.region(),
            force_path_style = endpoint.force_path_style,
            "Created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListPage> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);

        if !options.prefix.is_empty() {
            request = request.prefix(&options.prefix);
        }

        if let Some(max) = options.max_keys {
            request = request.max_keys(max);
        }

        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("listing s3://{bucket}/{}", options.prefix)))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ObjectDescriptor {
                    key: key.to_string(),
                    size: object.size().and_then(|s| u64::try_from(s).ok()),
                })
            })
            .collect();

        // Some S3-compatible services omit IsTruncated; a token alone means more pages.
        let continuation_token = match response.is_truncated() {
            Some(false) => None,
            _ => response.next_continuation_token().map(|s| s.to_string()),
        };

        Ok(ListPage {
            objects,
            continuation_token,
        })
    }

    async fn get_object(&self, path: &RemotePath) -> Result<ObjectReader> {
        let response = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &path.to_string()))?;

        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }

    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<()> {
        self.inner
            .copy_object()
            .copy_source(copy_source(src))
            .bucket(&dst.bucket)
            .key(&dst.key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{src} -> {dst}")))?;

        Ok(())
    }
}

/// `bucket/key` for the copy source header, with each key segment encoded
fn copy_source(src: &RemotePath) -> String {
    let key = src
        .key
        .split('/')
        .map(|segment| {
            url::form_urlencoded::byte_serialize(segment.as_bytes())
                .collect::<String>()
                .replace('+', "%20")
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{key}", src.bucket)
}

/// Convert an SDK error into the engine's error classes
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, context: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service) => classify_service_error(
            service.err().code(),
            service.raw().status().as_u16(),
            context,
            &DisplayErrorContext(&err).to_string(),
        ),
        SdkError::ConstructionFailure(_) => {
            Error::General(format!("{context}: {}", DisplayErrorContext(&err)))
        }
        // Dispatch failures, timeouts and unparseable responses are all worth another try.
        _ => Error::Network(format!("{context}: {}", DisplayErrorContext(&err))),
    }
}

/// Classify a service error by its S3 error code, then by HTTP status
fn classify_service_error(code: Option<&str>, status: u16, context: &str, detail: &str) -> Error {
    match code {
        Some(code @ ("NoSuchKey" | "NoSuchBucket" | "NotFound")) => {
            return Error::NotFound(format!("{code}: {context}"));
        }
        Some(
            code @ ("AccessDenied"
            | "AllAccessDisabled"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "InvalidToken"),
        ) => {
            return Error::AccessDenied(format!("{code}: {context}"));
        }
        Some(
            code @ ("SlowDown"
            | "Throttling"
            | "ThrottlingException"
            | "RequestTimeout"
            | "RequestTimeTooSkewed"
            | "InternalError"
            | "ServiceUnavailable"),
        ) => {
            return Error::Network(format!("{code}: {context}"));
        }
        _ => {}
    }

    match status {
        404 => Error::NotFound(format!("{context}: HTTP 404")),
        401 | 403 => Error::AccessDenied(format!("{context}: HTTP {status}")),
        429 | 500..=599 => Error::Network(format!("{context}: HTTP {status}")),
        _ => Error::General(format!("{context}: {detail}")),
    }
}
