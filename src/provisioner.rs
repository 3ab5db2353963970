use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use crate::error::{ConfigError, Error};
use crate::oidc::OidcClientRegistration;

const CREATE_CLIENT_PATH: &str = "/api.Dex/CreateClient";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Messages of the identity provider's administrative gRPC API (`api.Dex`).
pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Client {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub secret: ::prost::alloc::string::String,
        #[prost(string, repeated, tag = "3")]
        pub redirect_uris: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(string, repeated, tag = "4")]
        pub trusted_peers: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(bool, tag = "5")]
        pub public: bool,
        #[prost(string, tag = "6")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "7")]
        pub logo_url: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateClientReq {
        #[prost(message, optional, tag = "1")]
        pub client: ::core::option::Option<Client>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateClientResp {
        #[prost(bool, tag = "1")]
        pub already_exists: bool,
        #[prost(message, optional, tag = "2")]
        pub client: ::core::option::Option<Client>,
    }
}

/// Parameters of a client to mint.
#[derive(Clone)]
pub struct ClientRequest {
    /// Human readable name shown by the identity provider.
    pub name: String,
    /// Caller-chosen secret, already decoded.
    pub secret: String,
    pub redirect_uris: Vec<String>,
}

impl fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// Outcome of asking the identity provider for a new client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioning {
    Provisioned(OidcClientRegistration),
    ProvisioningFailed(String),
}

impl Provisioning {
    /// # Errors
    ///
    /// Returns [`Error::Provisioning`] with the failure reason.
    pub fn into_result(self) -> Result<OidcClientRegistration, Error> {
        match self {
            Self::Provisioned(registration) => Ok(registration),
            Self::ProvisioningFailed(reason) => Err(Error::Provisioning(reason)),
        }
    }
}

/// Mints `OAuth2` clients at runtime.
///
/// Implementations never fail by panicking or returning early: every failure
/// is reported as [`Provisioning::ProvisioningFailed`].
pub trait ClientProvisioner: Send + Sync + 'static {
    fn create_client(&self, request: ClientRequest) -> impl Future<Output = Provisioning> + Send;
}

/// Connection settings for the administrative API.
#[derive(Debug, Clone)]
pub struct DexSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub ca_cert: Option<PathBuf>,
    pub timeout: Duration,
}

impl DexSettings {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: false,
            ca_cert: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create settings from environment variables.
    ///
    /// # Required env vars
    /// - `DEX_GRPC_HOST`: administrative API host
    /// - `DEX_GRPC_PORT`: administrative API port
    ///
    /// # Optional env vars
    /// - `DEX_GRPC_TLS`: `"1"` or `"true"` to use TLS
    /// - `DEX_GRPC_CA_CERT`: PEM file with the CA to trust instead of the web PKI roots
    /// - `DEX_GRPC_TIMEOUT_SECS`: deadline per call (default 10)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if required env vars are missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("DEX_GRPC_HOST")
            .ok_or_else(|| ConfigError("DEX_GRPC_HOST is required".into()))?;
        let port = var("DEX_GRPC_PORT")
            .ok_or_else(|| ConfigError("DEX_GRPC_PORT is required".into()))?
            .parse::<u16>()
            .map_err(|e| ConfigError(format!("DEX_GRPC_PORT: {e}")))?;

        let mut settings = Self::new(host, port);
        settings.tls = matches!(var("DEX_GRPC_TLS").as_deref(), Some("1" | "true"));
        settings.ca_cert = var("DEX_GRPC_CA_CERT").map(PathBuf::from);
        if let Some(secs) = var("DEX_GRPC_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|e| ConfigError(format!("DEX_GRPC_TIMEOUT_SECS: {e}")))?;
            settings.timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }

    fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let scheme = if self.tls { "https" } else { "http" };
        let endpoint = Endpoint::from_shared(format!("{scheme}://{}:{}", self.host, self.port))
            .map_err(|e| ConfigError(format!("DEX_GRPC_HOST: {e}")))?
            .timeout(self.timeout);

        if !self.tls {
            return Ok(endpoint);
        }

        let tls = ClientTlsConfig::new().domain_name(self.host.clone());
        let tls = match &self.ca_cert {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    ConfigError(format!("DEX_GRPC_CA_CERT {}: {e}", path.display()))
                })?;
                tls.ca_certificate(Certificate::from_pem(pem))
            }
            None => tls.with_webpki_roots(),
        };
        endpoint
            .tls_config(tls)
            .map_err(|e| ConfigError(format!("gRPC TLS configuration: {e}")))
    }
}

/// [`ClientProvisioner`] backed by the identity provider's `CreateClient` RPC.
///
/// Owns a single channel; clones of it share the underlying connection.
#[derive(Clone)]
pub struct DexProvisioner {
    channel: Channel,
    timeout: Duration,
}

impl DexProvisioner {
    /// Opens the channel. Call once at process start.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the settings are invalid or the
    /// administrative API cannot be reached.
    pub async fn connect(settings: &DexSettings) -> Result<Self, ConfigError> {
        let channel = settings.endpoint()?.connect().await.map_err(|e| {
            ConfigError(format!(
                "cannot reach identity provider at {}:{}: {e}",
                settings.host, settings.port
            ))
        })?;
        tracing::info!(host = %settings.host, port = settings.port, tls = settings.tls, "gRPC channel established");
        Ok(Self::from_channel(channel, settings.timeout))
    }

    #[must_use]
    pub fn from_channel(channel: Channel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    async fn call_create_client(
        &self,
        request: ClientRequest,
    ) -> Result<proto::CreateClientResp, tonic::Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("channel not ready: {e}")))?;

        let message = proto::CreateClientReq {
            client: Some(proto::Client {
                name: request.name,
                secret: request.secret,
                redirect_uris: request.redirect_uris,
                ..Default::default()
            }),
        };
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);

        let codec: ProstCodec<proto::CreateClientReq, proto::CreateClientResp> =
            ProstCodec::default();
        let path = PathAndQuery::from_static(CREATE_CLIENT_PATH);
        let response = grpc.unary(request, path, codec).await?;
        Ok(response.into_inner())
    }
}

impl ClientProvisioner for DexProvisioner {
    async fn create_client(&self, request: ClientRequest) -> Provisioning {
        let name = request.name.clone();

        match tokio::time::timeout(self.timeout, self.call_create_client(request)).await {
            Ok(Ok(response)) => registration_from(response, &name),
            Ok(Err(status)) => {
                tracing::error!(
                    client_name = %name,
                    code = ?status.code(),
                    message = %status.message(),
                    "CreateClient RPC failed"
                );
                Provisioning::ProvisioningFailed(format!(
                    "CreateClient returned {:?}",
                    status.code()
                ))
            }
            Err(_) => {
                tracing::error!(client_name = %name, timeout = ?self.timeout, "CreateClient RPC timed out");
                Provisioning::ProvisioningFailed("CreateClient deadline exceeded".into())
            }
        }
    }
}

fn registration_from(response: proto::CreateClientResp, name: &str) -> Provisioning {
    if response.already_exists {
        tracing::error!(client_name = %name, "identity provider reports client already exists");
        return Provisioning::ProvisioningFailed("client already exists".into());
    }
    let Some(client) = response.client else {
        tracing::error!(client_name = %name, "CreateClient response carried no client");
        return Provisioning::ProvisioningFailed("empty CreateClient response".into());
    };
    if client.id.is_empty() || client.secret.is_empty() {
        tracing::error!(client_name = %name, "CreateClient returned a client without credentials");
        return Provisioning::ProvisioningFailed("provisioned client has no credentials".into());
    }

    tracing::info!(client_name = %name, client_id = %client.id, "OAuth client provisioned");
    Provisioning::Provisioned(OidcClientRegistration::new(client.id, client.secret))
}
