use std::sync::Mutex;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::oidc::{OidcClient, OidcClientRegistration};
use crate::provisioner::{ClientProvisioner, ClientRequest, Provisioning};

pub(crate) fn discovery_document(base: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/auth"),
        "token_endpoint": format!("{base}/token"),
        "userinfo_endpoint": format!("{base}/userinfo"),
        "jwks_uri": format!("{base}/keys")
    })
}

/// Identity provider stub answering discovery requests.
pub(crate) async fn mock_provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&server.uri())))
        .mount(&server)
        .await;
    server
}

pub(crate) fn oidc_client(server: &MockServer) -> OidcClient {
    OidcClient::new(server.uri().parse().unwrap())
}

pub(crate) fn web_registration() -> OidcClientRegistration {
    OidcClientRegistration::new("console-web", "web-secret")
}

/// Provisioner that records requests and echoes the requested secret back.
pub(crate) struct FakeProvisioner {
    client_id: Option<String>,
    requests: Mutex<Vec<ClientRequest>>,
}

impl FakeProvisioner {
    pub(crate) fn succeeding(client_id: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            client_id: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ClientRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ClientProvisioner for FakeProvisioner {
    async fn create_client(&self, request: ClientRequest) -> Provisioning {
        let secret = request.secret.clone();
        self.requests.lock().unwrap().push(request);
        match &self.client_id {
            Some(id) => Provisioning::Provisioned(OidcClientRegistration::new(id.clone(), secret)),
            None => Provisioning::ProvisioningFailed("unavailable".into()),
        }
    }
}
