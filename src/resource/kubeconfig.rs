//! Kubeconfig Credential Extraction
//!
//! Pulls the client certificate, client key, cluster CA and API server
//! endpoint for the current context out of kubeconfig contents.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use kube::config::{AuthInfo, Kubeconfig, NamedContext};
use serde_json::Value;

/// Connection credentials for one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterCredentials {
    pub client_certificate: String,
    pub client_key: String,
    pub cluster_ca_certificate: String,
    pub endpoint: String,
}

/// Extract the credentials of the current context.
///
/// Falls back to the first context when `current-context` is unset. Fields
/// missing from the kubeconfig come back as empty strings.
pub fn extract_credentials(contents: &str) -> Result<ClusterCredentials> {
    let kubeconfig =
        Kubeconfig::from_yaml(contents).map_err(|e| Error::KubeconfigParse(e.to_string()))?;

    let current = kubeconfig.current_context.as_deref().unwrap_or_default();
    let named = resolve_context(&kubeconfig.contexts, current).ok_or_else(|| {
        Error::KubeconfigParse(format!("context {:?} not found", current))
    })?;

    let mut credentials = ClusterCredentials::default();
    let Some(context) = &named.context else {
        return Ok(credentials);
    };

    let cluster_name: Option<String> = context.cluster.clone().into();
    let cluster = kubeconfig
        .clusters
        .iter()
        .find(|c| Some(&c.name) == cluster_name.as_ref())
        .and_then(|c| c.cluster.as_ref());
    if let Some(cluster) = cluster {
        let server: Option<String> = cluster.server.clone().into();
        credentials.endpoint = server.unwrap_or_default();
        credentials.cluster_ca_certificate = decode(cluster.certificate_authority_data.as_deref())?;
    }

    let user_name: Option<String> = context.user.clone().into();
    let auth_info = kubeconfig
        .auth_infos
        .iter()
        .find(|a| Some(&a.name) == user_name.as_ref())
        .and_then(|a| a.auth_info.as_ref());
    if let Some(auth_info) = auth_info {
        credentials.client_certificate = decode(auth_info.client_certificate_data.as_deref())?;
        credentials.client_key = decode(client_key_data(auth_info)?.as_deref())?;
    }

    Ok(credentials)
}

fn resolve_context<'a>(contexts: &'a [NamedContext], current: &str) -> Option<&'a NamedContext> {
    if current.is_empty() {
        contexts.first()
    } else {
        contexts.iter().find(|c| c.name == current)
    }
}

/// The key is held as a secret string and only exposed when serialised
fn client_key_data(auth_info: &AuthInfo) -> Result<Option<String>> {
    let value = serde_json::to_value(auth_info)?;
    Ok(value
        .get("client-key-data")
        .and_then(Value::as_str)
        .map(str::to_string))
}

fn decode(data: Option<&str>) -> Result<String> {
    match data {
        Some(encoded) if !encoded.is_empty() => {
            let bytes = STANDARD.decode(encoded.trim())?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const KIND_KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: kind-dev
clusters:
- name: kind-other
  cluster:
    server: https://127.0.0.1:50000
    certificate-authority-data: b3RoZXItY2EtcGVt
- name: kind-dev
  cluster:
    server: https://127.0.0.1:43219
    certificate-authority-data: Y2x1c3Rlci1jYS1wZW0=
contexts:
- name: kind-other
  context:
    cluster: kind-other
    user: kind-other
- name: kind-dev
  context:
    cluster: kind-dev
    user: kind-dev
users:
- name: kind-dev
  user:
    client-certificate-data: Y2xpZW50LWNlcnQtcGVt
    client-key-data: Y2xpZW50LWtleS1wZW0=
"#;

    #[test]
    fn test_extracts_current_context() {
        let creds = extract_credentials(KIND_KUBECONFIG).unwrap();

        assert_eq!(creds.endpoint, "https://127.0.0.1:43219");
        assert_eq!(creds.cluster_ca_certificate, "cluster-ca-pem");
        assert_eq!(creds.client_certificate, "client-cert-pem");
        assert_eq!(creds.client_key, "client-key-pem");
    }

    #[test]
    fn test_falls_back_to_first_context() {
        let contents = KIND_KUBECONFIG.replace("current-context: kind-dev\n", "");
        let creds = extract_credentials(&contents).unwrap();

        assert_eq!(creds.endpoint, "https://127.0.0.1:50000");
        assert_eq!(creds.cluster_ca_certificate, "other-ca-pem");
        // no user entry for kind-other
        assert!(creds.client_certificate.is_empty());
        assert!(creds.client_key.is_empty());
    }

    #[test]
    fn test_unknown_current_context() {
        let contents = KIND_KUBECONFIG.replace("current-context: kind-dev", "current-context: kind-gone");
        let err = extract_credentials(&contents).unwrap_err();
        assert_matches!(err, Error::KubeconfigParse(ref msg) if msg.contains("kind-gone"));
    }

    #[test]
    fn test_malformed_contents() {
        assert_matches!(
            extract_credentials("clusters: [unterminated"),
            Err(Error::KubeconfigParse(_))
        );
        assert_matches!(extract_credentials("apiVersion: v1\n"), Err(Error::KubeconfigParse(_)));
    }
}
