//! Per-service credentials, resolved once at startup.

use std::fmt;

/// The external services the bridge authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Open Build Service.
    BuildService,
    /// GitHub.
    SourceControl,
    /// Jenkins.
    CiSystem,
}

impl Service {
    fn env_prefix(self) -> &'static str {
        match self {
            Service::BuildService => "CI_BRIDGE_OBS",
            Service::SourceControl => "CI_BRIDGE_GITHUB",
            Service::CiSystem => "CI_BRIDGE_JENKINS",
        }
    }

    fn secret_suffix(self) -> &'static str {
        match self {
            Service::SourceControl => "TOKEN",
            Service::BuildService | Service::CiSystem => "PASSWORD",
        }
    }
}

/// HTTP basic-auth pair for one service.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.secret.is_empty()
    }

    /// Attach basic auth to a request unless no credentials are configured.
    pub fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.is_empty() {
            req
        } else {
            req.basic_auth(&self.user, Some(&self.secret))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Credentials for every service plus the OBS trigger token.
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    obs: Credentials,
    github: Credentials,
    jenkins: Credentials,
    obs_trigger_token: String,
}

impl CredentialStore {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |service: Service| {
            let prefix = service.env_prefix();
            let creds = Credentials {
                user: lookup(&format!("{prefix}_USER")).unwrap_or_default(),
                secret: lookup(&format!("{prefix}_{}", service.secret_suffix()))
                    .unwrap_or_default(),
            };
            if creds.is_empty() {
                tracing::warn!(?service, "{prefix}_USER not set -- requests go out unauthenticated");
            }
            creds
        };

        let obs_trigger_token = lookup("CI_BRIDGE_OBS_TOKEN").unwrap_or_default();

        Self {
            obs: read(Service::BuildService),
            github: read(Service::SourceControl),
            jenkins: read(Service::CiSystem),
            obs_trigger_token,
        }
    }

    /// Resolve the credentials for `service`.
    pub fn resolve(&self, service: Service) -> Credentials {
        match service {
            Service::BuildService => self.obs.clone(),
            Service::SourceControl => self.github.clone(),
            Service::CiSystem => self.jenkins.clone(),
        }
    }

    /// Token used by the OBS `trigger/runservice` endpoint.
    pub fn obs_trigger_token(&self) -> &str {
        &self.obs_trigger_token
    }
}
