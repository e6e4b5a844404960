//! Gateway identity & ACL manager. Grounded on `bridger/gateway.py` and the
//! EMQX admin surface in `bridger/emqx/{__init__,api,authentication,authorization}.py`.

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use tracing::instrument;

use crate::error::{AdminApiError, GatewayError, NodeIdError};
use crate::node_id;

static GATEWAY_USER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)-([0-9a-fA-F]{8})$").unwrap());

const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_LEN: usize = 10;

/// `(node_id, owner_id)` pair; the broker username is fully derived from it
/// (spec §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayRecord {
    pub node_id: u32,
    pub owner_id: u64,
}

impl GatewayRecord {
    pub fn user_string(&self) -> String {
        format!("{}-{}", self.owner_id, node_id::hex_without_bang(self.node_id))
    }

    /// Parses a broker username matching `^[0-9]+-[0-9a-fA-F]{8}$`, used by
    /// `list_gateways` to recover gateways from the full user list.
    pub fn parse_user_string(s: &str) -> Option<Self> {
        let caps = GATEWAY_USER_PATTERN.captures(s)?;
        let owner_id: u64 = caps[1].parse().ok()?;
        let node_id = u32::from_str_radix(&caps[2], 16).ok()?;
        Some(GatewayRecord { node_id, owner_id })
    }
}

/// One authorization rule on the broker. `topic` already has the gateway's
/// node id substituted in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AclRule {
    pub action: String,
    pub topic: String,
    pub permission: String,
}

fn gateway_rule(base_topic: &str, node_id: u32) -> AclRule {
    let base = base_topic.trim_end_matches("/#");
    AclRule {
        action: "all".into(),
        topic: format!("{base}/+/!{}", node_id::hex_without_bang(node_id)),
        permission: "allow".into(),
    }
}

fn generate_password() -> String {
    let mut rng = OsRng;
    (0..PASSWORD_LEN)
        .map(|_| {
            let idx = (rng.next_u32() as usize) % PASSWORD_ALPHABET.len();
            PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

fn parse_input_id(input_id: &str) -> Result<u32, NodeIdError> {
    node_id::parse(input_id)
}

/// Broker admin HTTP API surface, split the way `bridger/emqx/*.py` splits
/// `ApiMixin`/`AuthenticationMixin`/`AuthorizationMixin`.
#[async_trait::async_trait]
pub trait EmqxAdminClient: Send + Sync {
    async fn list_users(&self) -> Result<Vec<String>, AdminApiError>;
    async fn create_user(&self, username: &str, password: &str) -> Result<(), AdminApiError>;
    async fn delete_user(&self, username: &str) -> Result<(), AdminApiError>;
    async fn update_password(&self, username: &str, password: &str) -> Result<(), AdminApiError>;
    async fn create_rule(&self, username: &str, rule: &AclRule) -> Result<(), AdminApiError>;
    async fn delete_rules(&self, username: &str) -> Result<(), AdminApiError>;
}

/// `reqwest`-backed implementation over EMQX's HTTP admin API with basic
/// auth (api-key/secret), matching `bridger/emqx/api.py::ApiMixin`.
pub struct EmqxHttpClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    client: reqwest::Client,
}

impl EmqxHttpClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            client: reqwest::Client::new(),
        }
    }

    fn users_url(&self) -> String {
        format!("{}/api/v5/authentication/password_based:built_in_database/users", self.base_url)
    }

    fn user_url(&self, username: &str) -> String {
        format!("{}/{username}", self.users_url())
    }

    fn rules_url(&self, username: &str) -> String {
        format!("{}/api/v5/authorization/sources/built_in_database/rules/users/{username}", self.base_url)
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, AdminApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AdminApiError::Status { status: status.as_u16(), body })
    }
}

#[async_trait::async_trait]
impl EmqxAdminClient for EmqxHttpClient {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<String>, AdminApiError> {
        #[derive(serde::Deserialize)]
        struct UserRow {
            user_id: String,
        }
        #[derive(serde::Deserialize)]
        struct UsersPage {
            data: Vec<UserRow>,
        }

        let response = self
            .client
            .get(self.users_url())
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await?;
        let response = self.check(response).await?;
        let page: UsersPage = response.json().await?;
        Ok(page.data.into_iter().map(|u| u.user_id).collect())
    }

    #[instrument(skip(self, password))]
    async fn create_user(&self, username: &str, password: &str) -> Result<(), AdminApiError> {
        let body = serde_json::json!({ "user_id": username, "password": password });
        let response = self
            .client
            .post(self.users_url())
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&body)
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, username: &str) -> Result<(), AdminApiError> {
        let response = self
            .client
            .delete(self.user_url(username))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }

    #[instrument(skip(self, password))]
    async fn update_password(&self, username: &str, password: &str) -> Result<(), AdminApiError> {
        let body = serde_json::json!({ "password": password });
        let response = self
            .client
            .put(self.user_url(username))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&body)
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn create_rule(&self, username: &str, rule: &AclRule) -> Result<(), AdminApiError> {
        let body = serde_json::json!({
            "rules": [{ "action": rule.action, "topic": rule.topic, "permission": rule.permission }]
        });
        let response = self
            .client
            .post(self.rules_url(username))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&body)
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_rules(&self, username: &str) -> Result<(), AdminApiError> {
        let response = self
            .client
            .delete(self.rules_url(username))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }
}

/// High-level contract over an `EmqxAdminClient`, matching `bridger/gateway.py`.
pub struct GatewayManager<C: EmqxAdminClient> {
    admin: C,
    base_topic: String,
}

impl<C: EmqxAdminClient> GatewayManager<C> {
    pub fn new(admin: C, base_topic: impl Into<String>) -> Self {
        Self { admin, base_topic: base_topic.into() }
    }

    pub async fn create_gateway(&self, input_id: &str, owner_id: u64) -> Result<(GatewayRecord, String), GatewayError> {
        let node_id = parse_input_id(input_id).map_err(|e| {
            GatewayError::new(e.to_string(), GatewayRecord { node_id: 0, owner_id })
        })?;
        let record = GatewayRecord { node_id, owner_id };
        let password = generate_password();

        self.admin
            .create_user(&record.user_string(), &password)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    GatewayError::new("gateway already exists", record.clone())
                } else {
                    GatewayError::new(e.to_string(), record.clone())
                }
            })?;

        let rule = gateway_rule(&self.base_topic, node_id);
        self.admin
            .create_rule(&record.user_string(), &rule)
            .await
            .map_err(|e| GatewayError::new(e.to_string(), record.clone()))?;

        Ok((record, password))
    }

    /// Resolves a gateway's existing broker record by node id, scanning
    /// `list_users` the way `bridger/gateway.py::get_gateway` does rather
    /// than trusting a caller-supplied owner id.
    pub async fn get_gateway(&self, input_id: &str) -> Result<GatewayRecord, AdminApiError> {
        let node_id = parse_input_id(input_id).map_err(|e| AdminApiError::NotFound(e.to_string()))?;
        let users = self.admin.list_users().await?;
        users
            .iter()
            .filter_map(|u| GatewayRecord::parse_user_string(u))
            .find(|r| r.node_id == node_id)
            .ok_or_else(|| AdminApiError::NotFound(node_id::hex_without_bang(node_id)))
    }

    pub async fn delete_gateway(&self, input_id: &str) -> Result<bool, AdminApiError> {
        let record = match self.get_gateway(input_id).await {
            Ok(record) => record,
            Err(AdminApiError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let user_ok = self.admin.delete_user(&record.user_string()).await.is_ok();
        let rules_ok = self.admin.delete_rules(&record.user_string()).await.is_ok();
        Ok(user_ok && rules_ok)
    }

    pub async fn list_gateways(&self) -> Result<Vec<GatewayRecord>, AdminApiError> {
        let users = self.admin.list_users().await?;
        Ok(users.iter().filter_map(|u| GatewayRecord::parse_user_string(u)).collect())
    }

    pub async fn reset_password(&self, input_id: &str, owner_id: u64) -> Result<(GatewayRecord, String), NodeIdError> {
        let node_id = parse_input_id(input_id)?;
        let record = GatewayRecord { node_id, owner_id };
        let password = generate_password();
        let _ = self.admin.update_password(&record.user_string(), &password).await;
        Ok((record, password))
    }

    pub async fn update_rules(&self, input_id: &str) -> Result<bool, AdminApiError> {
        let record = match self.get_gateway(input_id).await {
            Ok(record) => record,
            Err(AdminApiError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let _ = self.admin.delete_rules(&record.user_string()).await;
        let rule = gateway_rule(&self.base_topic, record.node_id);
        Ok(self.admin.create_rule(&record.user_string(), &rule).await.is_ok())
    }
}
