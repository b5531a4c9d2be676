//! The live HTTPS adapter for the ERP upsert endpoint.

use tracing::{debug, warn};
use uuid::Uuid;

use ops_config::ErpConfig;
use ops_schemas::{ErpEnvironment, ErpUpsertPayload, ErpUpsertResponse};

use crate::sign::{authorization_header, OauthCredentials};
use crate::{ErpApi, UpsertError};

pub struct UpsertClient {
    http: reqwest::Client,
    cfg: ErpConfig,
}

impl UpsertClient {
    /// Build the client. Fails only on TLS backend initialization; missing
    /// credentials surface per-request so the daemon can boot degraded.
    pub fn new(cfg: ErpConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { http, cfg })
    }

    fn credentials(&self) -> Result<OauthCredentials, UpsertError> {
        match (
            &self.cfg.consumer_key,
            &self.cfg.consumer_secret,
            &self.cfg.token_id,
            &self.cfg.token_secret,
        ) {
            (Some(ck), Some(cs), Some(tid), Some(ts)) => Ok(OauthCredentials {
                consumer_key: ck.clone(),
                consumer_secret: cs.clone(),
                token_id: tid.clone(),
                token_secret: ts.clone(),
                realm: self
                    .cfg
                    .realm
                    .clone()
                    .unwrap_or_else(|| self.cfg.account.clone().unwrap_or_default()),
            }),
            _ => Err(UpsertError::MissingCredentials),
        }
    }

    /// Environment resolution: explicit override > configured environment.
    fn resolve_env(&self, env_override: Option<ErpEnvironment>) -> ErpEnvironment {
        env_override.unwrap_or(self.cfg.environment)
    }

    fn classify_transport(e: &reqwest::Error) -> UpsertError {
        if e.is_timeout() {
            UpsertError::Transport(format!("timeout: {e}"))
        } else if e.is_connect() {
            UpsertError::Transport(format!("connect: {e}"))
        } else {
            UpsertError::Transport(e.to_string())
        }
    }
}

impl ErpApi for UpsertClient {
    async fn upsert(
        &self,
        payload: &ErpUpsertPayload,
        env_override: Option<ErpEnvironment>,
    ) -> Result<ErpUpsertResponse, UpsertError> {
        let env = self.resolve_env(env_override);
        let base_url = self
            .cfg
            .url_for(env)
            .ok_or(UpsertError::MissingEndpoint(env))?
            .to_string();
        let creds = self.credentials()?;

        let query = vec![
            ("script".to_string(), self.cfg.script_id.clone()),
            ("deploy".to_string(), self.cfg.deploy_id.clone()),
        ];
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let auth = authorization_header(&creds, "POST", &base_url, &query, &nonce, timestamp);

        debug!(item_id = %payload.item_id, env = env.as_str(), "erp upsert request");

        let resp = self
            .http
            .post(&base_url)
            .query(&query)
            .header("Authorization", auth)
            .json(payload)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        if !status.is_success() {
            warn!(item_id = %payload.item_id, status = status.as_u16(), "erp upsert non-2xx");
            return Err(UpsertError::Http {
                status: status.as_u16(),
                body: clip(&body, 512),
            });
        }

        let parsed: ErpUpsertResponse = serde_json::from_str(&body).map_err(|e| {
            // A 2xx with an unparseable body is the script misbehaving, not
            // the network; treat as a rejection so it doesn't retry forever
            // under transient policy.
            UpsertError::Semantic {
                message: format!("unparseable response ({e}): {}", clip(&body, 256)),
            }
        })?;

        if !parsed.is_success() {
            return Err(UpsertError::Semantic {
                message: parsed
                    .error_text()
                    .unwrap_or_else(|| "erp reported success=false".to_string()),
            });
        }

        debug!(item_id = %payload.item_id, erp_id = ?parsed.id, operation = ?parsed.operation, "erp upsert ok");
        Ok(parsed)
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
