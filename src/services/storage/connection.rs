// Storage connection strings (`Key=Value;Key=Value`)
//
// Supports the account-key form, explicit `BlobEndpoint`, SAS tokens and the
// `UseDevelopmentStorage=true` shortcut for the local emulator.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::fmt;

use crate::core::errors::{StorageError, StorageResult};

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// How requests are authorised
#[derive(Clone, PartialEq, Eq)]
pub enum StorageAuth {
    /// Shared Key signing with the decoded account key
    SharedKey { account: String, key: Vec<u8> },
    /// Pre-signed SAS query string (without leading `?`)
    Sas(String),
}

impl fmt::Debug for StorageAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Self::Sas(_) => f.debug_tuple("Sas").field(&"<redacted>").finish(),
        }
    }
}

/// Parsed connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConnection {
    /// Blob service endpoint without trailing slash
    pub blob_endpoint: String,
    pub auth: StorageAuth,
}

impl StorageConnection {
    pub fn parse(connection_string: &str) -> StorageResult<Self> {
        let mut settings: HashMap<String, String> = HashMap::new();
        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                StorageError::InvalidConnectionString(format!("segment without '=': {}", redact_segment(part)))
            })?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings.is_empty() {
            return Err(StorageError::InvalidConnectionString("empty connection string".to_string()));
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            let endpoint = settings
                .get("developmentstorageproxyuri")
                .map(|proxy| format!("{}/{}", proxy.trim_end_matches('/'), DEV_ACCOUNT_NAME))
                .unwrap_or_else(|| DEV_BLOB_ENDPOINT.to_string());
            return Ok(Self {
                blob_endpoint: endpoint,
                auth: StorageAuth::SharedKey {
                    account: DEV_ACCOUNT_NAME.to_string(),
                    key: STANDARD.decode(DEV_ACCOUNT_KEY)?,
                },
            });
        }

        let account = settings.get("accountname").cloned();
        let blob_endpoint = match settings.get("blobendpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account = account.as_deref().ok_or(StorageError::MissingSetting("AccountName"))?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        let auth = if let Some(sas) = settings.get("sharedaccesssignature") {
            StorageAuth::Sas(sas.trim_start_matches('?').to_string())
        } else {
            let account = account.ok_or(StorageError::MissingSetting("AccountName"))?;
            let key = settings
                .get("accountkey")
                .ok_or(StorageError::MissingSetting("AccountKey"))?;
            StorageAuth::SharedKey {
                account,
                key: STANDARD.decode(key)?,
            }
        };

        Ok(Self { blob_endpoint, auth })
    }

    /// Account name used in log lines
    pub fn account_label(&self) -> &str {
        match &self.auth {
            StorageAuth::SharedKey { account, .. } => account,
            StorageAuth::Sas(_) => "sas",
        }
    }
}

fn redact_segment(segment: &str) -> String {
    segment.chars().take(16).collect::<String>() + "..."
}
