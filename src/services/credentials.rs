use crate::constants::credentials as names;
use crate::errors::ToolError;
use crate::services::config::ToolGroup;
use crate::services::security::Cipher;
use crate::utils::fs_atomic::atomic_write_text_file;
use crate::utils::paths::key_path_for;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Secret storage keyed by (service, account).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, ToolError>;
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), ToolError>;
    async fn has(&self, service: &str, account: &str) -> Result<bool, ToolError> {
        Ok(self.get(service, account).await?.is_some())
    }
    /// Returns whether an entry existed.
    async fn remove(&self, service: &str, account: &str) -> Result<bool, ToolError>;
}

fn entry_key(service: &str, account: &str) -> String {
    format!("{}/{}", service, account)
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, service: &str, account: &str, secret: &str) -> Self {
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(entry_key(service, account), secret.to_string());
        }
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, ToolError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| ToolError::internal("Credential store lock poisoned"))?;
        Ok(guard.get(&entry_key(service, account)).cloned())
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), ToolError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| ToolError::internal("Credential store lock poisoned"))?;
        guard.insert(entry_key(service, account), secret.to_string());
        Ok(())
    }

    async fn remove(&self, service: &str, account: &str) -> Result<bool, ToolError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| ToolError::internal("Credential store lock poisoned"))?;
        Ok(guard.remove(&entry_key(service, account)).is_some())
    }
}

/// JSON file of encrypted entries, rewritten atomically on every change.
pub struct FileCredentialStore {
    path: PathBuf,
    cipher: Cipher,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ToolError> {
        let path = path.into();
        let cipher = Cipher::load_or_create(&key_path_for(&path))?;
        Ok(Self {
            path,
            cipher,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, ToolError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| {
            ToolError::config(format!(
                "Credential file {} is not valid JSON: {}",
                self.path.display(),
                err
            ))
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ToolError> {
        let payload = serde_json::to_string_pretty(entries)
            .map_err(|err| ToolError::internal(err.to_string()))?;
        atomic_write_text_file(&self.path, &format!("{}\n", payload), 0o600)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, ToolError> {
        let entries = self.load()?;
        match entries.get(&entry_key(service, account)) {
            Some(sealed) => self.cipher.decrypt(sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), ToolError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ToolError::internal("Credential store lock poisoned"))?;
        let mut entries = self.load()?;
        entries.insert(entry_key(service, account), self.cipher.encrypt(secret)?);
        self.persist(&entries)
    }

    async fn remove(&self, service: &str, account: &str) -> Result<bool, ToolError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ToolError::internal("Credential store lock poisoned"))?;
        let mut entries = self.load()?;
        let existed = entries.remove(&entry_key(service, account)).is_some();
        if existed {
            self.persist(&entries)?;
        }
        Ok(existed)
    }
}

/// The bearer-token capability handed to one template's handlers.
#[derive(Clone)]
pub struct TokenSource {
    store: Arc<dyn CredentialStore>,
    template: &'static str,
    service: &'static str,
    account: &'static str,
}

impl TokenSource {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        template: &'static str,
        service: &'static str,
        account: &'static str,
    ) -> Self {
        Self {
            store,
            template,
            service,
            account,
        }
    }

    /// `None` for groups that authenticate without a stored token.
    pub fn for_group(store: Arc<dyn CredentialStore>, group: ToolGroup) -> Option<Self> {
        let (service, account) = match group {
            ToolGroup::Tasks => (names::TASKS_SERVICE, names::TASKS_ACCOUNT),
            ToolGroup::Calendar => (names::CALENDAR_SERVICE, names::CALENDAR_ACCOUNT),
            ToolGroup::Graphql => (names::GRAPHQL_SERVICE, names::GRAPHQL_ACCOUNT),
            ToolGroup::Weather => return None,
        };
        Some(Self::new(store, group.as_str(), service, account))
    }

    pub fn service(&self) -> &str {
        self.service
    }

    pub fn account(&self) -> &str {
        self.account
    }

    pub async fn get_token(&self) -> Result<String, ToolError> {
        match self.store.get(self.service, self.account).await? {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ToolError::auth(format!(
                "API token not found for {}. Run `relay auth set --template {}` first.",
                self.service, self.template
            ))),
        }
    }

    pub async fn set_token(&self, token: &str) -> Result<(), ToolError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid_params("API token cannot be empty"));
        }
        self.store.set(self.service, self.account, trimmed).await
    }

    pub async fn has_token(&self) -> Result<bool, ToolError> {
        self.store.has(self.service, self.account).await
    }

    pub async fn remove_token(&self) -> Result<bool, ToolError> {
        self.store.remove(self.service, self.account).await
    }
}
