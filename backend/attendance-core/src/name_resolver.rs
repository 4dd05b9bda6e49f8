// src/name_resolver.rs
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::attendance::DayRecord;
use crate::rate_limit::RateLimiter;
use crate::slack_client::{ChatApi, USERS_INFO};

pub fn unknown_user_placeholder(user_id: &str) -> String {
    format!("مستخدم غير معروف ({})", user_id)
}

/// User id -> display name, owned by a single report run.
#[derive(Debug, Clone, Default)]
pub struct UserNameCache {
    names: HashMap<String, String>,
}

impl UserNameCache {
    pub fn insert(&mut self, user_id: &str, name: String) {
        self.names.insert(user_id.to_string(), name);
    }

    pub fn get(&self, user_id: &str) -> Option<&str> {
        self.names.get(user_id).map(String::as_str)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.names.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Falls back to the raw id for users that were never resolved.
    pub fn display_name(&self, user_id: &str) -> String {
        self.get(user_id)
            .map(str::to_string)
            .unwrap_or_else(|| user_id.to_string())
    }
}

pub struct NameResolver<'a> {
    api: &'a dyn ChatApi,
    limiter: &'a dyn RateLimiter,
    token: &'a str,
}

impl<'a> NameResolver<'a> {
    pub fn new(api: &'a dyn ChatApi, limiter: &'a dyn RateLimiter, token: &'a str) -> Self {
        Self {
            api,
            limiter,
            token,
        }
    }

    /// Resolves each distinct id once, waiting on the limiter between lookups.
    /// A failed lookup never aborts the run.
    pub async fn resolve_all<'i, I>(&self, user_ids: I) -> UserNameCache
    where
        I: IntoIterator<Item = &'i str>,
    {
        let mut cache = UserNameCache::default();
        for user_id in user_ids {
            if cache.contains(user_id) {
                continue;
            }
            if !cache.is_empty() {
                self.limiter.wait().await;
            }
            let name = self.lookup(user_id).await;
            cache.insert(user_id, name);
        }
        info!(resolved = cache.len(), "Resolved Slack user names");
        cache
    }

    async fn lookup(&self, user_id: &str) -> String {
        match self.api.users_info(self.token, user_id).await {
            Ok(response) => match response.real_name() {
                Some(name) => {
                    debug!(user_id, name, "Resolved user name");
                    name.to_string()
                }
                None => {
                    warn!(
                        user_id,
                        method = USERS_INFO,
                        error = response.error.as_deref().unwrap_or("missing real_name"),
                        "User lookup incomplete, using placeholder"
                    );
                    unknown_user_placeholder(user_id)
                }
            },
            Err(e) => {
                warn!(user_id, "User lookup failed, using placeholder: {}", e);
                unknown_user_placeholder(user_id)
            }
        }
    }
}

/// Re-keys per-user records by display name. When two ids share a display
/// name the later one gets its id appended so grids are never merged.
pub fn key_by_display_name(
    records_by_user: BTreeMap<String, Vec<DayRecord>>,
    cache: &UserNameCache,
) -> BTreeMap<String, Vec<DayRecord>> {
    let mut by_name = BTreeMap::new();
    for (user_id, records) in records_by_user {
        let mut name = cache.display_name(&user_id);
        if by_name.contains_key(&name) {
            warn!(
                user_id = %user_id,
                name = %name,
                "Duplicate display name, disambiguating with id"
            );
            name = format!("{} ({})", name, user_id);
        }
        by_name.insert(name, records);
    }
    by_name
}
