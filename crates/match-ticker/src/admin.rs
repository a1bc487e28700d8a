//! 播报设置管理
//!
//! 启用/停用群组播报、设置频道、绑定账号、维护成员名单。
//! 只负责读写设置存储，不做权限校验。

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use ticker_shared::settings::{self, SettingsStore, namespaces};

use crate::directory::GroupDirectory;
use crate::error::TickerError;
use crate::model::{MemberRecord, SteamId, TickerSettings};
use crate::watermark::WatermarkStore;

/// 群组播报状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub group_id: String,
    pub settings: Option<TickerSettings>,
    pub members: usize,
    pub linked_identities: usize,
    pub watermark: u64,
}

#[derive(Clone)]
pub struct TickerAdmin {
    store: Arc<dyn SettingsStore>,
    directory: GroupDirectory,
    watermarks: WatermarkStore,
}

impl TickerAdmin {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            directory: GroupDirectory::new(store.clone()),
            watermarks: WatermarkStore::new(store.clone()),
            store,
        }
    }

    async fn save_settings(&self, group_id: &str, value: &TickerSettings) -> Result<(), TickerError> {
        settings::put_typed(self.store.as_ref(), namespaces::TICKER_SETTINGS, group_id, value).await?;
        Ok(())
    }

    /// 启用群组播报并指定频道
    pub async fn enable(&self, group_id: &str, channel_id: &str) -> Result<(), TickerError> {
        if let Some(current) = self.directory.settings(group_id).await? {
            if current.enabled {
                return Err(TickerError::AlreadyEnabled {
                    group_id: group_id.to_string(),
                });
            }
        }

        let value = TickerSettings {
            enabled: true,
            channel_id: Some(channel_id.to_string()),
        };
        self.save_settings(group_id, &value).await?;
        info!(group_id, channel_id, "群组比赛播报已启用");
        Ok(())
    }

    /// 停用群组播报，保留频道设置；群组从未配置过时什么也不做
    pub async fn disable(&self, group_id: &str) -> Result<bool, TickerError> {
        let Some(mut current) = self.directory.settings(group_id).await? else {
            return Ok(false);
        };

        current.enabled = false;
        self.save_settings(group_id, &current).await?;
        info!(group_id, "群组比赛播报已停用");
        Ok(true)
    }

    pub async fn set_channel(&self, group_id: &str, channel_id: &str) -> Result<(), TickerError> {
        let mut current = match self.directory.settings(group_id).await? {
            Some(current) if current.enabled => current,
            _ => {
                return Err(TickerError::NotEnabled {
                    group_id: group_id.to_string(),
                });
            }
        };

        current.channel_id = Some(channel_id.to_string());
        self.save_settings(group_id, &current).await?;
        info!(group_id, channel_id, "群组播报频道已更新");
        Ok(())
    }

    /// 为成员绑定 Steam 账号，已绑定的账号返回 `false`
    pub async fn link(&self, member_id: &str, identity: &str) -> Result<bool, TickerError> {
        let steam_id: SteamId = identity.parse()?;

        let mut raw = self.directory.raw_identities(member_id).await?;
        let already_linked = raw
            .iter()
            .filter_map(|entry| entry.parse::<SteamId>().ok())
            .any(|existing| existing == steam_id);
        if already_linked {
            return Ok(false);
        }

        raw.push(steam_id.to_string());
        settings::put_typed(self.store.as_ref(), namespaces::STEAM_INFO, member_id, &raw).await?;
        info!(member_id, steam_id = %steam_id, "Steam 账号已绑定");
        Ok(true)
    }

    /// 向群组名单加入成员，已存在时更新展示名
    pub async fn add_member(
        &self,
        group_id: &str,
        member_id: &str,
        name: Option<String>,
    ) -> Result<(), TickerError> {
        let mut roster = self.directory.roster(group_id).await?;
        match roster.iter_mut().find(|record| record.id == member_id) {
            Some(record) => record.name = name,
            None => roster.push(MemberRecord {
                id: member_id.to_string(),
                name,
            }),
        }

        settings::put_typed(self.store.as_ref(), namespaces::MEMBERS, group_id, &roster).await?;
        info!(group_id, member_id, members = roster.len(), "成员名单已更新");
        Ok(())
    }

    pub async fn status(&self, group_id: &str) -> Result<GroupStatus, TickerError> {
        let settings = self.directory.settings(group_id).await?;
        let (members, linked_identities) = match self.directory.load_group(group_id).await? {
            Some(group) => (
                group.members.len(),
                group.members.iter().map(|m| m.identities.len()).sum(),
            ),
            None => (self.directory.roster(group_id).await?.len(), 0),
        };

        Ok(GroupStatus {
            group_id: group_id.to_string(),
            settings,
            members,
            linked_identities,
            watermark: self.watermarks.get(group_id).await?,
        })
    }
}
