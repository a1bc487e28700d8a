//! 群组目录
//!
//! 从设置存储拼装群组快照：播报设置 + 成员名单 + 每个成员绑定的 Steam 账号。
//! 轮询端在每个群组解析开始时读取一次，管理操作的修改在下一次解析时生效。

use std::sync::Arc;

use tracing::{instrument, warn};

use ticker_shared::settings::{self, SettingsStore, namespaces};

use crate::error::TickerError;
use crate::model::{Group, KnownPlayers, Member, MemberRecord, SteamId, TickerSettings};

#[derive(Clone)]
pub struct GroupDirectory {
    store: Arc<dyn SettingsStore>,
}

impl GroupDirectory {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// 所有配置过播报的群组 id
    pub async fn group_ids(&self) -> Result<Vec<String>, TickerError> {
        Ok(self.store.keys(namespaces::TICKER_SETTINGS).await?)
    }

    pub async fn settings(&self, group_id: &str) -> Result<Option<TickerSettings>, TickerError> {
        Ok(settings::get_typed(self.store.as_ref(), namespaces::TICKER_SETTINGS, group_id).await?)
    }

    pub async fn roster(&self, group_id: &str) -> Result<Vec<MemberRecord>, TickerError> {
        let roster: Option<Vec<MemberRecord>> =
            settings::get_typed(self.store.as_ref(), namespaces::MEMBERS, group_id).await?;
        Ok(roster.unwrap_or_default())
    }

    /// 成员原始绑定记录（未解析的字符串）
    pub async fn raw_identities(&self, member_id: &str) -> Result<Vec<String>, TickerError> {
        let raw: Option<Vec<String>> =
            settings::get_typed(self.store.as_ref(), namespaces::STEAM_INFO, member_id).await?;
        Ok(raw.unwrap_or_default())
    }

    /// 成员绑定的 Steam 账号，无法识别的记录跳过
    pub async fn identities(&self, member_id: &str) -> Result<Vec<SteamId>, TickerError> {
        let raw = self.raw_identities(member_id).await?;
        let mut identities = Vec::with_capacity(raw.len());
        for entry in raw {
            match entry.parse::<SteamId>() {
                Ok(id) if !identities.contains(&id) => identities.push(id),
                Ok(_) => {}
                Err(e) => warn!(member_id, error = %e, "跳过无法识别的账号绑定"),
            }
        }
        Ok(identities)
    }

    /// 读取单个群组的快照，未配置过的群组返回 `None`
    #[instrument(skip(self))]
    pub async fn load_group(&self, group_id: &str) -> Result<Option<Group>, TickerError> {
        let Some(settings) = self.settings(group_id).await? else {
            return Ok(None);
        };

        let roster = self.roster(group_id).await?;
        let mut members = Vec::with_capacity(roster.len());
        for record in roster {
            let identities = self.identities(&record.id).await?;
            members.push(Member {
                id: record.id,
                name: record.name,
                identities,
            });
        }

        Ok(Some(Group {
            id: group_id.to_string(),
            settings,
            members,
        }))
    }

    /// 全部群组中已绑定成员的账号 -> 展示名
    #[instrument(skip(self))]
    pub async fn known_players(&self) -> Result<KnownPlayers, TickerError> {
        let mut known = KnownPlayers::new();
        for group_id in self.group_ids().await? {
            let Some(group) = self.load_group(&group_id).await? else {
                continue;
            };
            for member in &group.members {
                for identity in &member.identities {
                    known.insert(*identity, member.display_name());
                }
            }
        }
        Ok(known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ticker_shared::settings::MemoryStore;

    async fn seeded() -> GroupDirectory {
        let store = Arc::new(MemoryStore::new());
        store
            .put(
                namespaces::TICKER_SETTINGS,
                "guild-1",
                json!({"enabled": true, "channel_id": "chan-1"}),
            )
            .await
            .unwrap();
        store
            .put(
                namespaces::MEMBERS,
                "guild-1",
                json!([{"id": "alice", "name": "Alice"}, {"id": "bob"}]),
            )
            .await
            .unwrap();
        store
            .put(
                namespaces::STEAM_INFO,
                "alice",
                json!(["76561198000000001", "not-an-id", "39734273"]),
            )
            .await
            .unwrap();
        GroupDirectory::new(store)
    }

    #[tokio::test]
    async fn test_load_group_joins_roster_and_identities() {
        let directory = seeded().await;
        let group = directory.load_group("guild-1").await.unwrap().unwrap();

        assert!(group.settings.enabled);
        assert_eq!(group.members.len(), 2);
        // 无效记录被跳过，重复账号去重
        assert_eq!(group.members[0].identities.len(), 1);
        assert!(group.members[1].identities.is_empty());
        assert_eq!(group.members[1].display_name(), "bob");
    }

    #[tokio::test]
    async fn test_unconfigured_group() {
        let directory = seeded().await;
        assert!(directory.load_group("guild-9").await.unwrap().is_none());
        assert_eq!(directory.group_ids().await.unwrap(), vec!["guild-1"]);
    }

    #[tokio::test]
    async fn test_known_players() {
        let directory = seeded().await;
        let known = directory.known_players().await.unwrap();
        assert_eq!(known.len(), 1);
        assert_eq!(known.name_for(39_734_273), Some("Alice"));
    }
}
