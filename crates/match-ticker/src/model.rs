//! 比赛播报数据模型
//!
//! 群组、成员、Steam 账号、比赛摘要/详情与待投递报告。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TickerError;

pub type GroupId = String;
pub type MemberId = String;

// ---------------------------------------------------------------------------
// Steam 账号
// ---------------------------------------------------------------------------

static DOTABUFF_PLAYER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/players/(\d+)").expect("静态正则"));

/// 64 位 Steam id
///
/// Dota 比赛数据中的 `account_id` 是其 32 位形式：`steam_id - ACCOUNT_ID_OFFSET`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SteamId(u64);

impl SteamId {
    pub const ACCOUNT_ID_OFFSET: u64 = 76_561_197_960_265_728;

    pub fn from_account_id(account_id: u32) -> Self {
        Self(u64::from(account_id) + Self::ACCOUNT_ID_OFFSET)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// 32 位 Dota 账号 id
    pub fn account_id(self) -> u32 {
        (self.0 - Self::ACCOUNT_ID_OFFSET) as u32
    }

    /// 纯数字：大于偏移量的是 64 位 id，小于的是 32 位账号 id
    fn from_number(raw: &str, original: &str) -> Result<Self, TickerError> {
        let invalid = || TickerError::InvalidIdentity(original.to_string());
        let n: u64 = raw.parse().map_err(|_| invalid())?;

        if n > Self::ACCOUNT_ID_OFFSET {
            if n - Self::ACCOUNT_ID_OFFSET > u64::from(u32::MAX) {
                return Err(invalid());
            }
            Ok(Self(n))
        } else if n < Self::ACCOUNT_ID_OFFSET {
            let account_id = u32::try_from(n).map_err(|_| invalid())?;
            Ok(Self::from_account_id(account_id))
        } else {
            Err(invalid())
        }
    }

    /// 旧式 `STEAM_X:Y:Z`，账号 id = Z * 2 + Y
    fn from_legacy(body: &str, original: &str) -> Result<Self, TickerError> {
        let invalid = || TickerError::InvalidIdentity(original.to_string());
        let parts: Vec<&str> = body.split(':').collect();
        let [_, y, z] = parts.as_slice() else {
            return Err(invalid());
        };
        let y: u32 = y.parse().map_err(|_| invalid())?;
        let z: u32 = z.parse().map_err(|_| invalid())?;
        let account_id = z
            .checked_mul(2)
            .and_then(|v| v.checked_add(y))
            .ok_or_else(invalid)?;
        Ok(Self::from_account_id(account_id))
    }
}

impl FromStr for SteamId {
    type Err = TickerError;

    /// 支持数字 id、`STEAM_X:Y:Z`、steamcommunity 个人主页链接和 dotabuff 玩家链接。
    /// 自定义短链（vanity URL）需要调用 Steam API 解析，这里不支持。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some(body) = trimmed.strip_prefix("STEAM_") {
            return Self::from_legacy(body, s);
        }

        if trimmed.contains("steamcommunity.com/profiles/") {
            let last = trimmed.split('/').filter(|seg| !seg.is_empty()).last();
            return match last {
                Some(segment) => Self::from_number(segment, s),
                None => Err(TickerError::InvalidIdentity(s.to_string())),
            };
        }

        if trimmed.contains("dotabuff.com/players/") {
            return match DOTABUFF_PLAYER.captures(trimmed) {
                Some(caps) => Self::from_number(&caps[1], s),
                None => Err(TickerError::InvalidIdentity(s.to_string())),
            };
        }

        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Self::from_number(trimmed, s);
        }

        Err(TickerError::InvalidIdentity(s.to_string()))
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// 群组与成员
// ---------------------------------------------------------------------------

/// 群组的播报设置（存储于 `ticker_settings` 命名空间）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSettings {
    pub enabled: bool,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// 成员名单中的一条记录（存储于 `members` 命名空间）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub name: Option<String>,
    pub identities: Vec<SteamId>,
}

impl Member {
    /// 报告中展示的名字，未设置时使用成员 id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// 一次解析所需的群组快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub settings: TickerSettings,
    pub members: Vec<Member>,
}

impl Group {
    /// 启用且配置了频道时返回播报目的地
    pub fn destination(&self) -> Result<Option<&str>, TickerError> {
        if !self.settings.enabled {
            return Ok(None);
        }
        match self.settings.channel_id.as_deref() {
            Some(channel) if !channel.is_empty() => Ok(Some(channel)),
            _ => Err(TickerError::ConfigurationMissing {
                group_id: self.id.clone(),
            }),
        }
    }
}

/// 所有群组中已绑定成员的 Dota 账号 id -> 展示名
#[derive(Debug, Clone, Default)]
pub struct KnownPlayers {
    names: HashMap<u32, String>,
}

impl KnownPlayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identity: SteamId, name: impl Into<String>) {
        self.names.insert(identity.account_id(), name.into());
    }

    pub fn name_for(&self, account_id: u32) -> Option<&str> {
        self.names.get(&account_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// 比赛
// ---------------------------------------------------------------------------

/// 比赛历史中的一条摘要
///
/// `match_seq_num` 由上游单调递增分配，是排序与去重的依据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: u64,
    pub match_seq_num: u64,
}

/// 比赛详情中的单个玩家
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerDetail {
    /// 匿名玩家为 4294967295
    pub account_id: Option<u32>,
    /// 0-4 为天辉，128-132 为夜魇
    pub player_slot: Option<u8>,
    pub hero_id: u32,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub gold_per_min: u32,
}

impl PlayerDetail {
    /// 有 player_slot 时按槽位判断阵营，否则按列表位置（前 5 名为天辉）
    pub fn is_radiant(&self, index: usize) -> bool {
        match self.player_slot {
            Some(slot) => slot & 0x80 == 0,
            None => index < 5,
        }
    }
}

/// 比赛详情
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchDetails {
    pub match_id: u64,
    pub match_seq_num: u64,
    pub radiant_win: bool,
    /// 秒
    pub duration: u32,
    pub lobby_type: i32,
    pub game_mode: u32,
    pub cluster: u32,
    pub players: Vec<PlayerDetail>,
}

// ---------------------------------------------------------------------------
// 报告
// ---------------------------------------------------------------------------

/// 待投递的比赛报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: Uuid,
    pub group_id: GroupId,
    pub destination: String,
    pub match_id: u64,
    pub match_seq_num: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(group_id: &str, destination: &str, summary: &MatchSummary, body: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            group_id: group_id.to_string(),
            destination: destination.to_string(),
            match_id: summary.match_id,
            match_seq_num: summary.match_seq_num,
            body,
            created_at: Utc::now(),
        }
    }
}
