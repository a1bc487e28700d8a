//! 新比赛判定
//!
//! 对一个群组，在所有成员的所有账号中找出 `match_seq_num` 最大的比赛，
//! 与群组水位比较后决定是否播报。

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::TickerError;
use crate::model::{Group, Member, MatchSummary};
use crate::upstream::MatchSource;
use crate::watermark::WatermarkStore;

/// 一次解析的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 没有比水位更新的比赛，水位不变
    Unchanged,
    /// 水位此前为 0，只记录当前最大值，不播报
    Primed(u64),
    /// 发现新比赛，水位已推进到它的 `match_seq_num`
    Advanced(MatchSummary),
}

#[derive(Clone)]
pub struct EventResolver {
    source: Arc<dyn MatchSource>,
    watermarks: WatermarkStore,
}

impl EventResolver {
    pub fn new(source: Arc<dyn MatchSource>, watermarks: WatermarkStore) -> Self {
        Self { source, watermarks }
    }

    /// 解析群组并推进水位
    ///
    /// 单个成员的上游失败不会中断整个群组；只有水位读写失败会返回错误。
    #[instrument(skip(self, group), fields(group_id = %group.id))]
    pub async fn resolve(&self, group: &Group) -> Result<Resolution, TickerError> {
        let Some(newest) = self.discover(group).await else {
            return Ok(Resolution::Unchanged);
        };

        let watermark = self.watermarks.get(&group.id).await?;

        if watermark == 0 {
            self.watermarks.set(&group.id, newest.match_seq_num).await?;
            info!(watermark = newest.match_seq_num, "群组水位初始化，本轮不播报");
            return Ok(Resolution::Primed(newest.match_seq_num));
        }

        if newest.match_seq_num > watermark {
            self.watermarks.set(&group.id, newest.match_seq_num).await?;
            info!(
                previous = watermark,
                watermark = newest.match_seq_num,
                match_id = newest.match_id,
                "发现新比赛"
            );
            return Ok(Resolution::Advanced(newest));
        }

        debug!(watermark, newest = newest.match_seq_num, "没有新比赛");
        Ok(Resolution::Unchanged)
    }

    /// 群组内所有可用成员中最新的一场比赛
    async fn discover(&self, group: &Group) -> Option<MatchSummary> {
        let mut newest: Option<MatchSummary> = None;
        for member in &group.members {
            if let Some(candidate) = self.member_latest(member).await {
                if newest.is_none_or(|n| candidate.match_seq_num > n.match_seq_num) {
                    newest = Some(candidate);
                }
            }
        }
        newest
    }

    /// 成员所有账号中最新的一场比赛；任一账号请求失败则本轮跳过该成员
    async fn member_latest(&self, member: &Member) -> Option<MatchSummary> {
        let mut newest: Option<MatchSummary> = None;
        for identity in &member.identities {
            match self.source.latest_match(*identity).await {
                Ok(Some(candidate)) => {
                    if newest.is_none_or(|n| candidate.match_seq_num > n.match_seq_num) {
                        newest = Some(candidate);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        member_id = %member.id,
                        account_id = identity.account_id(),
                        error = %e,
                        "获取成员最近比赛失败，本轮跳过该成员"
                    );
                    return None;
                }
            }
        }
        newest
    }
}
