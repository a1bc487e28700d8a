//! 比赛详情获取与报告生成
//!
//! 除了播报流程，也用于按需查询成员最近一场比赛；后者不读写水位。

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::directory::GroupDirectory;
use crate::error::TickerError;
use crate::model::{MatchSummary, Report, SteamId};
use crate::report::ReportRenderer;
use crate::upstream::MatchSource;

#[derive(Clone)]
pub struct DetailFetcher {
    source: Arc<dyn MatchSource>,
    directory: GroupDirectory,
    renderer: ReportRenderer,
}

impl DetailFetcher {
    pub fn new(
        source: Arc<dyn MatchSource>,
        directory: GroupDirectory,
        renderer: ReportRenderer,
    ) -> Self {
        Self {
            source,
            directory,
            renderer,
        }
    }

    /// 获取详情并渲染为待投递报告
    ///
    /// 详情获取失败时返回错误，调用方丢弃这场比赛（水位不回退）。
    #[instrument(skip(self, summary), fields(match_id = summary.match_id))]
    pub async fn fetch(
        &self,
        group_id: &str,
        destination: &str,
        summary: &MatchSummary,
    ) -> Result<Report, TickerError> {
        let details = self.source.match_details(summary.match_id).await?;
        let known = self.directory.known_players().await?;

        let body = self.renderer.render(&details, &known);
        debug!(known_players = known.len(), "比赛报告已生成");

        Ok(Report::new(group_id, destination, summary, body))
    }

    /// 成员所有绑定账号中最近一场比赛的报告正文
    ///
    /// 任一账号请求失败即返回错误；所有账号都没有比赛记录时返回 `None`。
    #[instrument(skip(self))]
    pub async fn latest_for_member(&self, member_id: &str) -> Result<Option<String>, TickerError> {
        let identities = self.directory.identities(member_id).await?;
        if identities.is_empty() {
            return Err(TickerError::NotLinked {
                member_id: member_id.to_string(),
            });
        }

        let Some(latest) = self.latest_of(&identities).await? else {
            return Ok(None);
        };

        let details = self.source.match_details(latest.match_id).await?;
        let known = self.directory.known_players().await?;
        Ok(Some(self.renderer.render(&details, &known)))
    }

    async fn latest_of(&self, identities: &[SteamId]) -> Result<Option<MatchSummary>, TickerError> {
        let mut latest: Option<MatchSummary> = None;
        for identity in identities {
            if let Some(candidate) = self.source.latest_match(*identity).await? {
                if latest.is_none_or(|l| candidate.match_seq_num > l.match_seq_num) {
                    latest = Some(candidate);
                }
            }
        }
        Ok(latest)
    }
}
