//! 比赛报告渲染
//!
//! 报告正文只列出在任一群组绑定过账号的玩家，其余玩家省略，
//! 但阵营划分仍按完整玩家列表计算。

use std::fmt::Write;
use std::sync::Arc;

use crate::model::{KnownPlayers, MatchDetails, PlayerDetail};
use crate::reference::ReferenceTables;

const HEADLINE: &str = "A game of Dota just ended. Match info:";
const MATCH_URL: &str = "https://www.dotabuff.com/matches";

/// 报告渲染器
///
/// 渲染结果只取决于输入，同样的比赛详情与玩家名单总是得到相同的文本。
#[derive(Clone)]
pub struct ReportRenderer {
    tables: Arc<ReferenceTables>,
}

impl ReportRenderer {
    pub fn new(tables: Arc<ReferenceTables>) -> Self {
        Self { tables }
    }

    pub fn render(&self, details: &MatchDetails, known: &KnownPlayers) -> String {
        let mut body = String::new();

        let _ = writeln!(body, "{HEADLINE}\n");
        let _ = writeln!(body, "Lobby Type -- {}", self.tables.lobby(details.lobby_type));
        let _ = writeln!(body, "Game Mode -- {}", self.tables.mode(details.game_mode));
        let _ = writeln!(body, "Region -- {}", self.tables.region(details.cluster));
        let _ = writeln!(body, "Duration -- {}", format_duration(details.duration));
        let _ = writeln!(
            body,
            "Winning Team -- {}\n",
            if details.radiant_win { "Radiant" } else { "Dire" }
        );
        let _ = writeln!(body, "<{MATCH_URL}/{}>\n", details.match_id);

        let (radiant, dire): (Vec<_>, Vec<_>) = details
            .players
            .iter()
            .enumerate()
            .partition(|(index, player)| player.is_radiant(*index));

        self.render_team(&mut body, "Radiant Team", radiant, known);
        self.render_team(&mut body, "Dire Team", dire, known);

        body.truncate(body.trim_end().len());
        body
    }

    /// 队伍中没有已知玩家时整段省略（包括标题）
    fn render_team(
        &self,
        body: &mut String,
        title: &str,
        players: Vec<(usize, &PlayerDetail)>,
        known: &KnownPlayers,
    ) {
        let mut wrote_header = false;
        for (_, player) in players {
            let Some(name) = player.account_id.and_then(|id| known.name_for(id)) else {
                continue;
            };
            if !wrote_header {
                let _ = writeln!(body, "__**{title}**__\n");
                wrote_header = true;
            }
            self.render_player(body, name, player);
        }
    }

    fn render_player(&self, body: &mut String, name: &str, player: &PlayerDetail) {
        let _ = writeln!(body, "__Player -- {name}__");
        let _ = writeln!(body, "Hero -- {}", self.tables.hero(player.hero_id));
        let _ = writeln!(body, "Level -- {}", player.level);
        let _ = writeln!(
            body,
            "K/D/A -- {}/{}/{}",
            player.kills, player.deaths, player.assists
        );
        let _ = writeln!(body, "GPM -- {}\n", player.gold_per_min);
    }
}

/// 比赛时长，`分:秒`，秒数补零到两位
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
