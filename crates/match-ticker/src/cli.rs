//! 命令行接口
//!
//! `run` 启动播报服务；其余子命令直接修改设置存储，供运维在没有聊天机器人
//! 命令入口时管理群组。

use clap::{Parser, Subcommand};

use crate::admin::TickerAdmin;
use crate::fetcher::DetailFetcher;

/// Dota 2 比赛播报
#[derive(Parser, Debug)]
#[command(name = "match-ticker")]
#[command(version, about = "Dota 2 比赛播报服务")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 启动轮询与投递调度器，直到收到 Ctrl+C / SIGTERM
    Run,

    /// 启用群组播报
    Enable {
        group: String,
        /// 播报频道 id
        channel: String,
    },

    /// 停用群组播报
    Disable { group: String },

    /// 修改已启用群组的播报频道
    SetChannel { group: String, channel: String },

    /// 为成员绑定 Steam 账号
    ///
    /// 支持 64 位 id、32 位账号 id、STEAM_X:Y:Z、steamcommunity 和 dotabuff 链接
    Link { member: String, identity: String },

    /// 加入群组成员，已存在时更新展示名
    AddMember {
        group: String,
        member: String,
        #[arg(short, long)]
        name: Option<String>,
    },

    /// 查看群组播报状态
    Status { group: String },

    /// 查询成员最近一场比赛并输出报告，不影响播报水位
    LastMatch { member: String },
}

/// 执行管理类子命令，结果输出到标准输出
pub async fn run_admin(admin: &TickerAdmin, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run => anyhow::bail!("run 子命令不属于管理操作"),
        Commands::LastMatch { .. } => anyhow::bail!("last-match 子命令不属于管理操作"),
        Commands::Enable { group, channel } => {
            admin.enable(&group, &channel).await?;
            println!("群组 {group} 已启用比赛播报，频道 {channel}");
        }
        Commands::Disable { group } => {
            if admin.disable(&group).await? {
                println!("群组 {group} 已停用比赛播报");
            } else {
                println!("群组 {group} 尚未配置比赛播报");
            }
        }
        Commands::SetChannel { group, channel } => {
            admin.set_channel(&group, &channel).await?;
            println!("群组 {group} 的播报频道已改为 {channel}");
        }
        Commands::Link { member, identity } => {
            if admin.link(&member, &identity).await? {
                println!("已为 {member} 绑定账号 {identity}");
            } else {
                println!("{member} 已绑定过账号 {identity}");
            }
        }
        Commands::AddMember {
            group,
            member,
            name,
        } => {
            admin.add_member(&group, &member, name).await?;
            println!("已将 {member} 加入群组 {group}");
        }
        Commands::Status { group } => {
            let status = admin.status(&group).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

/// 输出成员最近一场比赛的报告
pub async fn run_last_match(fetcher: &DetailFetcher, member: &str) -> anyhow::Result<()> {
    match fetcher.latest_for_member(member).await? {
        Some(report) => println!("{report}"),
        None => println!("{member} 绑定的账号没有公开的比赛记录"),
    }
    Ok(())
}
