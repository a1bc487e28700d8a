//! 静态参考数据：英雄、房间类型、游戏模式、服务器区域
//!
//! 内置表随程序发布。配置了 `ticker.reference_dir` 时，启动阶段读取其中的
//! `heroes.json`（Steam `GetHeroes` 格式）、`lobbies.json`、`modes.json`、
//! `regions.json`，覆盖同 id 的内置条目；缺失的文件忽略。

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::TickerError;

const UNKNOWN_HERO: &str = "Unknown Hero";
const UNKNOWN_LOBBY: &str = "Unknown Lobby Type";
const UNKNOWN_MODE: &str = "Unknown Game Mode";
const UNKNOWN_REGION: &str = "Unknown Matchmaking Region";

const HEROES: &[(u32, &str)] = &[
    (1, "Anti-Mage"),
    (2, "Axe"),
    (3, "Bane"),
    (4, "Bloodseeker"),
    (5, "Crystal Maiden"),
    (6, "Drow Ranger"),
    (7, "Earthshaker"),
    (8, "Juggernaut"),
    (9, "Mirana"),
    (10, "Morphling"),
    (11, "Shadow Fiend"),
    (12, "Phantom Lancer"),
    (13, "Puck"),
    (14, "Pudge"),
    (15, "Razor"),
    (16, "Sand King"),
    (17, "Storm Spirit"),
    (18, "Sven"),
    (19, "Tiny"),
    (20, "Vengeful Spirit"),
    (21, "Windranger"),
    (22, "Zeus"),
    (23, "Kunkka"),
    (25, "Lina"),
    (26, "Lion"),
    (27, "Shadow Shaman"),
    (28, "Slardar"),
    (29, "Tidehunter"),
    (30, "Witch Doctor"),
    (31, "Lich"),
    (32, "Riki"),
    (33, "Enigma"),
    (34, "Tinker"),
    (35, "Sniper"),
    (36, "Necrophos"),
    (37, "Warlock"),
    (38, "Beastmaster"),
    (39, "Queen of Pain"),
    (40, "Venomancer"),
    (41, "Faceless Void"),
    (42, "Wraith King"),
    (43, "Death Prophet"),
    (44, "Phantom Assassin"),
    (45, "Pugna"),
    (46, "Templar Assassin"),
    (47, "Viper"),
    (48, "Luna"),
    (49, "Dragon Knight"),
    (50, "Dazzle"),
    (51, "Clockwerk"),
    (52, "Leshrac"),
    (53, "Nature's Prophet"),
    (54, "Lifestealer"),
    (55, "Dark Seer"),
    (56, "Clinkz"),
    (57, "Omniknight"),
    (58, "Enchantress"),
    (59, "Huskar"),
    (60, "Night Stalker"),
    (61, "Broodmother"),
    (62, "Bounty Hunter"),
    (63, "Weaver"),
    (64, "Jakiro"),
    (65, "Batrider"),
    (66, "Chen"),
    (67, "Spectre"),
    (68, "Ancient Apparition"),
    (69, "Doom"),
    (70, "Ursa"),
    (71, "Spirit Breaker"),
    (72, "Gyrocopter"),
    (73, "Alchemist"),
    (74, "Invoker"),
    (75, "Silencer"),
    (76, "Outworld Destroyer"),
    (77, "Lycan"),
    (78, "Brewmaster"),
    (79, "Shadow Demon"),
    (80, "Lone Druid"),
    (81, "Chaos Knight"),
    (82, "Meepo"),
    (83, "Treant Protector"),
    (84, "Ogre Magi"),
    (85, "Undying"),
    (86, "Rubick"),
    (87, "Disruptor"),
    (88, "Nyx Assassin"),
    (89, "Naga Siren"),
    (90, "Keeper of the Light"),
    (91, "Io"),
    (92, "Visage"),
    (93, "Slark"),
    (94, "Medusa"),
    (95, "Troll Warlord"),
    (96, "Centaur Warrunner"),
    (97, "Magnus"),
    (98, "Timbersaw"),
    (99, "Bristleback"),
    (100, "Tusk"),
    (101, "Skywrath Mage"),
    (102, "Abaddon"),
    (103, "Elder Titan"),
    (104, "Legion Commander"),
    (105, "Techies"),
    (106, "Ember Spirit"),
    (107, "Earth Spirit"),
    (108, "Underlord"),
    (109, "Terrorblade"),
    (110, "Phoenix"),
    (111, "Oracle"),
    (112, "Winter Wyvern"),
    (113, "Arc Warden"),
    (114, "Monkey King"),
    (119, "Dark Willow"),
    (120, "Pangolier"),
    (121, "Grimstroke"),
    (123, "Hoodwink"),
    (126, "Void Spirit"),
    (128, "Snapfire"),
    (129, "Mars"),
    (131, "Ringmaster"),
    (135, "Dawnbreaker"),
    (136, "Marci"),
    (137, "Primal Beast"),
    (138, "Muerta"),
];

const LOBBIES: &[(i32, &str)] = &[
    (-1, "Invalid"),
    (0, "Public Matchmaking"),
    (1, "Practice"),
    (2, "Tournament"),
    (3, "Tutorial"),
    (4, "Co-op with Bots"),
    (5, "Team Match"),
    (6, "Solo Queue"),
    (7, "Ranked Matchmaking"),
    (8, "1v1 Solo Mid"),
    (9, "Battle Cup"),
];

const MODES: &[(u32, &str)] = &[
    (0, "None"),
    (1, "All Pick"),
    (2, "Captain's Mode"),
    (3, "Random Draft"),
    (4, "Single Draft"),
    (5, "All Random"),
    (6, "Intro"),
    (7, "Diretide"),
    (8, "Reverse Captain's Mode"),
    (9, "The Greeviling"),
    (10, "Tutorial"),
    (11, "Mid Only"),
    (12, "Least Played"),
    (13, "New Player Pool"),
    (14, "Compendium Matchmaking"),
    (15, "Custom"),
    (16, "Captains Draft"),
    (17, "Balanced Draft"),
    (18, "Ability Draft"),
    (19, "Event"),
    (20, "All Random Death Match"),
    (21, "1v1 Solo Mid"),
    (22, "Ranked All Pick"),
    (23, "Turbo"),
];

/// 服务器集群 id 区间 -> 区域名
const REGIONS: &[(u32, u32, &str)] = &[
    (111, 118, "US West"),
    (121, 124, "US East"),
    (131, 138, "Europe West"),
    (151, 156, "SE Asia"),
    (161, 163, "China"),
    (171, 171, "Australia"),
    (181, 188, "Russia"),
    (191, 192, "Europe East"),
    (200, 204, "South America"),
    (211, 214, "South Africa"),
    (221, 227, "China"),
    (231, 232, "China"),
    (241, 242, "Chile"),
    (251, 251, "Peru"),
    (261, 261, "India"),
];

#[derive(Debug, Deserialize)]
struct NamedEntry<K> {
    id: K,
    name: String,
}

/// Steam 英雄条目，`name` 是内部名（npc_dota_hero_*），展示用 `localized_name`
#[derive(Debug, Deserialize)]
struct HeroEntry {
    id: u32,
    localized_name: String,
}

#[derive(Debug, Deserialize)]
struct HeroesFile {
    result: HeroesResult,
}

#[derive(Debug, Deserialize)]
struct HeroesResult {
    heroes: Vec<HeroEntry>,
}

#[derive(Debug, Deserialize)]
struct LobbiesFile {
    lobbies: Vec<NamedEntry<i32>>,
}

#[derive(Debug, Deserialize)]
struct ModesFile {
    modes: Vec<NamedEntry<u32>>,
}

#[derive(Debug, Deserialize)]
struct RegionsFile {
    regions: Vec<NamedEntry<u32>>,
}

/// id -> 名称查询表
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    heroes: HashMap<u32, String>,
    lobbies: HashMap<i32, String>,
    modes: HashMap<u32, String>,
    regions: HashMap<u32, String>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReferenceTables {
    pub fn builtin() -> Self {
        let regions = REGIONS
            .iter()
            .flat_map(|(start, end, name)| (*start..=*end).map(move |c| (c, name.to_string())))
            .collect();

        Self {
            heroes: to_map(HEROES),
            lobbies: to_map(LOBBIES),
            modes: to_map(MODES),
            regions,
        }
    }

    /// 内置表 + 目录中的覆盖文件
    pub fn load(dir: Option<&Path>) -> Result<Self, TickerError> {
        let mut tables = Self::builtin();
        if let Some(dir) = dir {
            tables.load_overrides(dir)?;
        }
        Ok(tables)
    }

    pub fn load_overrides(&mut self, dir: &Path) -> Result<(), TickerError> {
        if let Some(file) = read_optional::<HeroesFile>(&dir.join("heroes.json"))? {
            self.heroes.extend(
                file.result
                    .heroes
                    .into_iter()
                    .map(|hero| (hero.id, hero.localized_name)),
            );
        }
        if let Some(file) = read_optional::<LobbiesFile>(&dir.join("lobbies.json"))? {
            extend(&mut self.lobbies, file.lobbies);
        }
        if let Some(file) = read_optional::<ModesFile>(&dir.join("modes.json"))? {
            extend(&mut self.modes, file.modes);
        }
        if let Some(file) = read_optional::<RegionsFile>(&dir.join("regions.json"))? {
            extend(&mut self.regions, file.regions);
        }

        info!(
            dir = %dir.display(),
            heroes = self.heroes.len(),
            lobbies = self.lobbies.len(),
            modes = self.modes.len(),
            regions = self.regions.len(),
            "参考数据已加载"
        );
        Ok(())
    }

    pub fn hero(&self, id: u32) -> &str {
        self.heroes.get(&id).map_or(UNKNOWN_HERO, String::as_str)
    }

    pub fn lobby(&self, id: i32) -> &str {
        self.lobbies.get(&id).map_or(UNKNOWN_LOBBY, String::as_str)
    }

    pub fn mode(&self, id: u32) -> &str {
        self.modes.get(&id).map_or(UNKNOWN_MODE, String::as_str)
    }

    pub fn region(&self, cluster: u32) -> &str {
        self.regions.get(&cluster).map_or(UNKNOWN_REGION, String::as_str)
    }
}

fn to_map<K: Copy + Eq + std::hash::Hash>(entries: &[(K, &str)]) -> HashMap<K, String> {
    entries
        .iter()
        .map(|(id, name)| (*id, name.to_string()))
        .collect()
}

fn extend<K: Eq + std::hash::Hash>(table: &mut HashMap<K, String>, entries: Vec<NamedEntry<K>>) {
    table.extend(entries.into_iter().map(|e| (e.id, e.name)));
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, TickerError> {
    let err = |reason: String| TickerError::ReferenceData {
        path: path.display().to_string(),
        reason,
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(err(e.to_string())),
    };

    serde_json::from_str(&raw).map(Some).map_err(|e| err(e.to_string()))
}
