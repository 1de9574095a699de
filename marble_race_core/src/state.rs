use crate::board::{Board, Color, SAFE_ZONE_SLOTS};
use crate::card::{Card, Deck, Hand};
use crate::error::{GameError, GameResult};
use crate::message::{FinishedView, MatchSnapshot, PlayerView, WaitingView};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tracing::info;
use uuid::Uuid;

pub type MatchId = Uuid;
pub type PlayerId = String;

/// 允许的玩家人数，受调色板大小限制
pub const PLAYER_COUNT: RangeInclusive<usize> = 2..=6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchStatus {
    /// 等待玩家加入
    Waiting,
    InProgress,
    /// 有玩家填满安全区，正常结束
    Complete,
    /// 有玩家中途离开，异常结束
    Terminated,
}

fn os_rng() -> StdRng {
    StdRng::from_os_rng()
}

/// 一局弹珠赛跑
///
/// 创建时处于 `Waiting`，人满后一次性完成初始化：随机分配颜色、建棋盘、
/// 建牌鞋、发牌，然后进入 `InProgress`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub name: String,
    pub num_players: usize,
    // 加入顺序即出牌顺序
    pub players: Vec<PlayerId>,
    pub player_colors: HashMap<PlayerId, Color>,
    pub hands: HashMap<Color, Hand>,
    pub board: Option<Board>,
    pub deck: Option<Deck>,
    /// 下一轮发牌的张数
    pub hand_size: usize,
    pub cur_player_idx: usize,
    pub turn_counts: HashMap<PlayerId, u32>,
    pub last_card: Option<Card>,
    pub status: MatchStatus,
    pub winner: Option<PlayerId>,
    #[serde(skip, default = "os_rng")]
    rng: StdRng,
}

impl Match {
    pub fn new(name: impl Into<String>, num_players: usize) -> GameResult<Match> {
        Match::with_rng(name, num_players, os_rng())
    }

    /// 注入随机数发生器，颜色分配和洗牌都由它决定
    pub fn with_rng(name: impl Into<String>, num_players: usize, rng: StdRng) -> GameResult<Match> {
        if !PLAYER_COUNT.contains(&num_players) {
            return Err(GameError::InvalidPlayerCount(num_players));
        }
        Ok(Match {
            name: name.into(),
            num_players,
            players: Vec::with_capacity(num_players),
            player_colors: HashMap::new(),
            hands: HashMap::new(),
            board: None,
            deck: None,
            hand_size: crate::logic::max_hand_size(num_players),
            cur_player_idx: 0,
            turn_counts: HashMap::new(),
            last_card: None,
            status: MatchStatus::Waiting,
            winner: None,
            rng,
        })
    }

    /// 玩家入座；最后一位入座时开局
    ///
    /// 已满或不在等待状态时返回 `PlayerLimitReached`。已经入座的玩家再次加入不做任何事。
    pub fn add_player(&mut self, player: impl Into<PlayerId>) -> GameResult<()> {
        if self.status != MatchStatus::Waiting || self.players.len() >= self.num_players {
            return Err(GameError::PlayerLimitReached);
        }
        let player = player.into();
        if self.is_seated(&player) {
            return Ok(());
        }

        self.turn_counts.insert(player.clone(), 0);
        self.players.push(player);

        if self.players.len() == self.num_players {
            self.initialize();
        }
        Ok(())
    }

    /// 人满后的一次性初始化
    fn initialize(&mut self) {
        let mut palette = Color::PALETTE;
        palette.shuffle(&mut self.rng);
        let colors = &palette[..self.players.len()];

        for (player, &color) in self.players.iter().zip(colors) {
            self.player_colors.insert(player.clone(), color);
            self.hands.insert(color, Hand::new());
        }

        self.board = Some(Board::new(colors));
        self.deck = Some(Deck::new(StdRng::from_rng(&mut self.rng)));
        self.hand_size = crate::logic::max_hand_size(self.num_players);
        self.deal_out();
        self.status = MatchStatus::InProgress;
        self.cur_player_idx = 0;
        info!(name = %self.name, players = ?self.players, "人已到齐，对局开始");
    }

    /// 玩家离开
    ///
    /// - 等待中：从名单移除；最后一人离开时对局终止。
    /// - 进行中：对局立即终止，离开者记在 `winner` 字段里表示异常结束。
    /// - 不在名单中的玩家离开不做任何事。
    pub fn remove_player(&mut self, player: &str) {
        if !self.is_seated(player) {
            return;
        }
        match self.status {
            MatchStatus::Waiting => {
                self.players.retain(|p| p != player);
                self.turn_counts.remove(player);
                if self.players.is_empty() {
                    self.terminate(player);
                }
            }
            MatchStatus::InProgress => self.terminate(player),
            MatchStatus::Complete | MatchStatus::Terminated => {}
        }
    }

    fn terminate(&mut self, player: &str) {
        info!(name = %self.name, player, "对局提前终止");
        self.status = MatchStatus::Terminated;
        self.winner = Some(player.to_string());
    }

    // --- 查询 ---

    pub fn is_seated(&self, player: &str) -> bool {
        self.players.iter().any(|p| p == player)
    }

    pub fn current_player(&self) -> Option<&PlayerId> {
        match self.status {
            MatchStatus::InProgress => self.players.get(self.cur_player_idx),
            _ => None,
        }
    }

    pub fn current_color(&self) -> Option<Color> {
        self.current_player().and_then(|p| self.player_colors.get(p).copied())
    }

    pub fn player_color(&self, player: &str) -> Option<Color> {
        self.player_colors.get(player).copied()
    }

    pub fn hand_of(&self, player: &str) -> Option<&Hand> {
        self.player_color(player).and_then(|c| self.hands.get(&c))
    }

    pub(crate) fn hand_of_mut(&mut self, player: &str) -> Option<&mut Hand> {
        let color = self.player_color(player)?;
        self.hands.get_mut(&color)
    }

    /// 该玩家的安全区 4 格是否都已填满
    pub fn has_won(&self, player: &str) -> bool {
        let (Some(color), Some(board)) = (self.player_color(player), self.board.as_ref()) else {
            return false;
        };
        board
            .safe_zone(color)
            .is_some_and(|zone| zone.iter().filter(|s| s.is_some()).count() == SAFE_ZONE_SLOTS)
    }

    pub fn turn_counts(&self) -> &HashMap<PlayerId, u32> {
        &self.turn_counts
    }

    // --- 快照 ---

    pub fn waiting_view(&self) -> WaitingView {
        WaitingView {
            status: self.status,
            name: self.name.clone(),
            players: self.players.clone(),
        }
    }

    pub fn finished_view(&self) -> FinishedView {
        FinishedView {
            status: self.status,
            winner: self.winner.clone(),
        }
    }

    /// 某位玩家能看到的完整状态，其他玩家的手牌不会出现在里面
    pub fn view_for(&self, player: &str) -> PlayerView {
        PlayerView {
            name: self.name.clone(),
            board: self.board.clone(),
            players: self.players.clone(),
            player_colors: self.player_colors.clone(),
            current_color: self.current_color(),
            last_card: self.last_card,
            status: self.status,
            winner: self.winner.clone(),
            player: player.to_string(),
            hand: self.hand_of(player).cloned(),
            color: self.player_color(player),
        }
    }

    /// 按对局状态挑选合适的视图
    pub fn snapshot_for(&self, player: &str) -> MatchSnapshot {
        match self.status {
            MatchStatus::Waiting => MatchSnapshot::Waiting(self.waiting_view()),
            MatchStatus::Terminated => MatchSnapshot::Finished(self.finished_view()),
            MatchStatus::InProgress | MatchStatus::Complete => MatchSnapshot::Player(self.view_for(player)),
        }
    }
}

// --- 单元测试 ---
