use crate::board::{Board, Color, MarbleId};
use crate::card::{Card, Hand};
use crate::state::{MatchId, MatchStatus, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 有序的 弹珠 → 步数 映射，顺序就是执行顺序 (7 的拆分走法依赖它)
pub type Distances = Vec<(MarbleId, i32)>;

// --- 出牌请求 ---

/// 客户端提交的一步棋
///
/// 字段都是可选的：结构是否完整由 [`validate_move_structure`](crate::validate_move_structure) 检查，
/// 而不是在反序列化时就失败。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveRequest {
    pub player: Option<PlayerId>,
    /// 打出的牌 (从手牌中移除的是这张)
    pub card: Option<Card>,
    /// 打出王牌时代替它生效的牌
    pub substitute: Option<Card>,
    pub distances: Option<Distances>,
    /// 弃权：清空手牌，不动棋盘
    #[serde(default)]
    pub forfeit: bool,
}

impl MoveRequest {
    pub fn play(player: impl Into<PlayerId>, card: Card, distances: Distances) -> MoveRequest {
        MoveRequest {
            player: Some(player.into()),
            card: Some(card),
            substitute: None,
            distances: Some(distances),
            forfeit: false,
        }
    }

    pub fn with_substitute(mut self, substitute: Card) -> MoveRequest {
        self.substitute = Some(substitute);
        self
    }

    pub fn forfeit(player: impl Into<PlayerId>) -> MoveRequest {
        MoveRequest {
            player: Some(player.into()),
            forfeit: true,
            ..MoveRequest::default()
        }
    }
}

// --- 面向不同受众的状态快照 ---

/// 等候室视图
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WaitingView {
    pub status: MatchStatus,
    pub name: String,
    pub players: Vec<PlayerId>,
}

/// 对局结束 (终止或完成) 后的视图
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FinishedView {
    pub status: MatchStatus,
    /// 正常结束时是赢家；提前终止时是离开的玩家
    pub winner: Option<PlayerId>,
}

/// 发给某一位玩家的完整视图，只包含他自己的手牌
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub name: String,
    pub board: Option<Board>,
    pub players: Vec<PlayerId>,
    pub player_colors: HashMap<PlayerId, Color>,
    pub current_color: Option<Color>,
    pub last_card: Option<Card>,
    pub status: MatchStatus,
    pub winner: Option<PlayerId>,
    pub player: PlayerId,
    pub hand: Option<Hand>,
    pub color: Option<Color>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum MatchSnapshot {
    Waiting(WaitingView),
    Finished(FinishedView),
    Player(PlayerView),
}

// --- 客户端 -> 服务器 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientMessage {
    /// 创建一个新对局，创建者并不会自动入座
    CreateMatch { name: String, num_players: usize },
    /// 以给定的玩家标识加入对局
    JoinMatch { match_id: MatchId, player_id: PlayerId },
    /// 出牌或弃权；`player` 字段由服务器按连接身份填写
    PerformMove(MoveRequest),
    /// 离开对局
    LeaveMatch,
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ServerMessage {
    MatchCreated { match_id: MatchId },
    MatchJoined { match_id: MatchId, player_id: PlayerId },
    /// 状态快照，发送前已按接收者裁剪
    Snapshot(MatchSnapshot),
    /// 出牌被拒绝，只发给出牌的玩家
    MoveRejected { message: String },
    Info { message: String },
    Error { message: String },
}

impl From<MoveRequest> for ClientMessage {
    fn from(mv: MoveRequest) -> Self {
        ClientMessage::PerformMove(mv)
    }
}
