use crate::board::{Board, MarbleId, Protection};
use crate::card::{Card, Rank};
use crate::error::{GameError, GameResult};
use crate::message::MoveRequest;
use crate::state::{Match, MatchStatus};
use crate::validate::{acting_card, validate_move_structure};
use tracing::{debug, info};

/// 按人数决定的最大手牌数
pub fn max_hand_size(num_players: usize) -> usize {
    match num_players {
        2 | 3 => 12,
        4..=6 => 6,
        _ => 8,
    }
}

// --- 按牌面分派的走法 ---

/// 每种牌面对应的走法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    /// J：交换两颗赛道上弹珠的位置
    Swap,
    /// A、K：预备区的弹珠上场，否则普通前进
    ActivateOrMove,
    /// 7：拆分给多颗弹珠，途经的未受保护弹珠会被吃掉
    Split,
    /// 其余牌面：一颗弹珠走固定步数
    Step,
}

impl MoveStrategy {
    pub fn for_rank(rank: Rank) -> MoveStrategy {
        match rank {
            Rank::Jack => MoveStrategy::Swap,
            Rank::Ace | Rank::King => MoveStrategy::ActivateOrMove,
            Rank::Seven => MoveStrategy::Split,
            _ => MoveStrategy::Step,
        }
    }

    /// 在棋盘上执行走法，返回本次上场的弹珠 (若有)
    pub fn execute(self, board: &mut Board, distances: &[(MarbleId, i32)]) -> GameResult<Option<MarbleId>> {
        match self {
            MoveStrategy::Swap => {
                let [(a, _), (b, _)] = distances else {
                    return Err(GameError::illegal("jack move must involve exactly two marbles"));
                };
                board.swap_marble(*a, *b)?;
                Ok(None)
            }
            MoveStrategy::ActivateOrMove => {
                let (id, distance) = single(distances)?;
                if board.in_reserve(id) {
                    board.activate_marble(id)?;
                    Ok(Some(id))
                } else {
                    board.move_marble(id, distance, false)?;
                    Ok(None)
                }
            }
            MoveStrategy::Split => {
                for (id, distance) in distances {
                    board.move_marble(*id, *distance, true)?;
                }
                Ok(None)
            }
            MoveStrategy::Step => {
                let (id, distance) = single(distances)?;
                board.move_marble(id, distance, false)?;
                Ok(None)
            }
        }
    }
}

fn single(distances: &[(MarbleId, i32)]) -> GameResult<(MarbleId, i32)> {
    match distances {
        [(id, distance)] => Ok((*id, *distance)),
        _ => Err(GameError::illegal("move must involve exactly one marble")),
    }
}

// --- 对局推进 ---

impl Match {
    /// 把一张牌作用到棋盘上
    ///
    /// 全有或全无：执行前先保存棋盘，任何一步失败都会还原，并统一报告为 `IllegalMove`。
    /// 成功后，除了刚上场的弹珠，所有被点名的弹珠都失去保护。
    pub fn apply_move(&mut self, card: Card, substitute: Option<Card>, distances: &[(MarbleId, i32)]) -> GameResult<()> {
        let acting = acting_card(card, substitute)?;
        if acting.is_wild() {
            return Err(GameError::illegal("a joker cannot stand in for a joker"));
        }
        let board = self.board.as_mut().ok_or(GameError::MatchNotInProgress)?;

        let snapshot = board.clone();
        let result = MoveStrategy::for_rank(acting.rank)
            .execute(board, distances)
            .and_then(|activated| {
                for (id, _) in distances {
                    if Some(*id) != activated {
                        board.set_protection(*id, Protection::Unprotected)?;
                    }
                }
                Ok(())
            });

        if let Err(e) = result {
            *board = snapshot;
            debug!(%card, error = %e, "走法失败，棋盘已还原");
            return Err(e.into_illegal());
        }
        Ok(())
    }

    /// 处理一个完整的出牌请求，包括轮次记账
    ///
    /// 顺序：检查轮次 -> 走棋 -> 计数 -> 记录最后一张牌并从手牌移除 -> 判胜负。
    /// 弃权只清空手牌。之后若所有人手牌都打光就重新发牌，再把轮次交给下一位。
    pub fn handle_move(&mut self, mv: &MoveRequest) -> GameResult<()> {
        validate_move_structure(mv)?;
        if self.status != MatchStatus::InProgress {
            return Err(GameError::MatchNotInProgress);
        }
        let player = mv
            .player
            .clone()
            .ok_or_else(|| GameError::format("move is missing required data"))?;
        if !self.is_seated(&player) {
            return Err(GameError::PlayerNotInMatch(player));
        }
        if self.current_player() != Some(&player) {
            return Err(GameError::NotYourTurn { player });
        }

        if mv.forfeit {
            if let Some(hand) = self.hand_of_mut(&player) {
                hand.forfeit_cards();
            }
            self.last_card = None;
            info!(name = %self.name, %player, "玩家弃权");
        } else {
            let (Some(card), Some(distances)) = (mv.card, mv.distances.as_ref()) else {
                return Err(GameError::format("move is missing required data"));
            };
            if !self.hand_of(&player).is_some_and(|h| h.contains(&card)) {
                return Err(GameError::CardNotFound(card));
            }
            let acting = acting_card(card, mv.substitute)?;
            self.check_ownership(&player, acting, distances)?;

            self.apply_move(card, mv.substitute, distances)?;

            *self.turn_counts.entry(player.clone()).or_insert(0) += 1;
            self.last_card = Some(card);
            if let Some(hand) = self.hand_of_mut(&player) {
                hand.remove_card(&card)?;
            }
            info!(name = %self.name, %player, %card, "玩家出牌");

            if self.has_won(&player) {
                info!(name = %self.name, %player, "安全区已满，对局结束");
                self.status = MatchStatus::Complete;
                self.winner = Some(player);
                return Ok(());
            }
        }

        if self.time_to_deal() {
            self.deal_out();
        }
        self.next_turn();
        Ok(())
    }

    /// J 至少要动到自己的一颗弹珠；其他牌只能动自己的弹珠
    fn check_ownership(&self, player: &str, acting: Card, distances: &[(MarbleId, i32)]) -> GameResult<()> {
        let board = self.board.as_ref().ok_or(GameError::MatchNotInProgress)?;
        let color = self
            .player_color(player)
            .ok_or_else(|| GameError::PlayerNotInMatch(player.to_string()))?;

        let mut own = 0;
        for (id, _) in distances {
            let marble = board.marble(*id).map_err(GameError::into_illegal)?;
            if marble.color == color {
                own += 1;
            }
        }

        match acting.rank {
            Rank::Jack if own == 0 => Err(GameError::illegal("a swap must involve one of your own marbles")),
            Rank::Jack => Ok(()),
            _ if own != distances.len() => Err(GameError::illegal("you can only move your own marbles")),
            _ => Ok(()),
        }
    }

    /// 给每位玩家补发当前手牌数的牌，然后推进手牌数的循环
    pub(crate) fn deal_out(&mut self) {
        let Some(deck) = self.deck.as_mut() else {
            return;
        };
        for player in &self.players {
            if let Some(color) = self.player_colors.get(player) {
                let dealt = deck.deal_hand(self.hand_size);
                self.hands.entry(*color).or_default().extend(dealt.cards().iter().copied());
            }
        }
        debug!(name = %self.name, hand_size = self.hand_size, "发牌");
        self.cycle_hand_size();
    }

    /// 6,5,4,3,2,6,... 降到 2 之后回到最大值
    fn cycle_hand_size(&mut self) {
        self.hand_size = if self.hand_size <= 2 {
            max_hand_size(self.num_players)
        } else {
            self.hand_size - 1
        };
    }

    fn time_to_deal(&self) -> bool {
        self.hands.values().all(|h| h.is_empty())
    }

    /// 按入座顺序把轮次交给下一位；手牌已空的玩家轮到时只能弃权
    fn next_turn(&mut self) {
        let n = self.players.len();
        if n > 0 {
            self.cur_player_idx = (self.cur_player_idx + 1) % n;
        }
    }
}

// --- 单元测试 ---
