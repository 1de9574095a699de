use crate::card::{Card, Rank};
use crate::error::{GameError, GameResult};
use crate::message::MoveRequest;
use std::collections::HashSet;

/// 真正决定走法的牌：打出王牌时是替代牌，否则是打出的牌本身
pub fn acting_card(card: Card, substitute: Option<Card>) -> GameResult<Card> {
    if card.is_wild() {
        substitute.ok_or_else(|| GameError::format("joker requires a substitute"))
    } else {
        Ok(card)
    }
}

/// 在 `apply_move` 之前对出牌请求做纯结构检查，不读也不改任何对局状态
pub fn validate_move_structure(mv: &MoveRequest) -> GameResult<()> {
    if mv.forfeit {
        return Ok(());
    }

    let (Some(card), Some(_), Some(distances)) = (mv.card, mv.player.as_ref(), mv.distances.as_ref())
    else {
        return Err(GameError::format("move is missing required data"));
    };
    let acting = acting_card(card, mv.substitute)?;

    let mut seen = HashSet::new();
    if !distances.iter().all(|(id, _)| seen.insert(*id)) {
        return Err(GameError::format("a marble is named more than once"));
    }

    match acting.rank {
        Rank::Jack => {
            if distances.len() != 2 {
                return Err(GameError::format("jack move must involve exactly two marbles"));
            }
        }
        Rank::Seven => {
            if distances.is_empty() {
                return Err(GameError::format("seven move must involve at least one marble"));
            }
            if distances.iter().any(|(_, d)| *d < 0) {
                return Err(GameError::format("seven move parts must not be negative"));
            }
            let sum: i32 = distances.iter().map(|(_, d)| d).sum();
            if sum != 7 {
                return Err(GameError::format("seven move distances must sum to 7"));
            }
        }
        rank => {
            let [(_, distance)] = distances.as_slice() else {
                return Err(GameError::format("move must involve exactly one marble"));
            };
            if !rank.legal_distances().contains(distance) {
                return Err(GameError::format(format!("{} cannot move {} steps", acting, distance)));
            }
        }
    }
    Ok(())
}
