use crate::error::{GameError, GameResult};
use crate::message::{MatchSnapshot, MoveRequest};
use crate::state::{Match, MatchId, PlayerId};
use crate::store::{InMemoryMatchStore, MatchStore};
use crate::validate;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 对外的对局服务
///
/// 每个对局一把锁，所有 读-改-存 都在锁内完成；不同对局之间互不影响。
/// 失败的操作不会写回存储。
pub struct MatchService<S: MatchStore = InMemoryMatchStore> {
    store: S,
    // 创建对局或首次访问已存储的对局时建锁，删除对局时移除
    locks: DashMap<MatchId, Arc<Mutex<()>>>,
}

impl MatchService {
    pub fn in_memory() -> Self {
        MatchService::new(InMemoryMatchStore::new())
    }
}

impl<S: MatchStore> MatchService<S> {
    pub fn new(store: S) -> Self {
        MatchService { store, locks: DashMap::new() }
    }

    pub fn create_match(&self, name: impl Into<String>, num_players: usize) -> GameResult<MatchId> {
        Ok(self.insert(Match::new(name, num_players)?))
    }

    /// 同 `create_match`，但颜色分配和洗牌由给定的随机数发生器决定
    pub fn create_match_with_rng(&self, name: impl Into<String>, num_players: usize, rng: StdRng) -> GameResult<MatchId> {
        Ok(self.insert(Match::with_rng(name, num_players, rng)?))
    }

    fn insert(&self, game: Match) -> MatchId {
        let id = Uuid::new_v4();
        self.locks.insert(id, Arc::default());
        info!(match_id = %id, name = %game.name, num_players = game.num_players, "创建对局");
        self.store.save(id, game);
        id
    }

    /// 取对局的锁；存储里已有、但锁表里还没有的对局 (例如服务启动前就存进去的) 在这里补建
    fn lock_for(&self, id: &MatchId) -> GameResult<Arc<Mutex<()>>> {
        let existing = self.locks.get(id).map(|lock| lock.value().clone());
        if let Some(lock) = existing {
            return Ok(lock);
        }
        if self.store.find(id).is_none() {
            return Err(GameError::MatchNotFound(*id));
        }
        Ok(self.locks.entry(*id).or_default().value().clone())
    }

    /// 在对局锁内读出、修改并写回；`f` 失败时存储保持原样
    fn update(&self, id: &MatchId, f: impl FnOnce(&mut Match) -> GameResult<()>) -> GameResult<Match> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock();
        let mut game = self.store.find(id).ok_or(GameError::MatchNotFound(*id))?;
        f(&mut game)?;
        Ok(self.store.save(*id, game))
    }

    pub fn add_player(&self, id: &MatchId, player: impl Into<PlayerId>) -> GameResult<Match> {
        let player = player.into();
        debug!(match_id = %id, %player, "玩家加入");
        self.update(id, |game| game.add_player(player))
    }

    /// 不在对局中的玩家离开不做任何事
    pub fn remove_player(&self, id: &MatchId, player: &str) -> GameResult<Match> {
        debug!(match_id = %id, player, "玩家离开");
        self.update(id, |game| {
            game.remove_player(player);
            Ok(())
        })
    }

    pub fn validate_move_structure(&self, mv: &MoveRequest) -> GameResult<()> {
        validate::validate_move_structure(mv)
    }

    /// 先做结构检查，再在锁内执行出牌和轮次记账
    pub fn apply_move(&self, id: &MatchId, mv: &MoveRequest) -> GameResult<Match> {
        self.validate_move_structure(mv)?;
        self.update(id, |game| game.handle_move(mv))
    }

    pub fn find_match(&self, id: &MatchId) -> Option<Match> {
        self.store.find(id)
    }

    pub fn snapshot_for(&self, id: &MatchId, player: &str) -> GameResult<MatchSnapshot> {
        self.store
            .find(id)
            .map(|game| game.snapshot_for(player))
            .ok_or(GameError::MatchNotFound(*id))
    }

    /// 各玩家出牌次数，供对局结束后做统计
    pub fn turn_counts(&self, id: &MatchId) -> GameResult<HashMap<PlayerId, u32>> {
        self.store
            .find(id)
            .map(|game| game.turn_counts().clone())
            .ok_or(GameError::MatchNotFound(*id))
    }

    /// 对局完成或终止后由调用方清理
    pub fn delete_match(&self, id: &MatchId) {
        if let Ok(lock) = self.lock_for(id) {
            let _guard = lock.lock();
            self.store.delete(id);
        }
        self.locks.remove(id);
        info!(match_id = %id, "删除对局");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MatchStatus;
    use rand::SeedableRng;
    use std::thread;

    #[test]
    fn test_create_and_join() {
        let service = MatchService::in_memory();
        let id = service.create_match("Alpha", 2).unwrap();
        let game = service.add_player(&id, "P1").unwrap();
        assert_eq!(game.status, MatchStatus::Waiting);
        let game = service.add_player(&id, "P2").unwrap();
        assert_eq!(game.status, MatchStatus::InProgress);
        assert_eq!(service.find_match(&id).unwrap().status, MatchStatus::InProgress);
    }

    #[test]
    fn test_invalid_player_count() {
        let service = MatchService::in_memory();
        assert_eq!(service.create_match("x", 9), Err(GameError::InvalidPlayerCount(9)));
    }

    #[test]
    fn test_unknown_match() {
        let service = MatchService::in_memory();
        let id = Uuid::new_v4();
        assert_eq!(service.add_player(&id, "P1").unwrap_err(), GameError::MatchNotFound(id));
        assert_eq!(service.remove_player(&id, "P1").unwrap_err(), GameError::MatchNotFound(id));
        assert_eq!(
            service.apply_move(&id, &MoveRequest::forfeit("P1")).unwrap_err(),
            GameError::MatchNotFound(id)
        );
        assert_eq!(service.snapshot_for(&id, "P1").unwrap_err(), GameError::MatchNotFound(id));
    }

    #[test]
    fn test_failed_move_is_not_saved() {
        let service = MatchService::in_memory();
        let id = service.create_match_with_rng("Alpha", 2, StdRng::seed_from_u64(3)).unwrap();
        service.add_player(&id, "P1").unwrap();
        service.add_player(&id, "P2").unwrap();
        let before = service.find_match(&id).unwrap();

        let err = service.apply_move(&id, &MoveRequest::forfeit("P2")).unwrap_err();
        assert!(matches!(err, GameError::NotYourTurn { .. }));
        let after = service.find_match(&id).unwrap();
        assert_eq!(after.hands, before.hands);
        assert_eq!(after.cur_player_idx, before.cur_player_idx);

        // 结构错误在进锁之前就被拒绝
        let err = service.apply_move(&id, &MoveRequest::default()).unwrap_err();
        assert!(matches!(err, GameError::InvalidMoveFormat(_)));
    }

    #[test]
    fn test_forfeit_and_turn_counts() {
        let service = MatchService::in_memory();
        let id = service.create_match("Alpha", 2).unwrap();
        service.add_player(&id, "P1").unwrap();
        service.add_player(&id, "P2").unwrap();

        let game = service.apply_move(&id, &MoveRequest::forfeit("P1")).unwrap();
        assert_eq!(game.current_player().map(String::as_str), Some("P2"));
        let counts = service.turn_counts(&id).unwrap();
        assert_eq!(counts.get("P1"), Some(&0));
        assert_eq!(counts.get("P2"), Some(&0));
    }

    #[test]
    fn test_service_over_existing_store() {
        let store = InMemoryMatchStore::new();
        let id = Uuid::new_v4();
        store.save(id, Match::new("Durable", 2).unwrap());
        let service = MatchService::new(store);

        assert!(service.find_match(&id).is_some());
        let game = service.add_player(&id, "P1").unwrap();
        assert_eq!(game.players, vec!["P1".to_string()]);
        let game = service.add_player(&id, "P2").unwrap();
        assert_eq!(game.status, MatchStatus::InProgress);
        assert_eq!(service.locks.len(), 1);

        // 存储里没有的 id 不会留下锁
        let missing = Uuid::new_v4();
        assert_eq!(service.add_player(&missing, "P1").unwrap_err(), GameError::MatchNotFound(missing));
        assert!(!service.locks.contains_key(&missing));
        assert_eq!(service.locks.len(), 1);
    }

    #[test]
    fn test_delete_match() {
        let service = MatchService::in_memory();
        let id = service.create_match("Alpha", 2).unwrap();
        service.delete_match(&id);
        assert!(service.find_match(&id).is_none());
        assert_eq!(service.add_player(&id, "P1").unwrap_err(), GameError::MatchNotFound(id));
        // 重复删除没有影响
        service.delete_match(&id);
    }

    #[test]
    fn test_concurrent_joins_fill_exactly() {
        let service = MatchService::in_memory();
        let id = service.create_match("Rush", 6).unwrap();

        let results: Vec<GameResult<Match>> = thread::scope(|s| {
            let handles: Vec<_> = (0..10)
                .map(|i| {
                    let service = &service;
                    s.spawn(move || service.add_player(&id, format!("P{}", i)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let joined = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(joined, 6);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == GameError::PlayerLimitReached));

        let game = service.find_match(&id).unwrap();
        assert_eq!(game.players.len(), 6);
        assert_eq!(game.status, MatchStatus::InProgress);
    }

    #[test]
    fn test_independent_matches() {
        let service = MatchService::in_memory();
        let a = service.create_match("A", 2).unwrap();
        let b = service.create_match("B", 2).unwrap();
        service.add_player(&a, "P1").unwrap();
        service.remove_player(&b, "P1").unwrap();

        assert_eq!(service.find_match(&a).unwrap().players, vec!["P1".to_string()]);
        assert!(service.find_match(&b).unwrap().players.is_empty());
        assert_eq!(service.find_match(&b).unwrap().status, MatchStatus::Waiting);
    }
}
