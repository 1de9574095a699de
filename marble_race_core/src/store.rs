use crate::state::{Match, MatchId};
use dashmap::DashMap;

/// 对局存储
///
/// 同步接口，后写覆盖先写。读出的是一份拷贝，修改后要 `save` 回去。
pub trait MatchStore: Send + Sync {
    fn save(&self, id: MatchId, game: Match) -> Match;
    fn find(&self, id: &MatchId) -> Option<Match>;
    fn delete(&self, id: &MatchId);
}

/// 进程内的存储，用并发哈希表按对局 id 分片加锁
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: DashMap<MatchId, Match>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn save(&self, id: MatchId, game: Match) -> Match {
        self.matches.insert(id, game.clone());
        game
    }

    fn find(&self, id: &MatchId) -> Option<Match> {
        self.matches.get(id).map(|entry| entry.value().clone())
    }

    fn delete(&self, id: &MatchId) {
        self.matches.remove(id);
    }
}
