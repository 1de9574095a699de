use crate::error::{GameError, GameResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

pub type MarbleId = usize;

/// 每种颜色占用的赛道格数，赛道总长 = 16 × 颜色数
pub const CELLS_PER_COLOR: usize = 16;
/// 每种颜色安全区的格数，填满即获胜
pub const SAFE_ZONE_SLOTS: usize = 4;
/// 每种颜色的弹珠数量
pub const MARBLES_PER_COLOR: usize = 4;

/// 玩家颜色
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl Color {
    /// 调色板，开局时从中随机挑选与人数相同的颜色
    pub const PALETTE: [Color; 6] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
    ];
}

/// 弹珠子类型，只用于显示
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum MarbleKind {
    A,
    B,
    C,
    D,
}

const KINDS: [MarbleKind; MARBLES_PER_COLOR] = [MarbleKind::A, MarbleKind::B, MarbleKind::C, MarbleKind::D];

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Protection {
    Protected,
    Unprotected,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Marble {
    pub id: MarbleId,
    pub color: Color,
    pub kind: MarbleKind,
    pub protection: Protection,
}

impl Marble {
    pub fn is_protected(&self) -> bool {
        self.protection == Protection::Protected
    }
}

/// 某种颜色的 "家"：起点、安全区和预备区
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub color: Color,
    /// 该颜色在赛道上的起点格
    pub start: usize,
    pub safe_zone: [Option<MarbleId>; SAFE_ZONE_SLOTS],
    pub reserve: BTreeSet<MarbleId>,
}

/// 一颗弹珠当前所在的位置，三者必居其一
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Location {
    Reserve,
    Track(usize),
    SafeZone(usize),
}

/// 棋盘
///
/// 赛道是一个定长的槽位数组，每格最多一颗弹珠的 id；弹珠本身存放在按 id
/// 索引的表里，永不复制。第 `i` 个颜色拥有 id `4i..4i+4` 的弹珠，起点为 `16i`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    marbles: Vec<Marble>,
    track: Vec<Option<MarbleId>>,
    homes: Vec<Home>,
}

/// `move_marble` 先计算出的落点，确认合法后才提交
enum Landing {
    Track(usize),
    SafeZone(usize),
}

impl Board {
    /// 为给定的颜色建一个新棋盘，所有弹珠都在预备区
    pub fn new(colors: &[Color]) -> Board {
        let mut marbles = Vec::with_capacity(colors.len() * MARBLES_PER_COLOR);
        let mut homes = Vec::with_capacity(colors.len());

        for (seat, &color) in colors.iter().enumerate() {
            let mut reserve = BTreeSet::new();
            for kind in KINDS {
                let id = marbles.len();
                marbles.push(Marble { id, color, kind, protection: Protection::Protected });
                reserve.insert(id);
            }
            homes.push(Home {
                color,
                start: seat * CELLS_PER_COLOR,
                safe_zone: [None; SAFE_ZONE_SLOTS],
                reserve,
            });
        }

        Board {
            marbles,
            track: vec![None; colors.len() * CELLS_PER_COLOR],
            homes,
        }
    }

    // --- 只读查询 ---

    pub fn track(&self) -> &[Option<MarbleId>] {
        &self.track
    }

    pub fn homes(&self) -> &[Home] {
        &self.homes
    }

    pub fn marbles(&self) -> &[Marble] {
        &self.marbles
    }

    pub fn home(&self, color: Color) -> Option<&Home> {
        self.homes.iter().find(|h| h.color == color)
    }

    pub fn marble(&self, id: MarbleId) -> GameResult<&Marble> {
        self.marbles.get(id).ok_or(GameError::UnknownMarble(id))
    }

    pub fn start_position(&self, color: Color) -> Option<usize> {
        self.home(color).map(|h| h.start)
    }

    /// 安全区的只读视图，用于胜负判断
    pub fn safe_zone(&self, color: Color) -> Option<&[Option<MarbleId>; SAFE_ZONE_SLOTS]> {
        self.home(color).map(|h| &h.safe_zone)
    }

    pub fn in_reserve(&self, id: MarbleId) -> bool {
        self.homes
            .get(id / MARBLES_PER_COLOR)
            .is_some_and(|h| h.reserve.contains(&id))
    }

    /// 在赛道上线性查找弹珠；不在赛道上 (在安全区或预备区) 时返回错误
    pub fn find_marble(&self, id: MarbleId) -> GameResult<usize> {
        self.track
            .iter()
            .position(|slot| *slot == Some(id))
            .ok_or(GameError::MarbleNotOnTrack(id))
    }

    pub fn locate(&self, id: MarbleId) -> GameResult<Location> {
        self.marble(id)?;
        if self.in_reserve(id) {
            return Ok(Location::Reserve);
        }
        if let Ok(pos) = self.find_marble(id) {
            return Ok(Location::Track(pos));
        }
        let home = &self.homes[id / MARBLES_PER_COLOR];
        home.safe_zone
            .iter()
            .position(|slot| *slot == Some(id))
            .map(Location::SafeZone)
            .ok_or(GameError::UnknownMarble(id))
    }

    // --- 修改操作 ---

    pub fn set_protection(&mut self, id: MarbleId, protection: Protection) -> GameResult<()> {
        let marble = self.marbles.get_mut(id).ok_or(GameError::UnknownMarble(id))?;
        marble.protection = protection;
        Ok(())
    }

    /// 把预备区的弹珠放到本色起点并设为受保护
    ///
    /// 起点上若是同色受保护弹珠则失败；其他占用者 (同色未受保护的、任意对手的)
    /// 都会先被送回各自的预备区。
    pub fn activate_marble(&mut self, id: MarbleId) -> GameResult<()> {
        let color = self.marble(id)?.color;
        let seat = id / MARBLES_PER_COLOR;
        if !self.homes[seat].reserve.contains(&id) {
            return Err(GameError::MarbleNotInReserve(id));
        }

        let start = self.homes[seat].start;
        if let Some(tenant) = self.track[start] {
            let tenant = self.marbles[tenant];
            if tenant.color == color && tenant.is_protected() {
                return Err(GameError::illegal("cannot activate onto a protected marble"));
            }
            self.evict(start);
        }

        self.homes[seat].reserve.remove(&id);
        self.marbles[id].protection = Protection::Protected;
        self.track[start] = Some(id);
        debug!(marble = id, start, "弹珠上场");
        Ok(())
    }

    /// 交换两颗赛道上弹珠的位置，不检查保护和碰撞
    pub fn swap_marble(&mut self, a: MarbleId, b: MarbleId) -> GameResult<()> {
        let pos_a = self.find_marble(a)?;
        let pos_b = self.find_marble(b)?;
        self.track.swap(pos_a, pos_b);
        debug!(a, b, pos_a, pos_b, "交换弹珠");
        Ok(())
    }

    /// 逐格移动弹珠
    ///
    /// - `distance` 为负表示后退。
    /// - 前进时每走一步之前，若游标停在本色起点且弹珠未受保护，
    ///   剩余步数减一即为安全区下标；下标小于 4 且该格为空就进入安全区，移动结束。
    /// - `bully` 为真时，途经 (非终点) 格上未受保护的弹珠会被送回预备区；否则直接跳过。
    /// - 终点上是受保护弹珠时整个移动失败，棋盘保持不变；否则占用者被送回预备区。
    ///
    /// 整条路径先计算完毕再提交，所以失败时连途中的吃子也不会发生。
    pub fn move_marble(&mut self, id: MarbleId, distance: i32, bully: bool) -> GameResult<()> {
        let marble = *self.marble(id)?;
        let origin = self.find_marble(id)?;
        if distance == 0 {
            return Ok(());
        }

        let seat = id / MARBLES_PER_COLOR;
        let home_start = self.homes[seat].start;
        let len = self.track.len();
        let backwards = distance < 0;
        let mut remaining = distance.unsigned_abs() as usize;
        let mut cursor = origin;
        let mut bullied = Vec::new();
        let mut landing = None;

        while remaining > 0 {
            if !backwards && cursor == home_start && !marble.is_protected() {
                let slot = remaining - 1;
                if slot < SAFE_ZONE_SLOTS && self.homes[seat].safe_zone[slot].is_none() {
                    landing = Some(Landing::SafeZone(slot));
                    break;
                }
            }

            cursor = if backwards { (cursor + len - 1) % len } else { (cursor + 1) % len };
            remaining -= 1;

            // 途经格
            if remaining > 0 && bully {
                if let Some(occupant) = self.track[cursor] {
                    if occupant != id && !self.marbles[occupant].is_protected() {
                        bullied.push(cursor);
                    }
                }
            }
        }

        let landing = landing.unwrap_or(Landing::Track(cursor));
        if let Landing::Track(dest) = landing {
            if let Some(occupant) = self.track[dest] {
                if occupant != id && self.marbles[occupant].is_protected() {
                    return Err(GameError::illegal("cannot land on a protected marble"));
                }
            }
        }

        // --- 提交 ---
        for pos in bullied {
            self.evict(pos);
        }
        self.track[origin] = None;
        match landing {
            Landing::Track(dest) => {
                if self.track[dest].is_some() {
                    self.evict(dest);
                }
                self.track[dest] = Some(id);
                debug!(marble = id, from = origin, to = dest, "弹珠移动");
            }
            Landing::SafeZone(slot) => {
                self.homes[seat].safe_zone[slot] = Some(id);
                debug!(marble = id, from = origin, slot, "弹珠进入安全区");
            }
        }
        Ok(())
    }

    /// 把赛道某格上的弹珠送回它自己的预备区
    fn evict(&mut self, pos: usize) {
        if let Some(id) = self.track[pos].take() {
            self.homes[id / MARBLES_PER_COLOR].reserve.insert(id);
            debug!(marble = id, pos, "弹珠被送回预备区");
        }
    }
}

// --- 单元测试 ---
