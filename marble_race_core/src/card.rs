use crate::error::{GameError, GameResult};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// --- 核心数据结构定义 ---

/// 一副牌鞋由几副标准 52 张牌组成
pub const DECK_COUNT: usize = 2;
/// 牌鞋中的王牌 (万能牌) 数量
pub const JOKER_COUNT: usize = 2;
/// 洗牌后完整牌鞋的张数：2 × 52 + 2 = 106
pub const SHOE_SIZE: usize = DECK_COUNT * 52 + JOKER_COUNT;

/// 花色 (Suit)，王牌单独使用 `Joker` 花色
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Heart,   // 红心 ♥️
    Diamond, // 方块 ♦️
    Club,    // 梅花 ♣️
    Spade,   // 黑桃 ♠️
    Joker,
}

/// 点数 (Rank)
/// 每个点数决定一张牌允许的走法，见 [`Rank::legal_distances`]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
    Joker,
}

/// 单张扑克牌 (Card)
/// 点数和花色都相同的两张牌可以互换
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

const SUITS: [Suit; 4] = [Suit::Heart, Suit::Diamond, Suit::Club, Suit::Spade];
const RANKS: [Rank; 13] = [
    Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
    Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
];

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    pub fn joker() -> Card {
        Card { rank: Rank::Joker, suit: Suit::Joker }
    }

    pub fn is_wild(&self) -> bool {
        self.rank.is_wild()
    }
}

impl Rank {
    pub fn is_wild(self) -> bool {
        self == Rank::Joker
    }

    /// 单颗弹珠走法下该点数允许的步数 (带符号)
    ///
    /// 7 (拆分) 和 J (交换) 不走这个规则，王牌本身没有合法步数，
    /// 所以这三者返回空切片。
    pub fn legal_distances(self) -> &'static [i32] {
        match self {
            Rank::Two => &[2],
            Rank::Three => &[3],
            Rank::Four => &[4, -4],
            Rank::Five => &[5],
            Rank::Six => &[6],
            Rank::Eight => &[8],
            Rank::Nine => &[9],
            Rank::Ten => &[10],
            Rank::Queen => &[12],
            Rank::King => &[13],
            Rank::Ace => &[1, 11],
            Rank::Seven | Rank::Jack | Rank::Joker => &[],
        }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Heart => "♥️",
            Suit::Diamond => "♦️",
            Suit::Club => "♣️",
            Suit::Spade => "♠️",
            Suit::Joker => "🃏",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
            Rank::Joker => "Joker",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_wild() {
            return write!(f, "{}", self.suit);
        }
        write!(f, "{}{}", self.suit, self.rank)
    }
}

// --- 牌鞋 (Deck) ---

/// 创建一副完整的牌鞋：两副 52 张标准牌加两张王牌，尚未洗牌
fn create_shoe() -> Vec<Card> {
    let mut shoe = Vec::with_capacity(SHOE_SIZE);
    for _ in 0..DECK_COUNT {
        for &suit in &SUITS {
            for &rank in &RANKS {
                shoe.push(Card { rank, suit });
            }
        }
    }
    for _ in 0..JOKER_COUNT {
        shoe.push(Card::joker());
    }
    shoe
}

fn os_rng() -> StdRng {
    StdRng::from_os_rng()
}

/// 对局共用的牌鞋
///
/// 随机数发生器由调用方注入，固定种子即可得到可复现的洗牌顺序。
/// 序列化时跳过发生器，反序列化后从操作系统重新取种子。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
    #[serde(skip, default = "os_rng")]
    rng: StdRng,
}

impl Deck {
    /// 用给定的随机数发生器创建并洗好一副牌鞋
    pub fn new(rng: StdRng) -> Deck {
        let mut deck = Deck { cards: Vec::with_capacity(SHOE_SIZE), rng };
        deck.shuffle();
        deck
    }

    pub fn seeded(seed: u64) -> Deck {
        Deck::new(StdRng::seed_from_u64(seed))
    }

    /// 丢弃剩余的牌，重建完整牌鞋并随机打乱
    pub fn shuffle(&mut self) {
        self.cards.clear();
        self.cards.extend(create_shoe());
        self.cards.shuffle(&mut self.rng);
    }

    /// 逐张发出 `hand_size` 张牌，中途牌鞋空了就重新洗牌，保证发满
    pub fn deal_hand(&mut self, hand_size: usize) -> Hand {
        let mut hand = Hand::with_capacity(hand_size);
        while hand.size() < hand_size {
            match self.cards.pop() {
                Some(card) => hand.add_card(card),
                None => {
                    debug!("牌鞋已空，重新洗牌");
                    self.shuffle();
                }
            }
        }
        hand
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

// --- 手牌 (Hand) ---

/// 一个座位持有的手牌，顺序无意义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand::default()
    }

    pub fn with_capacity(size: usize) -> Hand {
        Hand { cards: Vec::with_capacity(size) }
    }

    pub fn add_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// 只移除第一张匹配的牌，而不是所有相同的牌
    pub fn remove_card(&mut self, card: &Card) -> GameResult<()> {
        let idx = self
            .cards
            .iter()
            .position(|c| c == card)
            .ok_or(GameError::CardNotFound(*card))?;
        self.cards.remove(idx);
        Ok(())
    }

    /// 无条件清空手牌 (弃权)
    pub fn forfeit_cards(&mut self) {
        self.cards.clear();
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.cards.contains(card)
    }

    pub fn size(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl Extend<Card> for Hand {
    fn extend<T: IntoIterator<Item = Card>>(&mut self, iter: T) {
        self.cards.extend(iter);
    }
}

impl FromIterator<Card> for Hand {
    fn from_iter<T: IntoIterator<Item = Card>>(iter: T) -> Self {
        Hand { cards: iter.into_iter().collect() }
    }
}

// --- 单元测试 ---
