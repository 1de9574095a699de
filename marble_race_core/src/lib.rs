//! # 弹珠赛跑规则引擎
//!
//! 这个 `core` crate 包含了弹珠赛跑卡牌游戏的全部规则：
//! 牌鞋与手牌、环形赛道与安全区、按牌面分派的走法、轮次与手牌数循环、
//! 胜负判定，以及客户端-服务器通信消息的定义。
//! 它与网络服务器等上层实现解耦，引擎本身是同步的、可以被任何上层应用复用。

mod board;
mod card;
mod error;
mod logic;
mod message;
mod service;
mod state;
mod store;
mod validate;

pub use board::*;

pub use card::*;

pub use error::*;

pub use logic::{MoveStrategy, max_hand_size};

pub use message::*;

pub use service::MatchService;

pub use state::*;

pub use store::{InMemoryMatchStore, MatchStore};

pub use validate::{acting_card, validate_move_structure};
