use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use dashmap::DashMap;
use futures_util::{stream::StreamExt, SinkExt};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use marble_race_core::{ClientMessage, Match, MatchId, MatchService, MatchStatus, PlayerId, ServerMessage};

#[derive(Parser)]
struct Args {
    /// 监听地址
    #[arg(short, long, default_value = "0.0.0.0:25917")]
    addr: SocketAddr,

    /// 默认日志级别 ("off", "error", "warn", "info", "debug", "trace")，设置了 RUST_LOG 时以它为准
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,
}

// 服务器全局状态
// 对局状态只通过 service 读写，rooms 只管网络连接
struct AppState {
    service: MatchService,
    rooms: DashMap<MatchId, Arc<Room>>,
}

// 单个对局的连接表
struct Room {
    // 将 PlayerId 映射到该玩家 WebSocket 写任务的通道
    connections: RwLock<HashMap<PlayerId, mpsc::Sender<ServerMessage>>>,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = SharedState::new(AppState {
        service: MatchService::in_memory(),
        rooms: DashMap::new(),
    });

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!("服务器正在监听 {}", args.addr);
    axum::serve(listener, app).await
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 其他任务通过这个通道把消息交给本连接的写任务
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开
                break;
            }
        }
    });

    // 加入对局后填充
    let mut player_context: Option<(MatchId, PlayerId)> = None;
    // 本连接创建的对局
    let mut created: Vec<MatchId> = Vec::new();

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(client_msg, state.clone(), &tx, &mut player_context, &mut created).await;
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                    let _ = tx.send(ServerMessage::Error { message: format!("无法解析的消息: {}", e) }).await;
                }
            }
        }
    }

    // 客户端断开等同于离开对局
    if let Some((match_id, player_id)) = player_context {
        handle_leave(&state, match_id, player_id).await;
    }
    // 创建后没人加入的对局随连接一起清理
    for match_id in created {
        if state.service.find_match(&match_id).is_some_and(|game| is_abandoned(&game)) {
            close_match(&state, &match_id);
        }
    }
    info!("客户端连接关闭");
}

/// 核心消息处理逻辑
async fn handle_client_message(
    msg: ClientMessage,
    state: SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<(MatchId, PlayerId)>,
    created: &mut Vec<MatchId>,
) {
    match msg {
        ClientMessage::CreateMatch { name, num_players } => {
            match state.service.create_match(name, num_players) {
                Ok(match_id) => {
                    state.rooms.insert(match_id, Arc::new(Room { connections: RwLock::new(HashMap::new()) }));
                    created.push(match_id);
                    let _ = tx.send(ServerMessage::MatchCreated { match_id }).await;
                }
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        }
        ClientMessage::JoinMatch { match_id, player_id } => {
            if context.is_some() {
                let _ = tx.send(ServerMessage::Error { message: "你已经在一个对局里了".to_string() }).await;
                return;
            }
            let room = state.rooms.get(&match_id).map(|r| r.clone());
            let Some(room) = room else {
                let _ = tx.send(ServerMessage::Error { message: "对局不存在".to_string() }).await;
                return;
            };

            let game = {  // connections write lock
                let mut connections = room.connections.write().await;
                if connections.contains_key(&player_id) {
                    let _ = tx.send(ServerMessage::Error { message: "该玩家已在线".to_string() }).await;
                    return;
                }
                match state.service.add_player(&match_id, player_id.clone()) {
                    Ok(game) => {
                        connections.insert(player_id.clone(), tx.clone());
                        game
                    }
                    Err(e) => {
                        let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
                        return;
                    }
                }
            };

            info!("玩家 {} 加入了对局 {}", player_id, match_id);
            *context = Some((match_id, player_id.clone()));
            let _ = tx.send(ServerMessage::MatchJoined { match_id, player_id }).await;
            broadcast_snapshots(&room, &game).await;
        }
        ClientMessage::PerformMove(mut mv) => {
            let Some((match_id, player_id)) = context.clone() else {
                let _ = tx.send(ServerMessage::Error { message: "请先加入对局".to_string() }).await;
                return;
            };
            // 出牌者以连接身份为准
            mv.player = Some(player_id.clone());

            match state.service.apply_move(&match_id, &mv) {
                Ok(game) => {
                    let room = state.rooms.get(&match_id).map(|r| r.clone());
                    let Some(room) = room else {
                        return;
                    };
                    broadcast_snapshots(&room, &game).await;
                    if game.status == MatchStatus::Complete {
                        if let Ok(counts) = state.service.turn_counts(&match_id) {
                            info!(%match_id, winner = ?game.winner, ?counts, "对局完成");
                        }
                        let info_msg = ServerMessage::Info {
                            message: format!("{} 赢得了比赛", game.winner.as_deref().unwrap_or("未知玩家")),
                        };
                        broadcast(&room, &info_msg).await;
                        close_match(&state, &match_id);
                    }
                }
                Err(e) => {
                    warn!("玩家 {} 的出牌被拒绝: {}", player_id, e);
                    let _ = tx.send(ServerMessage::MoveRejected { message: e.to_string() }).await;
                }
            }
        }
        ClientMessage::LeaveMatch => {
            let Some((match_id, player_id)) = context.take() else {
                let _ = tx.send(ServerMessage::Error { message: "请先加入对局".to_string() }).await;
                return;
            };
            handle_leave(&state, match_id, player_id).await;
        }
    }
}

/// 玩家离开或断开连接后的处理
async fn handle_leave(state: &SharedState, match_id: MatchId, player_id: PlayerId) {
    info!("玩家 {} 离开对局 {}", player_id, match_id);
    let room = state.rooms.get(&match_id).map(|r| r.clone());
    let Some(room) = room else {
        return;
    };
    room.connections.write().await.remove(&player_id);

    let game = match state.service.remove_player(&match_id, &player_id) {
        Ok(game) => game,
        Err(e) => {
            warn!("移除玩家 {} 失败: {}", player_id, e);
            return;
        }
    };
    broadcast_snapshots(&room, &game).await;

    if matches!(game.status, MatchStatus::Terminated | MatchStatus::Complete) {
        close_match(state, &match_id);
    }
}

/// 最终快照发出之后清理对局
fn close_match(state: &SharedState, match_id: &MatchId) {
    state.service.delete_match(match_id);
    state.rooms.remove(match_id);
    info!("对局 {} 已结束，已被移除", match_id);
}

/// 还在等待且一个玩家都没有的对局
fn is_abandoned(game: &Match) -> bool {
    game.status == MatchStatus::Waiting && game.players.is_empty()
}

/// 为每位在线玩家单独生成快照
async fn broadcast_snapshots(room: &Room, game: &Match) {
    for (player_id, sender) in room.connections.read().await.iter() {
        let msg = ServerMessage::Snapshot(game.snapshot_for(player_id));
        if sender.send(msg).await.is_err() {
            // 该玩家也断开了，后续由其自己的 handle_socket 任务处理
            warn!("向玩家 {} 发送快照失败（可能已断开）", player_id);
        }
    }
}

/// 向对局内所有在线玩家广播消息
async fn broadcast(room: &Room, message: &ServerMessage) {
    for (player_id, sender) in room.connections.read().await.iter() {
        if sender.send(message.clone()).await.is_err() {
            warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
        }
    }
}
