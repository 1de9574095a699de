//! 通过 `MatchService` 走完整的对局流程

use marble_race_core::{
    Card, GameError, MatchId, MatchService, MatchSnapshot, MatchStatus, MoveRequest, Rank, MARBLES_PER_COLOR,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const PLAYERS: [&str; 4] = ["P1", "P2", "P3", "P4"];

fn full_match(service: &MatchService, seed: u64) -> MatchId {
    let id = service.create_match_with_rng("Alpha", 4, StdRng::seed_from_u64(seed)).unwrap();
    for p in PLAYERS {
        service.add_player(&id, p).unwrap();
    }
    id
}

/// 找一个 P1 起手就有 A 的种子
fn match_with_opening_ace(service: &MatchService) -> (MatchId, Card) {
    for seed in 0..500 {
        let id = full_match(service, seed);
        let game = service.find_match(&id).unwrap();
        let ace = game.hand_of("P1").unwrap().cards().iter().copied().find(|c| c.rank == Rank::Ace);
        if let Some(ace) = ace {
            return (id, ace);
        }
        service.delete_match(&id);
    }
    panic!("no seed dealt an ace to P1");
}

#[test]
fn alpha_end_to_end() {
    let service = MatchService::in_memory();
    let id = service.create_match("Alpha", 4).unwrap();

    for (i, p) in PLAYERS.iter().enumerate() {
        match service.snapshot_for(&id, p).unwrap() {
            MatchSnapshot::Waiting(view) => {
                assert_eq!(view.name, "Alpha");
                assert_eq!(view.players.len(), i);
            }
            other => panic!("expected waiting view, got {:?}", other),
        }
        service.add_player(&id, *p).unwrap();
    }

    let game = service.find_match(&id).unwrap();
    assert_eq!(game.status, MatchStatus::InProgress);
    for p in PLAYERS {
        assert_eq!(game.hand_of(p).unwrap().size(), 6);
    }
    let board = game.board.as_ref().unwrap();
    assert!(board.track().iter().all(|s| s.is_none()));
    assert!(board.homes().iter().all(|h| h.reserve.len() == MARBLES_PER_COLOR));
}

#[test]
fn opening_ace_activates_marble() {
    let service = MatchService::in_memory();
    let (id, ace) = match_with_opening_ace(&service);
    let game = service.find_match(&id).unwrap();
    let color = game.player_color("P1").unwrap();
    let marble = game.board.as_ref().unwrap().home(color).unwrap().reserve.iter().copied().next().unwrap();

    let game = service
        .apply_move(&id, &MoveRequest::play("P1", ace, vec![(marble, 1)]))
        .unwrap();

    let board = game.board.as_ref().unwrap();
    let start = board.start_position(color).unwrap();
    assert_eq!(board.track()[start], Some(marble));
    assert!(board.marble(marble).unwrap().is_protected());
    assert_eq!(board.home(color).unwrap().reserve.len(), 3);
    assert_eq!(game.hand_of("P1").unwrap().size(), 5);
    assert_eq!(game.current_player().map(String::as_str), Some("P2"));
    assert_eq!(service.turn_counts(&id).unwrap()["P1"], 1);

    // P2 的视图里轮到 P2，且只有 P2 自己的手牌
    match service.snapshot_for(&id, "P2").unwrap() {
        MatchSnapshot::Player(view) => {
            assert_eq!(view.current_color, game.player_color("P2"));
            assert_eq!(view.last_card, Some(ace));
            assert_eq!(view.hand.as_ref(), game.hand_of("P2"));
            let json = serde_json::to_string(&view).unwrap();
            assert!(!json.contains("\"hands\""));
        }
        other => panic!("expected player view, got {:?}", other),
    }
}

#[test]
fn wrong_player_and_bad_format_are_rejected() {
    let service = MatchService::in_memory();
    let id = full_match(&service, 11);

    let err = service.apply_move(&id, &MoveRequest::forfeit("P3")).unwrap_err();
    assert_eq!(err, GameError::NotYourTurn { player: "P3".to_string() });

    let seven = Card::new(Rank::Seven, marble_race_core::Suit::Heart);
    let err = service
        .apply_move(&id, &MoveRequest::play("P1", seven, vec![(0, 3), (1, 2)]))
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidMoveFormat(_)));
    assert_eq!(err.to_string(), "invalid move format: seven move distances must sum to 7");
}

#[test]
fn leaving_waiting_match() {
    let service = MatchService::in_memory();
    let id = service.create_match("Beta", 4).unwrap();
    service.add_player(&id, "P1").unwrap();
    service.add_player(&id, "P2").unwrap();

    let game = service.remove_player(&id, "P1").unwrap();
    assert_eq!(game.status, MatchStatus::Waiting);
    assert_eq!(game.players, vec!["P2".to_string()]);

    let game = service.remove_player(&id, "P2").unwrap();
    assert_eq!(game.status, MatchStatus::Terminated);
    match service.snapshot_for(&id, "P2").unwrap() {
        MatchSnapshot::Finished(view) => assert_eq!(view.status, MatchStatus::Terminated),
        other => panic!("expected finished view, got {:?}", other),
    }

    service.delete_match(&id);
    assert!(service.find_match(&id).is_none());
}

#[test]
fn leaving_running_match_terminates_it() {
    let service = MatchService::in_memory();
    let id = full_match(&service, 5);

    let game = service.remove_player(&id, "P3").unwrap();
    assert_eq!(game.status, MatchStatus::Terminated);
    assert_eq!(game.winner.as_deref(), Some("P3"));

    let err = service.apply_move(&id, &MoveRequest::forfeit("P1")).unwrap_err();
    assert_eq!(err, GameError::MatchNotInProgress);
    assert_eq!(
        service.add_player(&id, "P5").unwrap_err(),
        GameError::PlayerLimitReached
    );
}

#[test]
fn forfeits_cycle_hand_sizes() {
    let service = MatchService::in_memory();
    let id = full_match(&service, 2);

    let mut sizes = vec![service.find_match(&id).unwrap().hand_of("P1").unwrap().size()];
    for _ in 0..6 {
        for p in PLAYERS {
            service.apply_move(&id, &MoveRequest::forfeit(p)).unwrap();
        }
        sizes.push(service.find_match(&id).unwrap().hand_of("P1").unwrap().size());
    }
    assert_eq!(sizes, vec![6, 5, 4, 3, 2, 6, 5]);
}
