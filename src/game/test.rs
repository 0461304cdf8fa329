#![cfg(test)]

use super::distribution::remaining_roles;
use super::{format_player_list, parse_lines, parse_players, shuffle, Game, Step};
use crate::error::GameError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn game_with_roles(players: &[&str], roles: &[&str]) -> Game {
    let mut game = Game::new(1, strings(players));
    game.set_roles(strings(roles)).unwrap();
    game
}

/// Opens box `index` for the current player and acknowledges it.
fn pick(game: &mut Game, index: usize) -> String {
    let selection = game.select_box(Some(game.next_player()), index).unwrap();
    game.assign(&selection).unwrap();
    selection.role
}

#[test]
fn can_create_game() {
    let game = Game::new(42, strings(&["Ann", "Bob"]));
    assert_eq!(game.owner, 42);
    assert_eq!(game.num_players(), 2);
    assert!(game.roles.is_empty());
    assert!(game.assigned_roles.is_empty());
    assert!(!game.is_complete());
}

#[test]
fn three_players_three_roles() {
    let mut game = game_with_roles(&["Ann", "Bob", "Cam"], &["Villager", "Wolf", "Seer"]);

    let Ok(Step::PickBox { player, round, boxes }) = game.next_step() else {
        panic!("Expected a box pick");
    };
    assert_eq!((player.as_str(), round, boxes), ("Ann", 0, 3));

    let first = pick(&mut game, 2);
    assert_eq!(first, "Seer");

    let Ok(Step::PickBox { player, round, boxes }) = game.next_step() else {
        panic!("Expected a box pick");
    };
    assert_eq!((player.as_str(), round, boxes), ("Bob", 1, 2));

    pick(&mut game, 0);
    pick(&mut game, 0);

    assert_eq!(game.next_step().unwrap(), Step::Complete);
    assert!(game.is_complete());

    let pairs: Vec<_> = game.pairings().collect();
    assert_eq!(pairs, vec![("Ann", "Seer"), ("Bob", "Villager"), ("Cam", "Wolf")]);
    assert_eq!(
        game.format_pairings(),
        "01 - Ann: Seer\n02 - Bob: Villager\n03 - Cam: Wolf"
    );
}

#[test]
fn role_count_must_match_player_count() {
    let mut game = Game::new(1, strings(&["A", "B"]));
    let result = game.set_roles(strings(&["X"]));
    assert!(matches!(
        result,
        Err(GameError::RoleCountMismatch { expected: 2, received: 1 })
    ));
    assert!(game.roles.is_empty());
    assert!(game.assigned_roles.is_empty());

    assert!(matches!(game.set_roles(vec![]), Err(GameError::NoRoles)));
}

#[test]
fn duplicate_roles_are_removed_one_at_a_time() {
    let roles = strings(&["Wolf", "Wolf", "Villager"]);
    let remaining = remaining_roles(&roles, &strings(&["Wolf"]));
    assert_eq!(remaining, strings(&["Wolf", "Villager"]));

    let mut game = game_with_roles(&["A", "B", "C"], &["Wolf", "Wolf", "Villager"]);
    assert_eq!(pick(&mut game, 0), "Wolf");
    assert_eq!(game.remaining_roles(), strings(&["Wolf", "Villager"]));
    assert_eq!(pick(&mut game, 0), "Wolf");
    assert_eq!(game.remaining_roles(), strings(&["Villager"]));
}

#[test]
fn resume_from_persisted_log() {
    let mut game = game_with_roles(&["A", "B", "C", "D"], &["Wolf", "Seer", "Wolf", "Doctor"]);
    game.assigned_roles = strings(&["Wolf", "Doctor"]);

    let restored: Game = serde_json::from_str(&serde_json::to_string(&game).unwrap()).unwrap();
    assert_eq!(restored.remaining_roles(), strings(&["Seer", "Wolf"]));
    assert_eq!(
        restored.next_step().unwrap(),
        Step::PickBox { player: "C".into(), round: 2, boxes: 2 }
    );
}

#[test]
fn stale_round_is_refused() {
    let mut game = game_with_roles(&["A", "B", "C"], &["X", "Y", "Z"]);
    pick(&mut game, 0);

    // A button from the first layout, replayed after the first pick
    assert!(matches!(game.select_box(Some(0), 1), Err(GameError::StaleSelection)));
    assert!(matches!(game.select_box(Some(1), 2), Err(GameError::StaleSelection)));
    assert!(game.select_box(Some(1), 1).is_ok());
    assert!(game.select_box(None, 1).is_ok());
    assert!(matches!(game.select_box(None, 5), Err(GameError::StaleSelection)));
}

#[test]
fn selection_cannot_be_recorded_twice() {
    let mut game = game_with_roles(&["A", "B"], &["X", "Y"]);
    let selection = game.select_box(Some(0), 0).unwrap();
    game.assign(&selection).unwrap();
    assert!(matches!(game.assign(&selection), Err(GameError::StaleSelection)));
    assert_eq!(game.assigned_roles, strings(&["X"]));
}

#[test]
fn open_box_is_the_only_choice() {
    let mut game = game_with_roles(&["A", "B"], &["X", "Y"]);
    let opened = game.select_box(Some(0), 0).unwrap();
    game.hold(&opened).unwrap();

    // Other boxes, and the next step, all lead back to the open box
    assert_eq!(game.select_box(Some(0), 1).unwrap(), opened);
    assert_eq!(game.select_box(None, 1).unwrap(), opened);
    assert_eq!(game.next_step().unwrap(), Step::Reveal(opened.clone()));

    let other = super::Selection {
        role: "Y".into(),
        ..opened.clone()
    };
    assert!(matches!(game.hold(&other), Err(GameError::StaleSelection)));
    assert!(matches!(game.assign(&other), Err(GameError::StaleSelection)));

    game.assign(&opened).unwrap();
    assert_eq!(game.assigned_roles, strings(&["X"]));
    assert_eq!(game.pending, None);
    assert_eq!(
        game.next_step().unwrap(),
        Step::PickBox { player: "B".into(), round: 1, boxes: 1 }
    );
}

#[test]
fn open_box_survives_persistence() {
    let mut game = game_with_roles(&["A", "B"], &["X", "Y"]);
    let opened = game.select_box(Some(0), 1).unwrap();
    game.hold(&opened).unwrap();

    let restored: Game = serde_json::from_str(&serde_json::to_string(&game).unwrap()).unwrap();
    assert_eq!(restored.pending, Some(opened));

    // Records written before boxes were remembered still load
    let mut json = serde_json::to_value(&game).unwrap();
    json.as_object_mut().unwrap().remove("pending");
    let older: Game = serde_json::from_value(json).unwrap();
    assert_eq!(older.pending, None);
}

#[test]
fn nothing_to_pick_once_complete() {
    let mut game = game_with_roles(&["A"], &["X"]);
    pick(&mut game, 0);
    assert!(matches!(game.select_box(None, 0), Err(GameError::DistributionComplete)));
}

#[test]
fn next_step_needs_roles() {
    let game = Game::new(1, strings(&["A"]));
    assert!(matches!(game.next_step(), Err(GameError::NoRoles)));
}

#[test]
fn players_fixed_once_roles_set() {
    let mut game = game_with_roles(&["A", "B"], &["X", "Y"]);
    assert!(game.set_players(strings(&["C", "D"])).is_err());
    assert_eq!(game.players, strings(&["A", "B"]));
}

#[test]
fn every_player_and_role_used_exactly_once() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for num_players in 1..=12 {
        let players: Vec<String> = (0..num_players).map(|i| format!("Player{}", i)).collect();
        let mut roles: Vec<String> = (0..num_players).map(|i| format!("Role{}", i % 3)).collect();
        shuffle(&mut roles, &mut rng);

        let mut game = Game::new(1, players.clone());
        game.set_roles(roles.clone()).unwrap();
        while let Step::PickBox { boxes, .. } = game.next_step().unwrap() {
            let index = rng.gen_range(0..boxes);
            pick(&mut game, index);
        }

        let (mut got_players, mut got_roles): (Vec<String>, Vec<String>) = game
            .pairings()
            .map(|(p, r)| (p.to_string(), r.to_string()))
            .unzip();
        got_players.sort();
        got_roles.sort();
        let mut want_players = players;
        let mut want_roles = roles;
        want_players.sort();
        want_roles.sort();
        assert_eq!(got_players, want_players);
        assert_eq!(got_roles, want_roles);
    }
}

#[test]
fn parse_player_lines() {
    assert_eq!(parse_lines("  Ann \n\nBob\r\n  Cam"), strings(&["Ann", "Bob", "Cam"]));
    assert!(matches!(parse_players(" \n \n"), Err(GameError::NoPlayers)));
    assert_eq!(parse_players("Ann").unwrap(), strings(&["Ann"]));
}

#[test]
fn player_list_is_numbered() {
    let players = strings(&["Ann", "Bob"]);
    assert_eq!(format_player_list(&players), "01 - Ann\n02 - Bob");
}
