/// Integration test: players walking into areas and playing full games
/// through the `Town` aggregate.
use games::{ConnectFour, GameError, GameId, GameStatus, MoveRequest};
use net::channels::ConnectionId;
use session::{PlayerId, TownId};
use space::{AreaId, PlayerLocation};
use town_server::areas::{Area, GameArea};
use town_server::broadcast::{Delivery, RecordingBroadcaster};
use town_server::map::parse_map;
use town_server::protocol::{ClientMessage, InteractableCommand, ServerMessage};
use town_server::{Town, TownError};

const MAP: &str = r#"{"areas":[
    {"id":"Conv","type":"ConversationArea","x":0,"y":0,"width":200,"height":200},
    {"id":"C4","type":"GameArea","x":400,"y":0,"width":200,"height":200,
     "properties":[{"name":"type","value":"ConnectFour"}]},
    {"id":"TTT","type":"GameArea","x":0,"y":400,"width":200,"height":200,
     "properties":[{"name":"type","value":"TicTacToe"}]}
]}"#;

const IN_C4: (f64, f64) = (500.0, 100.0);
const OUTSIDE: (f64, f64) = (1000.0, 1000.0);

fn new_town() -> (Town, RecordingBroadcaster) {
    let out = RecordingBroadcaster::new();
    let mut town = Town::new(TownId::from("SCENARIO"), "Scenario", true, 10, Box::new(out.clone()));
    town.initialize_areas(&parse_map(MAP).unwrap().areas).unwrap();
    (town, out)
}

fn walk(town: &mut Town, player: &PlayerId, (x, y): (f64, f64)) {
    town.move_player(player, PlayerLocation::new(x, y)).unwrap();
}

fn c4(town: &Town) -> &GameArea<ConnectFour> {
    match town.area(&AreaId::from("C4")) {
        Some(Area::ConnectFour(a)) => a,
        other => panic!("expected connect four area, got {other:?}"),
    }
}

fn command(town: &mut Town, player: &PlayerId, cmd: InteractableCommand) -> Result<Option<GameId>, TownError> {
    town.handle_interactable_command(player, &AreaId::from("C4"), &cmd)
}

fn drop_piece(town: &mut Town, player: &PlayerId, game_id: &GameId, row: usize, col: usize) -> Result<(), TownError> {
    command(
        town,
        player,
        InteractableCommand::GameMove {
            game_id: game_id.clone(),
            game_move: MoveRequest {
                row,
                col,
                game_piece: None,
            },
        },
    )
    .map(|_| ())
}

/// Two players walk into the Connect Four area and start a game.
fn started_game(town: &mut Town) -> (PlayerId, PlayerId, GameId) {
    let alice = town.add_player("Alice", None, ConnectionId(1)).unwrap();
    walk(town, &alice, IN_C4);
    assert_eq!(c4(town).base().occupants(), &[alice.clone()]);

    let game_id = command(town, &alice, InteractableCommand::JoinGame).unwrap().unwrap();
    assert_eq!(c4(town).game().unwrap().status(), GameStatus::WaitingForPlayers);

    let bob = town.add_player("Bob", None, ConnectionId(2)).unwrap();
    walk(town, &bob, IN_C4);
    let same = command(town, &bob, InteractableCommand::JoinGame).unwrap().unwrap();
    assert_eq!(same, game_id);
    assert_eq!(c4(town).game().unwrap().status(), GameStatus::WaitingToStart);

    for p in [&alice, &bob] {
        command(
            town,
            p,
            InteractableCommand::StartGame {
                game_id: game_id.clone(),
            },
        )
        .unwrap();
    }
    assert_eq!(c4(town).game().unwrap().status(), GameStatus::InProgress);
    (alice, bob, game_id)
}

#[test]
fn full_game_records_one_history_entry() {
    let (mut town, _out) = new_town();
    let (alice, bob, game_id) = started_game(&mut town);

    // Alice stacks column 0, Bob column 1; Alice completes four first.
    let moves = [
        (&alice, 5, 0),
        (&bob, 5, 1),
        (&alice, 4, 0),
        (&bob, 4, 1),
        (&alice, 3, 0),
        (&bob, 3, 1),
        (&alice, 2, 0),
    ];
    for (player, row, col) in moves {
        drop_piece(&mut town, player, &game_id, row, col).unwrap();
    }

    let area = c4(&town);
    let game = area.game().unwrap();
    assert_eq!(game.status(), GameStatus::Over);
    assert_eq!(game.state().winner, Some(alice.clone()));
    assert_eq!(area.history().len(), 1);
    assert_eq!(area.history()[0].scores["Alice"], 1);
    assert_eq!(area.history()[0].scores["Bob"], 0);

    assert_eq!(
        drop_piece(&mut town, &bob, &game_id, 5, 2),
        Err(TownError::Game(GameError::GameNotInProgress))
    );
    assert_eq!(c4(&town).history().len(), 1);
}

#[test]
fn out_of_turn_and_floating_moves_are_rejected() {
    let (mut town, out) = new_town();
    let (alice, bob, game_id) = started_game(&mut town);
    out.take();

    assert_eq!(
        drop_piece(&mut town, &bob, &game_id, 5, 0),
        Err(TownError::Game(GameError::MoveNotYourTurn))
    );
    assert_eq!(
        drop_piece(&mut town, &alice, &game_id, 3, 0),
        Err(TownError::Game(GameError::BoardPositionNotValid))
    );
    // Failures change nothing and broadcast nothing.
    assert!(c4(&town).game().unwrap().state().moves.is_empty());
    assert!(out.take().is_empty());
}

#[test]
fn disconnect_mid_game_forfeits() {
    let (mut town, out) = new_town();
    let (alice, bob, game_id) = started_game(&mut town);
    drop_piece(&mut town, &alice, &game_id, 5, 3).unwrap();
    out.take();

    town.remove_player(&alice).unwrap();

    let area = c4(&town);
    let game = area.game().unwrap();
    assert_eq!(game.status(), GameStatus::Over);
    assert_eq!(game.state().winner, Some(bob.clone()));
    assert_eq!(area.history().len(), 1);
    assert_eq!(area.history()[0].scores["Bob"], 1);
    assert_eq!(area.history()[0].scores["Alice"], 0);
    assert_eq!(area.base().occupants(), &[bob]);

    let published = out.take_published();
    assert!(matches!(published.last(), Some(ServerMessage::PlayerDisconnected { player }) if player.id == alice));
}

#[test]
fn walking_out_mid_game_forfeits() {
    let (mut town, _out) = new_town();
    let (_alice, bob, _game_id) = started_game(&mut town);
    walk(&mut town, &bob, OUTSIDE);

    let area = c4(&town);
    assert_eq!(area.game().unwrap().status(), GameStatus::Over);
    assert_eq!(area.history()[0].scores["Alice"], 1);
    assert_eq!(area.history()[0].scores["Bob"], 0);
}

#[test]
fn stale_game_id_after_rematch_is_rejected() {
    let (mut town, _out) = new_town();
    let (alice, bob, first) = started_game(&mut town);
    command(&mut town, &bob, InteractableCommand::LeaveGame { game_id: first.clone() }).unwrap();

    let second = command(&mut town, &alice, InteractableCommand::JoinGame).unwrap().unwrap();
    assert_ne!(first, second);
    command(&mut town, &bob, InteractableCommand::JoinGame).unwrap();
    for p in [&alice, &bob] {
        command(
            &mut town,
            p,
            InteractableCommand::StartGame {
                game_id: second.clone(),
            },
        )
        .unwrap();
    }

    for p in [&alice, &bob] {
        assert_eq!(
            drop_piece(&mut town, p, &first, 5, 0),
            Err(TownError::Game(GameError::GameIdMismatch))
        );
    }
    let game = c4(&town).game().unwrap();
    assert_eq!(game.id(), &second);
    assert!(game.state().moves.is_empty());
    assert_eq!(c4(&town).history().len(), 1);
}

#[test]
fn membership_matches_geometry_everywhere() {
    let (mut town, _out) = new_town();
    let p = town.add_player("Walker", None, ConnectionId(1)).unwrap();

    let mut x = -50.0;
    while x <= 700.0 {
        let mut y = -50.0;
        while y <= 700.0 {
            walk(&mut town, &p, (x, y));
            let loc = town.players().get(&p).unwrap().location.clone();
            for area in town.areas() {
                assert_eq!(
                    area.base().is_occupant(&p),
                    area.contains(&loc),
                    "area {} at ({x}, {y})",
                    area.id()
                );
            }
            let inside: Vec<_> = town.areas().iter().filter(|a| a.base().is_occupant(&p)).collect();
            assert!(inside.len() <= 1);
            assert_eq!(loc.interactable_id.as_ref(), inside.first().map(|a| a.id()));
            y += 37.0;
        }
        x += 41.0;
    }
}

#[test]
fn command_response_carries_game_id_and_errors() {
    let (mut town, out) = new_town();
    let alice = town.add_player("Alice", None, ConnectionId(1)).unwrap();
    out.take();

    town.handle_client_message(
        &alice,
        ClientMessage::InteractableCommand {
            command_id: "join".into(),
            interactable_id: AreaId::from("TTT"),
            command: InteractableCommand::JoinGame,
        },
    )
    .unwrap();
    let _ = town.handle_client_message(
        &alice,
        ClientMessage::InteractableCommand {
            command_id: "again".into(),
            interactable_id: AreaId::from("TTT"),
            command: InteractableCommand::JoinGame,
        },
    );

    let responses: Vec<_> = out
        .take()
        .into_iter()
        .filter_map(|d| match d {
            Delivery::Player(to, ServerMessage::CommandResponse { command_id, game_id, error, .. }) => {
                assert_eq!(to, alice);
                Some((command_id, game_id.is_some(), error))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        responses,
        vec![
            ("join".to_string(), true, None),
            ("again".to_string(), false, Some("Player is already in this game".to_string())),
        ]
    );
}
