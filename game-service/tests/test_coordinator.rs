mod common;

use common::{last_state, matched_session, start_match, Harness};
use game_service::coordinator::{ClientMessage, ServerMessage};
use shared::{Mark, SessionStatus, Winner};

#[tokio::test]
async fn test_first_join_waits() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");

    harness.send(&alice, ClientMessage::QueueJoin).await;

    assert_eq!(alice.drain(), vec![ServerMessage::QueueWaiting]);
    assert_eq!(harness.local.waiting(), 1);
}

#[tokio::test]
async fn test_match_assigns_x_to_longest_waiting() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");

    harness.send(&alice, ClientMessage::QueueJoin).await;
    harness.send(&bob, ClientMessage::QueueJoin).await;

    let alice_messages = alice.drain();
    let bob_messages = bob.drain();

    assert_eq!(
        alice_messages.iter().map(ServerMessage::kind).collect::<Vec<_>>(),
        vec!["queue.waiting", "session.matched", "session.state"]
    );
    assert_eq!(
        bob_messages.iter().map(ServerMessage::kind).collect::<Vec<_>>(),
        vec!["session.matched", "session.state"]
    );

    let state = last_state(&bob_messages).unwrap();
    assert_eq!(&state.players.x.id, alice.id());
    assert_eq!(&state.players.o.id, bob.id());
    assert_eq!(state.current_turn, Mark::X);
    assert_eq!(state.status, SessionStatus::Active);
    assert_eq!(harness.local.waiting(), 0);
}

#[tokio::test]
async fn test_win_updates_leaderboard_and_history() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let session_id = start_match(&harness, &mut alice, &mut bob).await;

    harness.play(&alice, session_id, 0).await;
    harness.play(&bob, session_id, 3).await;
    harness.play(&alice, session_id, 1).await;
    harness.play(&bob, session_id, 4).await;
    harness.play(&alice, session_id, 2).await;

    let messages = bob.drain();
    let state = last_state(&messages).unwrap();
    assert_eq!(state.status, SessionStatus::Completed);
    assert_eq!(state.winner, Some(Winner::X));
    assert_eq!(state.moves.len(), 5);
    assert!(state.ended_at.is_some());
    assert!(messages.contains(&ServerMessage::SessionCompleted {
        session_id,
        winner: Winner::X,
    }));

    let alice_messages = alice.drain();
    assert!(alice_messages.contains(&ServerMessage::SessionCompleted {
        session_id,
        winner: Winner::X,
    }));

    let rows = harness.coordinator.leaderboard().top_n(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0].participant_id, alice.id());
    assert_eq!(rows[0].wins, 1);

    let games = harness
        .coordinator
        .history()
        .recent_for_participant(bob.id(), 10, 0)
        .await
        .unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].id, session_id);
}

#[tokio::test]
async fn test_draw_leaves_leaderboard_untouched() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let session_id = start_match(&harness, &mut alice, &mut bob).await;

    for (turn, cell) in [0, 1, 2, 4, 3, 5, 7, 6, 8].into_iter().enumerate() {
        let player = if turn % 2 == 0 { &alice } else { &bob };
        harness.play(player, session_id, cell).await;
    }

    let messages = alice.drain();
    let state = last_state(&messages).unwrap();
    assert_eq!(state.winner, Some(Winner::Draw));
    assert_eq!(state.filled_cells(), 9);
    assert!(messages.contains(&ServerMessage::SessionCompleted {
        session_id,
        winner: Winner::Draw,
    }));

    assert!(harness.coordinator.leaderboard().top_n(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejections_reach_only_the_sender() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let session_id = start_match(&harness, &mut alice, &mut bob).await;

    harness.play(&bob, session_id, 4).await;

    match bob.drain().as_slice() {
        [ServerMessage::MoveRejected { reason, .. }] => assert_eq!(reason, "wrong_turn"),
        other => panic!("unexpected messages: {:?}", other),
    }
    assert!(alice.drain().is_empty());

    harness.play(&alice, session_id, 4).await;
    alice.drain();
    bob.drain();

    harness.play(&bob, session_id, 4).await;
    match bob.drain().as_slice() {
        [ServerMessage::MoveRejected { reason, .. }] => assert_eq!(reason, "cell_occupied"),
        other => panic!("unexpected messages: {:?}", other),
    }

    harness.play(&bob, session_id, 9).await;
    match bob.drain().as_slice() {
        [ServerMessage::MoveRejected { reason, .. }] => assert_eq!(reason, "out_of_range"),
        other => panic!("unexpected messages: {:?}", other),
    }
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_outsider_move_is_rejected() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let mut mallory = harness.connect("mallory");
    let session_id = start_match(&harness, &mut alice, &mut bob).await;

    harness.play(&mallory, session_id, 0).await;

    match mallory.drain().as_slice() {
        [ServerMessage::MoveRejected { reason, .. }] => {
            assert_eq!(reason, "participant_not_in_session")
        }
        other => panic!("unexpected messages: {:?}", other),
    }
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_move_after_completion_is_invalid_state() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let session_id = start_match(&harness, &mut alice, &mut bob).await;

    for (player, cell) in [(&alice, 0), (&bob, 3), (&alice, 1), (&bob, 4), (&alice, 2)] {
        harness.play(player, session_id, cell).await;
    }
    bob.drain();

    harness.play(&bob, session_id, 8).await;
    match bob.drain().as_slice() {
        [ServerMessage::MoveRejected { reason, .. }] => assert_eq!(reason, "invalid_state"),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");

    harness.play(&alice, shared::SessionId::new(), 0).await;

    match alice.drain().as_slice() {
        [ServerMessage::MoveRejected { reason, .. }] => assert_eq!(reason, "session_not_found"),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_dropped_opponent_requeues_survivor() {
    let harness = Harness::local_only();
    let alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let mut carol = harness.connect("carol");

    harness.send(&alice, ClientMessage::QueueJoin).await;
    // Gone from the hub without the queue cleanup having run yet.
    harness.hub.unregister(alice.ctx.connection_id);

    harness.send(&bob, ClientMessage::QueueJoin).await;
    assert!(matched_session(&bob.drain()).is_none());
    assert_eq!(harness.local.waiting(), 1);

    harness.send(&carol, ClientMessage::QueueJoin).await;
    let carol_messages = carol.drain();
    let bob_messages = bob.drain();
    let session_id = matched_session(&carol_messages).expect("carol matched with bob");
    assert_eq!(matched_session(&bob_messages), Some(session_id));

    let state = last_state(&carol_messages).unwrap();
    assert_eq!(&state.players.x.id, bob.id());
    assert_eq!(&state.players.o.id, carol.id());
}

#[tokio::test]
async fn test_rejoin_from_same_connection_does_not_self_match() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");

    harness.send(&alice, ClientMessage::QueueJoin).await;
    harness.send(&alice, ClientMessage::QueueJoin).await;

    assert_eq!(alice.kinds(), vec!["queue.waiting", "queue.waiting"]);
    assert_eq!(harness.local.waiting(), 1);
}

#[tokio::test]
async fn test_two_connections_of_one_participant_play_someone_else() {
    let harness = Harness::local_only();
    let mut first_tab = harness.connect("alice");
    let mut second_tab = harness.connect("alice");
    let mut bob = harness.connect("bob");

    harness.send(&first_tab, ClientMessage::QueueJoin).await;
    harness.send(&second_tab, ClientMessage::QueueJoin).await;
    assert_eq!(first_tab.kinds(), vec!["queue.waiting"]);
    assert_eq!(second_tab.kinds(), vec!["queue.waiting"]);
    assert_eq!(harness.local.waiting(), 2);

    harness.send(&bob, ClientMessage::QueueJoin).await;
    let session_id = matched_session(&bob.drain()).unwrap();
    assert_eq!(matched_session(&first_tab.drain()), Some(session_id));
    assert!(second_tab.drain().is_empty());
    assert_eq!(harness.local.waiting(), 1);

    for (player, cell) in [(&first_tab, 0), (&bob, 3), (&first_tab, 1), (&bob, 4), (&first_tab, 2)] {
        harness.play(player, session_id, cell).await;
    }

    let messages = bob.drain();
    let state = last_state(&messages).unwrap();
    assert_eq!(state.moves.len(), 5);
    assert_eq!(state.status, SessionStatus::Completed);
    assert_eq!(state.winner, Some(Winner::X));
    assert!(!messages
        .iter()
        .any(|message| matches!(message, ServerMessage::MoveRejected { .. })));
}

#[tokio::test]
async fn test_queue_leave_and_disconnect_clear_entry() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let bob = harness.connect("bob");

    harness.send(&alice, ClientMessage::QueueJoin).await;
    harness.send(&alice, ClientMessage::QueueLeave).await;
    assert_eq!(alice.kinds(), vec!["queue.waiting", "queue.left"]);
    assert_eq!(harness.local.waiting(), 0);

    harness.send(&bob, ClientMessage::QueueJoin).await;
    assert_eq!(harness.local.waiting(), 1);
    harness.disconnect(bob).await;
    assert_eq!(harness.local.waiting(), 0);
}

#[tokio::test]
async fn test_private_code_flow() {
    let harness = Harness::local_only();
    let mut host = harness.connect("alice");
    let mut joiner = harness.connect("bob");

    harness.send(&host, ClientMessage::PrivateCreate).await;
    let (code, session_id) = match host.drain().as_slice() {
        [ServerMessage::PrivateCreated { code, session_id }] => (code.clone(), *session_id),
        other => panic!("unexpected messages: {:?}", other),
    };
    assert_eq!(code.len(), 6);

    harness
        .send(&joiner, ClientMessage::PrivateJoinByCode { code: code.clone() })
        .await;

    let joiner_messages = joiner.drain();
    assert_eq!(matched_session(&joiner_messages), Some(session_id));
    assert_eq!(matched_session(&host.drain()), Some(session_id));

    let state = last_state(&joiner_messages).unwrap();
    assert_eq!(&state.players.x.id, host.id());
    assert_eq!(&state.players.o.id, joiner.id());

    let mut late = harness.connect("carol");
    harness
        .send(&late, ClientMessage::PrivateJoinByCode { code })
        .await;
    match late.drain().as_slice() {
        [ServerMessage::Error { reason, .. }] => assert_eq!(reason, "invalid_code"),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_host_cannot_join_own_code() {
    let harness = Harness::local_only();
    let mut host = harness.connect("alice");

    harness.send(&host, ClientMessage::PrivateCreate).await;
    let code = match host.drain().as_slice() {
        [ServerMessage::PrivateCreated { code, .. }] => code.clone(),
        other => panic!("unexpected messages: {:?}", other),
    };

    harness
        .send(&host, ClientMessage::PrivateJoinByCode { code })
        .await;
    match host.drain().as_slice() {
        [ServerMessage::Error { reason, .. }] => assert_eq!(reason, "validation_error"),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_host_second_connection_cannot_join_own_code() {
    let harness = Harness::local_only();
    let mut host = harness.connect("alice");
    let mut other_tab = harness.connect("alice");

    harness.send(&host, ClientMessage::PrivateCreate).await;
    let code = match host.drain().as_slice() {
        [ServerMessage::PrivateCreated { code, .. }] => code.clone(),
        other => panic!("unexpected messages: {:?}", other),
    };

    harness
        .send(&other_tab, ClientMessage::PrivateJoinByCode { code })
        .await;
    match other_tab.drain().as_slice() {
        [ServerMessage::Error { reason, .. }] => assert_eq!(reason, "validation_error"),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_private_session_takes_both_players_out_of_the_queue() {
    let harness = Harness::local_only();
    let mut host = harness.connect("alice");
    let mut joiner = harness.connect("bob");
    let mut carol = harness.connect("carol");

    harness.send(&host, ClientMessage::PrivateCreate).await;
    harness.send(&host, ClientMessage::QueueJoin).await;
    let code = match host.drain().as_slice() {
        [ServerMessage::PrivateCreated { code, .. }, ServerMessage::QueueWaiting] => code.clone(),
        other => panic!("unexpected messages: {:?}", other),
    };
    assert_eq!(harness.local.waiting(), 1);

    harness
        .send(&joiner, ClientMessage::PrivateJoinByCode { code })
        .await;
    assert_eq!(joiner.kinds(), vec!["session.matched", "session.state"]);
    assert_eq!(harness.local.waiting(), 0);

    harness.send(&carol, ClientMessage::QueueJoin).await;
    assert_eq!(carol.kinds(), vec!["queue.waiting"]);
    assert_eq!(host.kinds(), vec!["session.matched", "session.state"]);
}

#[tokio::test]
async fn test_code_from_departed_host_is_rejected() {
    let harness = Harness::local_only();
    let mut host = harness.connect("alice");
    let mut joiner = harness.connect("bob");

    harness.send(&host, ClientMessage::PrivateCreate).await;
    let code = match host.drain().as_slice() {
        [ServerMessage::PrivateCreated { code, .. }] => code.clone(),
        other => panic!("unexpected messages: {:?}", other),
    };
    harness.disconnect(host).await;

    harness
        .send(&joiner, ClientMessage::PrivateJoinByCode { code })
        .await;
    match joiner.drain().as_slice() {
        [ServerMessage::Error { reason, .. }] => assert_eq!(reason, "invalid_code"),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_session_leave_stops_broadcasts() {
    let harness = Harness::local_only();
    let mut alice = harness.connect("alice");
    let mut bob = harness.connect("bob");
    let session_id = start_match(&harness, &mut alice, &mut bob).await;

    harness
        .send(&bob, ClientMessage::SessionLeave { session_id })
        .await;
    assert_eq!(bob.drain(), vec![ServerMessage::SessionLeft { session_id }]);

    harness.play(&alice, session_id, 0).await;
    assert!(bob.drain().is_empty());
    assert_eq!(alice.kinds(), vec!["session.state"]);
}
