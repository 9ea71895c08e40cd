// Invariants of the environment and the learning pieces, checked over
// generated seeds and action sequences.
use proptest::prelude::*;
use snakeql::agent::qtrainer::QTrainer;
use snakeql::game::{INITIAL_LENGTH, Action, Direction, Game, GameConfig, Point};
use snakeql::state::{self, STATE_SIZE};
use snakeql::{ReplayBuffer, Tensor, Transition};

const DANGER_RIGHT: usize = 1;
const DANGER_LEFT: usize = 2;

fn actions() -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(0usize..3, 1..400)
        .prop_map(|indices| indices.into_iter().filter_map(Action::from_index).collect())
}

fn small_board() -> impl Strategy<Value = GameConfig> {
    (4i32..16, 2i32..12).prop_map(|(columns, rows)| GameConfig::new(columns * 20, rows * 20))
}

proptest! {
    #[test]
    fn length_tracks_food_eaten(seed in any::<u64>(), config in small_board(), moves in actions()) {
        let mut game = Game::with_seed(config, seed);
        prop_assert_eq!(game.snake().len(), INITIAL_LENGTH);

        for action in moves {
            let outcome = game.step(action);
            if outcome.done {
                break;
            }
            prop_assert_eq!(game.snake().len(), INITIAL_LENGTH + outcome.score as usize);
        }
    }

    #[test]
    fn food_never_lands_on_the_snake(seed in any::<u64>(), config in small_board(), moves in actions()) {
        let mut game = Game::with_seed(config, seed);
        prop_assert!(!game.snake().contains(&game.food()));

        for action in moves {
            if game.step(action).done {
                game.reset();
            }
            if game.snake().len() < (game.config().columns() * game.config().rows()) as usize {
                prop_assert!(!game.snake().contains(&game.food()));
            }
        }
    }

    #[test]
    fn danger_is_symmetric_under_reversal(seed in any::<u64>(), moves in actions()) {
        let mut game = Game::with_seed(GameConfig::default(), seed);
        for action in moves {
            let before: Vec<Point> = game.snake().iter().copied().collect();
            let heading = game.direction();
            let food = game.food();

            let flipped = Game::from_parts(GameConfig::default(), before.clone(), heading.opposite(), food, seed);
            let here = Game::from_parts(GameConfig::default(), before, heading, food, seed);
            let s = state::encode(&here);
            let r = state::encode(&flipped);

            prop_assert_eq!(s[DANGER_LEFT], r[DANGER_RIGHT]);
            prop_assert_eq!(s[DANGER_RIGHT], r[DANGER_LEFT]);

            if game.step(action).done {
                break;
            }
        }
    }

    #[test]
    fn replay_buffer_keeps_the_newest(capacity in 1usize..50, pushes in 0usize..200) {
        let mut buffer = ReplayBuffer::new(capacity);
        for i in 0..pushes {
            buffer.add(i);
            prop_assert!(buffer.len() <= capacity);
        }

        let kept: Vec<usize> = buffer.iter().copied().collect();
        let expected: Vec<usize> = (pushes.saturating_sub(capacity)..pushes).collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn terminal_target_is_exactly_the_reward(
        reward in -20.0f32..20.0,
        predictions in prop::array::uniform3(-50.0f32..50.0),
        next_max in -50.0f32..50.0,
        action_index in 0usize..3,
        gamma in 0.0f32..1.0
    ) {
        let action = Action::ALL[action_index];
        let transition = Transition {
            state: [0.0; STATE_SIZE],
            action,
            reward,
            next_state: [0.0; STATE_SIZE],
            done: true
        };
        let prediction_tensor = Tensor::from_vec(predictions.to_vec(), vec![1, 3]);

        let targets = QTrainer::new(gamma).targets(&prediction_tensor, &[next_max], &[&transition]);

        for (i, &value) in targets.read().iter().enumerate() {
            if i == action.index() {
                prop_assert_eq!(value, reward);
            } else {
                prop_assert_eq!(value, predictions[i]);
            }
        }
    }
}

#[test]
fn straight_into_own_neck_is_fatal() {
    // heading left while the neck sits to the left of the head
    let mut game = Game::from_parts(
        GameConfig::default(),
        vec![Point::new(100, 100), Point::new(80, 100), Point::new(60, 100)],
        Direction::Left,
        Point::new(300, 300),
        0
    );

    let outcome = game.step(Action::Straight);

    assert!(outcome.done);
    assert_eq!(outcome.reward, -10.0);
    assert_eq!(outcome.score, 0);
}

#[test]
fn food_above_head_sets_only_the_up_flag() {
    let game = Game::from_parts(
        GameConfig::default(),
        vec![Point::new(100, 100), Point::new(80, 100), Point::new(60, 100)],
        Direction::Right,
        Point::new(100, 80),
        0
    );

    let state = state::encode(&game);

    // food left, right, up, down
    assert_eq!(&state[7..], &[0.0, 0.0, 1.0, 0.0]);
}
