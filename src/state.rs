use crate::game::{Direction, Game};
use crate::sequential::tensor::Tensor;

pub const STATE_SIZE: usize = 11;

/// `[danger straight, right, left; heading left, right, up, down; food left, right, up, down]`
pub type State = [f32; STATE_SIZE];

pub fn encode(game: &Game) -> State {
    let head = game.head();
    let heading = game.direction();
    let block = game.config().block_size;
    let food = game.food();

    let danger = |direction: Direction| game.is_collision(head.offset(direction, block));

    let flags = [
        danger(heading),
        danger(heading.clockwise()),
        danger(heading.counter_clockwise()),

        heading == Direction::Left,
        heading == Direction::Right,
        heading == Direction::Up,
        heading == Direction::Down,

        // screen space, so "up" is a smaller y
        food.x < head.x,
        food.x > head.x,
        food.y < head.y,
        food.y > head.y,
    ];

    flags.map(|flag| flag as i32 as f32)
}

pub fn to_tensor(state: &State) -> Tensor {
    Tensor::from_vec(state.to_vec(), vec![1, STATE_SIZE])
}
