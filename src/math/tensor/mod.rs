pub mod dense;
pub mod map;
pub mod tensor_rand;

pub use dense::Tensor;
pub use map::{TensorMap, TensorMapMut};
pub use tensor_rand::{fill_random, RandType};
