pub mod math;
pub mod noise;
pub mod pathfinding;
pub mod registry;
pub mod tensor;
pub mod worldgen;
