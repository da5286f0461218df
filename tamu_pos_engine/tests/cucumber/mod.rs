mod pos_world;
mod steps;

pub use pos_world::PosWorld;
