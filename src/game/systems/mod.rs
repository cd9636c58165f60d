pub mod boss;
pub mod collision;
pub mod enemy;
pub mod pickups;
pub mod player;
pub mod projectile;
pub mod score;
pub mod upgrade;
pub mod wave;
pub mod weapons;
