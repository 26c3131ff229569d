pub mod activity;
pub mod group;
pub mod leaderboard;
pub mod organisation;
pub mod user;

pub use activity::*;
pub use group::*;
pub use leaderboard::*;
pub use organisation::*;
pub use user::*;
