pub mod auth;
pub mod challenge;
pub mod host;
pub mod leaderboard;
