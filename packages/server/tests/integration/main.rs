mod auth;
mod challenge_import;
mod leaderboard;
mod provision;
