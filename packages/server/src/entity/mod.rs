pub mod challenge;
pub mod challenge_host;
pub mod challenge_host_team;
pub mod challenge_participant_team;
pub mod challenge_phase;
pub mod challenge_phase_split;
pub mod dataset_split;
pub mod email_address;
pub mod leaderboard;
pub mod leaderboard_data;
pub mod participant;
pub mod participant_team;
pub mod role;
pub mod role_permission;
pub mod submission;
pub mod user;
