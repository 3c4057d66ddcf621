use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/hosts", host_routes(config))
        .nest("/challenges", challenge_routes(config))
        .nest("/phase-splits", phase_split_routes())
        .nest("/submissions", submission_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::me))
}

fn host_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let teams = OpenApiRouter::new()
        .routes(routes!(handlers::host::create_team))
        .routes(routes!(handlers::host::add_member));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::challenge::import_challenge))
        .layer(handlers::challenge::upload_body_limit(
            config.import.max_upload_size,
        ));

    teams.merge(upload)
}

fn challenge_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let read = OpenApiRouter::new()
        .routes(routes!(handlers::challenge::get_challenge))
        .routes(routes!(handlers::challenge::approve_challenge))
        .routes(routes!(handlers::challenge::download_annotation));

    let upload = OpenApiRouter::new()
        .routes(routes!(
            handlers::challenge::replace_evaluation_script,
            handlers::challenge::download_evaluation_script
        ))
        .layer(handlers::challenge::upload_body_limit(
            config.import.max_upload_size,
        ));

    read.merge(upload)
}

fn phase_split_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::leaderboard::get_leaderboard))
}

fn submission_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::leaderboard::report_result))
}
