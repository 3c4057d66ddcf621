use sea_orm::EntityTrait;
use serde_json::{Value, json};

use server::entity::submission;

use crate::common::{TestApp, routes, sample_bundle};

/// One imported challenge, two participant teams with a submission each,
/// and an evaluation worker.
struct Fixture {
    host: String,
    worker: String,
    alice: String,
    phase_split_id: i32,
    alice_submission: i32,
    bob_submission: i32,
}

async fn fixture(app: &TestApp, visibility: u8) -> Fixture {
    let host = app.create_verified_user("host").await;
    let team_id = app.create_host_team(&host, "Hosts").await;
    let body = app
        .import_bundle(&host, team_id, sample_bundle("Trees", visibility))
        .await;
    let phase_id = body["challenge"]["phases"][0]["id"].as_i64().unwrap() as i32;
    let phase_split_id = body["phase_splits"][0]["id"].as_i64().unwrap() as i32;

    let worker = app.create_user_with_role("worker", "evaluator").await;
    let alice = app.create_verified_user("alice").await;
    app.create_verified_user("bob").await;

    let alice_id = app.user("alice").await.id;
    let bob_id = app.user("bob").await.id;
    let alice_team = app.create_participant_team("Alice Team", &[alice_id]).await;
    let bob_team = app.create_participant_team("Bob Team", &[bob_id]).await;

    Fixture {
        host,
        worker,
        alice,
        phase_split_id,
        alice_submission: app.create_submission(phase_id, alice_team, alice_id).await,
        bob_submission: app.create_submission(phase_id, bob_team, bob_id).await,
    }
}

fn report(accuracy: f64, f1: f64) -> Value {
    json!({
        "result": [{"test": {"Accuracy": accuracy, "F1-Score": f1}}],
        "submission_result": {"Accuracy": accuracy, "F1-Score": f1},
    })
}

async fn record(app: &TestApp, f: &Fixture, submission_id: i32, body: &Value) {
    let res = app
        .post_with_token(&routes::submission_result(submission_id), body, &f.worker)
        .await;
    assert_eq!(res.status, 200, "report failed: {}", res.text);
}

fn team_names(board: &Value) -> Vec<&str> {
    board["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["team_name"].as_str().unwrap())
        .collect()
}

mod recording {
    use super::*;

    #[tokio::test]
    async fn reported_result_finishes_the_submission() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        let res = app
            .post_with_token(
                &routes::submission_result(f.alice_submission),
                &report(0.75, 0.7),
                &f.worker,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "finished");
        assert_eq!(res.body["leaderboard_data_ids"].as_array().unwrap().len(), 1);

        let stored = submission::Entity::find_by_id(f.alice_submission)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, submission::STATUS_FINISHED);
    }

    #[tokio::test]
    async fn reporting_twice_replaces_the_row() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        record(&app, &f, f.alice_submission, &report(0.5, 0.5)).await;
        record(&app, &f, f.alice_submission, &report(0.8, 0.7)).await;

        let board = app.get_without_token(&routes::leaderboard(f.phase_split_id)).await;
        let entries = board.body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["result"]["Accuracy"], 0.8);
    }

    #[tokio::test]
    async fn missing_schema_metric_is_rejected() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        let res = app
            .post_with_token(
                &routes::submission_result(f.alice_submission),
                &json!({"result": [{"test": {"Accuracy": 0.5}}]}),
                &f.worker,
            )
            .await;

        assert_eq!(res.status, 400);
        assert!(res.body["message"].as_str().unwrap().contains("F1-Score"));
    }

    #[tokio::test]
    async fn unknown_split_codename_is_rejected() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        let res = app
            .post_with_token(
                &routes::submission_result(f.alice_submission),
                &json!({"result": [{"holdout": {"Accuracy": 0.5, "F1-Score": 0.5}}]}),
                &f.worker,
            )
            .await;

        assert_eq!(res.status, 400);
        assert!(res.body["message"].as_str().unwrap().contains("holdout"));
    }

    #[tokio::test]
    async fn error_only_report_fails_the_submission() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        let res = app
            .post_with_token(
                &routes::submission_result(f.bob_submission),
                &json!({"error": {"traceback": "ValueError"}}),
                &f.worker,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "failed");
        assert!(res.body["leaderboard_data_ids"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn participants_cannot_report_results() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        let res = app
            .post_with_token(
                &routes::submission_result(f.alice_submission),
                &report(1.0, 1.0),
                &f.alice,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn unknown_submission_is_not_found() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;

        let res = app
            .post_with_token(&routes::submission_result(99_999), &report(1.0, 1.0), &f.worker)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod visibility {
    use super::*;

    #[tokio::test]
    async fn public_board_is_ranked_and_rounded_for_everyone() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;
        record(&app, &f, f.alice_submission, &report(0.5, 0.4)).await;
        record(&app, &f, f.bob_submission, &report(0.912345, 0.88888)).await;

        let res = app.get_without_token(&routes::leaderboard(f.phase_split_id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["visibility"], "public");
        assert_eq!(res.body["order_by"], "Accuracy");
        assert_eq!(res.body["labels"], json!(["Accuracy", "F1-Score"]));
        assert_eq!(team_names(&res.body), vec!["Bob Team", "Alice Team"]);
        let top = &res.body["entries"][0];
        assert_eq!(top["result"]["Accuracy"], 0.91);
        assert_eq!(top["result"]["F1-Score"], 0.89);
        assert_eq!(top["filtering_score"], 0.91);
    }

    #[tokio::test]
    async fn owner_and_host_board_shows_participants_their_own_entries() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 2).await;
        record(&app, &f, f.alice_submission, &report(0.5, 0.4)).await;
        record(&app, &f, f.bob_submission, &report(0.9, 0.8)).await;
        let path = routes::leaderboard(f.phase_split_id);

        let alice = app.get_with_token(&path, &f.alice).await;
        assert_eq!(alice.status, 200);
        assert_eq!(team_names(&alice.body), vec!["Alice Team"]);

        let host = app.get_with_token(&path, &f.host).await;
        assert_eq!(team_names(&host.body), vec!["Bob Team", "Alice Team"]);

        let anonymous = app.get_without_token(&path).await;
        assert_eq!(anonymous.status, 200);
        assert!(team_names(&anonymous.body).is_empty());
    }

    #[tokio::test]
    async fn host_board_is_closed_to_everyone_else() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 1).await;
        record(&app, &f, f.alice_submission, &report(0.5, 0.4)).await;
        let path = routes::leaderboard(f.phase_split_id);

        let alice = app.get_with_token(&path, &f.alice).await;
        assert_eq!(alice.status, 403);
        assert_eq!(alice.body["code"], "PERMISSION_DENIED");
        assert_eq!(app.get_without_token(&path).await.status, 403);

        let host = app.get_with_token(&path, &f.host).await;
        assert_eq!(host.status, 200);
        assert_eq!(team_names(&host.body), vec!["Alice Team"]);

        let admin = app.create_user_with_role("root", "admin").await;
        assert_eq!(app.get_with_token(&path, &admin).await.status, 200);
    }

    #[tokio::test]
    async fn unverified_viewer_is_stopped_by_the_gate() {
        let app = TestApp::spawn().await;
        let f = fixture(&app, 3).await;
        app.set_email_verified("alice", false).await;

        let res = app
            .get_with_token(&routes::leaderboard(f.phase_split_id), &f.alice)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "EMAIL_NOT_VERIFIED");
    }
}
