use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use server::entity::{challenge_participant_team, participant};

use crate::common::{TestApp, bundle_from_manifest, routes, sample_bundle, sample_manifest, zip_files};

/// A verified host with a team, returning `(token, team_id)`.
async fn host(app: &TestApp, username: &str) -> (String, i32) {
    let token = app.create_verified_user(username).await;
    let team_id = app.create_host_team(&token, &format!("{username}_team")).await;
    (token, team_id)
}

mod import {
    use super::*;

    #[tokio::test]
    async fn bundle_creates_challenge_with_public_phase_split() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;

        let body = app
            .import_bundle(&token, team_id, sample_bundle("Forest Cover Type", 3))
            .await;

        let challenge = &body["challenge"];
        let id = challenge["id"].as_i64().unwrap();
        assert_eq!(challenge["title"], "Forest Cover Type");
        assert_eq!(challenge["slug"], format!("forest-cover-type-{id}"));
        assert_eq!(challenge["creator_id"], team_id);
        assert_eq!(challenge["approved_by_admin"], false);
        assert_eq!(challenge["description"], "<p>Classify trees.</p>");
        assert!(challenge["submission_guidelines"].is_null());
        assert!(challenge["image"].is_string());
        assert!(
            challenge["queue"]
                .as_str()
                .unwrap()
                .starts_with("forest-cover-type-test-")
        );

        let phase = &challenge["phases"][0];
        assert_eq!(phase["codename"], "dev");
        assert_eq!(phase["slug"], format!("forest-dev-{id}"));
        assert_eq!(phase["description"], "<p>Dev phase.</p>");
        assert_eq!(phase["has_annotation"], true);
        assert_eq!(phase["max_submissions_per_day"], 2);
        assert_eq!(phase["max_concurrent_submissions_allowed"], 2);

        let splits = body["phase_splits"].as_array().unwrap();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0]["visibility"], "public");
        assert_eq!(splits[0]["leaderboard_decimal_precision"], 2);
        assert_eq!(splits[0]["is_leaderboard_order_descending"], true);
    }

    #[tokio::test]
    async fn verified_hosts_join_the_host_participant_team() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        app.create_authenticated_user("bob").await;
        let add = app
            .post_with_token(
                &routes::host_members(team_id),
                &json!({"username": "bob"}),
                &token,
            )
            .await;
        assert_eq!(add.status, 201, "{}", add.text);

        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let team = body["host_participant_team_id"].as_i64().unwrap() as i32;

        // bob's address is unverified, so only alice is enrolled.
        let members = participant::Entity::find()
            .filter(participant::Column::TeamId.eq(team))
            .all(&app.db)
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, app.user("alice").await.id);

        let links = challenge_participant_team::Entity::find()
            .filter(challenge_participant_team::Column::ParticipantTeamId.eq(team))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(links, 1);
    }

    #[tokio::test]
    async fn docker_based_challenge_gets_no_host_participant_team() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let manifest = sample_manifest("Docker", 3).replace(
            "published: true",
            "published: true\nis_docker_based: true",
        );

        let body = app
            .import_bundle(&token, team_id, bundle_from_manifest(&manifest))
            .await;

        assert!(body["host_participant_team_id"].is_null());
        assert_eq!(body["challenge"]["is_docker_based"], true);
    }

    #[tokio::test]
    async fn hooks_see_the_created_challenge() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;

        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;

        let changes = app.hook.changes();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_creation());
        assert_eq!(
            i64::from(changes[0].challenge.id),
            body["challenge"]["id"].as_i64().unwrap()
        );
    }
}

mod rejected_bundles {
    use super::*;

    #[tokio::test]
    async fn archive_without_yaml_persists_nothing() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let before = app.import_row_count().await;

        let bundle = zip_files(&[("challenge/readme.txt", b"no manifest here")]);
        let res = app
            .upload_with_token(&routes::team_challenges(team_id), "b.zip", bundle, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(res.body["message"], "No yaml file found in zip root!");
        assert_eq!(app.import_row_count().await, before);
        assert!(app.hook.changes().is_empty());
    }

    #[tokio::test]
    async fn duplicate_split_names_roll_back_the_import() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let before = app.import_row_count().await;

        let manifest = sample_manifest("Trees", 3).replace(
            "    codename: test\n",
            "    codename: test\n  - id: 2\n    name: Test Split\n    codename: test2\n",
        );
        let res = app
            .upload_with_token(
                &routes::team_challenges(team_id),
                "b.zip",
                bundle_from_manifest(&manifest),
                &token,
            )
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.body["message"].as_str().unwrap().contains("dataset_splits.name"));
        assert_eq!(app.import_row_count().await, before);
    }

    #[tokio::test]
    async fn dangling_leaderboard_reference_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;

        let manifest = sample_manifest("Trees", 3).replace("leaderboard_id: 1", "leaderboard_id: 9");
        let res = app
            .upload_with_token(
                &routes::team_challenges(team_id),
                "b.zip",
                bundle_from_manifest(&manifest),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert!(res.body["message"].as_str().unwrap().contains("id 9"));
    }

    #[tokio::test]
    async fn missing_evaluation_script_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;

        let bundle = zip_files(&[(
            "challenge_config.yaml",
            sample_manifest("Trees", 3).as_bytes(),
        )]);
        let res = app
            .upload_with_token(&routes::team_challenges(team_id), "b.zip", bundle, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unverified_host_is_stopped_by_the_gate() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        app.set_email_verified("alice", false).await;

        let res = app
            .upload_with_token(
                &routes::team_challenges(team_id),
                "b.zip",
                sample_bundle("Trees", 3),
                &token,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "EMAIL_NOT_VERIFIED");
    }

    #[tokio::test]
    async fn non_member_cannot_import_for_a_team() {
        let app = TestApp::spawn().await;
        let (_, team_id) = host(&app, "alice").await;
        let mallory = app.create_verified_user("mallory").await;

        let res = app
            .upload_with_token(
                &routes::team_challenges(team_id),
                "b.zip",
                sample_bundle("Trees", 3),
                &mallory,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }
}

mod hosts {
    use super::*;

    #[tokio::test]
    async fn only_team_admins_add_members() {
        let app = TestApp::spawn().await;
        let (alice, team_id) = host(&app, "alice").await;
        let bob = app.create_verified_user("bob").await;
        app.create_verified_user("carol").await;

        let add_bob = app
            .post_with_token(
                &routes::host_members(team_id),
                &json!({"username": "bob", "permissions": "write"}),
                &alice,
            )
            .await;
        assert_eq!(add_bob.status, 201, "{}", add_bob.text);
        assert_eq!(add_bob.body["status"], "accepted");

        let bob_adds = app
            .post_with_token(
                &routes::host_members(team_id),
                &json!({"username": "carol"}),
                &bob,
            )
            .await;
        assert_eq!(bob_adds.status, 403);

        let again = app
            .post_with_token(
                &routes::host_members(team_id),
                &json!({"username": "bob"}),
                &alice,
            )
            .await;
        assert_eq!(again.status, 409);
    }

    #[tokio::test]
    async fn team_names_are_unique() {
        let app = TestApp::spawn().await;
        let token = app.create_verified_user("alice").await;
        app.create_host_team(&token, "Trees").await;

        let res = app
            .post_with_token(routes::HOST_TEAMS, &json!({"team_name": "Trees"}), &token)
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }
}

mod challenge_access {
    use super::*;

    #[tokio::test]
    async fn published_challenge_is_visible_anonymously() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;

        let res = app.get_without_token(&routes::challenge(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["phases"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unpublished_challenge_is_hidden_from_outsiders() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let manifest = sample_manifest("Trees", 3).replace("published: true", "published: false");
        let body = app
            .import_bundle(&token, team_id, bundle_from_manifest(&manifest))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;

        assert_eq!(app.get_without_token(&routes::challenge(id)).await.status, 404);
        assert_eq!(app.get_with_token(&routes::challenge(id), &token).await.status, 200);
    }

    #[tokio::test]
    async fn approval_requires_the_admin_permission() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let admin = app.create_user_with_role("root", "admin").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;

        let denied = app.post_with_token(&routes::approve(id), &json!({}), &token).await;
        assert_eq!(denied.status, 403);

        let approved = app.post_with_token(&routes::approve(id), &json!({}), &admin).await;
        assert_eq!(approved.status, 200, "{}", approved.text);
        assert_eq!(approved.body["approved_by_admin"], true);
        assert_eq!(approved.body["slug"], format!("trees-{id}"));
    }
}

mod evaluation_script {
    use super::*;

    #[tokio::test]
    async fn replacement_hook_sees_the_prior_script() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;
        let original = body["challenge"]["evaluation_script"].as_str().unwrap().to_string();

        let res = app
            .put_file_with_token(
                &routes::evaluation_script(id),
                "evaluation_script.zip",
                b"script-v2".to_vec(),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["changed"], true);
        assert_eq!(res.body["previous_evaluation_script"], original);
        assert_ne!(res.body["evaluation_script"], original);

        let changes = app.hook.changes();
        assert_eq!(changes.len(), 2);
        let replacement = &changes[1];
        assert!(replacement.evaluation_script_changed());
        assert!(replacement.changed_annotations().is_empty());
        assert_eq!(
            replacement.prior.as_ref().unwrap().evaluation_script.as_deref(),
            Some(original.as_str())
        );
    }

    #[tokio::test]
    async fn same_script_is_reported_unchanged() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;

        let res = app
            .put_file_with_token(
                &routes::evaluation_script(id),
                "evaluation_script.zip",
                b"script-v1".to_vec(),
                &token,
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["changed"], false);
        assert!(!app.hook.changes()[1].watched_fields_changed());
    }

    #[tokio::test]
    async fn other_hosts_cannot_replace_the_script() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let (other, _) = host(&app, "bob").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;

        let res = app
            .put_file_with_token(&routes::evaluation_script(id), "s.zip", b"x".to_vec(), &other)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(app.hook.changes().len(), 1);
    }

    #[tokio::test]
    async fn hosts_and_workers_download_the_stored_files() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let worker = app.create_user_with_role("worker", "evaluator").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;
        let phase_id = body["challenge"]["phases"][0]["id"].as_i64().unwrap() as i32;

        let script = app
            .get_with_token(&routes::evaluation_script(id), &token)
            .await;
        assert_eq!(script.status, 200, "{}", script.text);
        assert_eq!(script.text, "script-v1");

        let annotation = app
            .get_with_token(&routes::annotation(id, phase_id), &worker)
            .await;
        assert_eq!(annotation.status, 200, "{}", annotation.text);
        assert_eq!(annotation.text, "ID,label\n1,oak\n");
    }

    #[tokio::test]
    async fn participants_cannot_download_the_stored_files() {
        let app = TestApp::spawn().await;
        let (token, team_id) = host(&app, "alice").await;
        let outsider = app.create_verified_user("mallory").await;
        let body = app
            .import_bundle(&token, team_id, sample_bundle("Trees", 3))
            .await;
        let id = body["challenge"]["id"].as_i64().unwrap() as i32;
        let phase_id = body["challenge"]["phases"][0]["id"].as_i64().unwrap() as i32;

        let script = app
            .get_with_token(&routes::evaluation_script(id), &outsider)
            .await;
        assert_eq!(script.status, 403);
        let annotation = app
            .get_with_token(&routes::annotation(id, phase_id), &outsider)
            .await;
        assert_eq!(annotation.status, 403);
        let anonymous = app.get_without_token(&routes::evaluation_script(id)).await;
        assert_eq!(anonymous.status, 401);
    }
}
