use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod registration {
    use super::*;

    #[tokio::test]
    async fn new_user_is_created_with_an_unverified_email() {
        let app = TestApp::spawn().await;

        let res = app.register("alice").await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert!(res.body["id"].is_number());
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["email"], "alice@example.com");

        let token = app.login("alice").await;
        let me = app.get_with_token(routes::ME, &token).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["email_verified"], false);
        assert_eq!(me.body["role"], "participant");
    }

    #[tokio::test]
    async fn cannot_register_with_an_already_taken_username() {
        let app = TestApp::spawn().await;
        assert_eq!(app.register("alice").await.status, 201);

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "email": "other@example.com", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "USERNAME_TAKEN");
    }

    #[tokio::test]
    async fn cannot_register_an_email_twice() {
        let app = TestApp::spawn().await;
        assert_eq!(app.register("alice").await.status, 201);

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "bob", "email": "Alice@Example.com", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
        // The user row is rolled back with the address.
        let again = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "bob", "email": "bob@example.com", "password": PASSWORD}),
            )
            .await;
        assert_eq!(again.status, 201, "{}", again.text);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "email": "not-an-email", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = TestApp::spawn().await;
        app.register("alice").await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": "wrongpass"}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn token_carries_role_permissions() {
        let app = TestApp::spawn().await;
        let token = app.create_user_with_role("worker", "evaluator").await;

        let me = app.get_with_token(routes::ME, &token).await;

        assert_eq!(me.status, 200);
        assert_eq!(me.body["role"], "evaluator");
        assert_eq!(me.body["permissions"], json!(["submission:report_result"]));
        assert_eq!(me.body["email_verified"], true);
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ME).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::ME, "not-a-jwt").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }
}

mod verified_email_gate {
    use super::*;

    #[tokio::test]
    async fn unverified_user_is_denied_until_an_address_is_verified() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;

        let denied = app
            .post_with_token(routes::HOST_TEAMS, &json!({"team_name": "Trees"}), &token)
            .await;
        assert_eq!(denied.status, 403);
        assert_eq!(denied.body["code"], "EMAIL_NOT_VERIFIED");
        assert_eq!(denied.body["message"], "Please verify your email first!");

        app.set_email_verified("alice", true).await;

        let allowed = app
            .post_with_token(routes::HOST_TEAMS, &json!({"team_name": "Trees"}), &token)
            .await;
        assert_eq!(allowed.status, 201, "{}", allowed.text);
    }

    #[tokio::test]
    async fn gate_is_open_when_verification_is_not_required() {
        let app = TestApp::spawn_with(|c| c.account.email_required = false).await;
        let token = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(routes::HOST_TEAMS, &json!({"team_name": "Trees"}), &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
    }
}
