use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use server::entity::{challenge, challenge_host, challenge_host_team, email_address, user};
use server::provision::{ProvisionError, ProvisionOptions, provision};

use crate::common::{TestApp, routes, sample_bundle};

fn base_dir_with_bundle() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("g2net_challenge");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(
        target.join("challenge_config.zip"),
        sample_bundle("G2Net Gravitational Wave Detection", 3),
    )
    .unwrap();
    dir
}

#[tokio::test]
async fn provisioning_creates_an_approved_challenge_for_the_host() {
    let app = TestApp::spawn().await;
    let dir = base_dir_with_bundle();
    let options = ProvisionOptions::with_base_dir(dir.path());

    let provisioned = provision(&app.db, &app.importer(), &options).await.unwrap();

    let challenge = &provisioned.challenge.challenge;
    assert!(challenge.approved_by_admin);
    assert_eq!(challenge.creator_id, provisioned.host_team.id);
    assert_eq!(
        challenge.slug.as_deref(),
        Some(format!("g2net-gravitational-wave-detection-{}", challenge.id).as_str())
    );

    let host = &provisioned.user;
    assert_eq!(host.username, "g2net_hack");
    assert!(host.is_staff);
    assert_eq!(host.role, "admin");

    let address = email_address::Entity::find()
        .filter(email_address::Column::Email.eq("hack@g2net.eu"))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(address.verified);
    assert!(address.is_primary);

    let membership = challenge_host::Entity::find()
        .filter(challenge_host::Column::UserId.eq(host.id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.status, challenge_host::STATUS_SELF);
    assert_eq!(membership.permissions, challenge_host::PERMISSION_ADMIN);

    assert_eq!(app.hook.changes().len(), 1);
}

#[tokio::test]
async fn provisioned_host_can_log_in_past_the_gate() {
    let app = TestApp::spawn().await;
    let dir = base_dir_with_bundle();
    provision(&app.db, &app.importer(), &ProvisionOptions::with_base_dir(dir.path()))
        .await
        .unwrap();

    let res = app
        .post_without_token(
            routes::LOGIN,
            &serde_json::json!({"username": "g2net_hack", "password": "qwerty12345"}),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    let token = res.body["token"].as_str().unwrap();

    let me = app.get_with_token(routes::ME, token).await;
    assert_eq!(me.body["email_verified"], true);
    assert!(
        me.body["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "challenge:approve")
    );
}

#[tokio::test]
async fn rerun_reuses_the_account_and_team() {
    let app = TestApp::spawn().await;
    let dir = base_dir_with_bundle();
    let options = ProvisionOptions::with_base_dir(dir.path());

    let first = provision(&app.db, &app.importer(), &options).await.unwrap();
    let second = provision(&app.db, &app.importer(), &options).await.unwrap();

    assert_eq!(first.user.id, second.user.id);
    assert_eq!(first.host_team.id, second.host_team.id);
    assert_ne!(first.challenge.challenge.id, second.challenge.challenge.id);
    assert_eq!(user::Entity::find().count(&app.db).await.unwrap(), 1);
    assert_eq!(challenge_host_team::Entity::find().count(&app.db).await.unwrap(), 1);
    assert_eq!(challenge_host::Entity::find().count(&app.db).await.unwrap(), 1);
    assert_eq!(challenge::Entity::find().count(&app.db).await.unwrap(), 2);
}

#[tokio::test]
async fn missing_bundle_leaves_the_database_untouched() {
    let app = TestApp::spawn().await;
    let dir = tempfile::tempdir().unwrap();

    let err = provision(&app.db, &app.importer(), &ProvisionOptions::with_base_dir(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Read { .. }));
    assert_eq!(user::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_bundle_rolls_back_the_account() {
    let app = TestApp::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("g2net_challenge");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("challenge_config.zip"), b"not a zip").unwrap();

    let err = provision(&app.db, &app.importer(), &ProvisionOptions::with_base_dir(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Import(_)));
    assert_eq!(user::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn email_registered_by_another_account_is_not_taken_over() {
    let app = TestApp::spawn().await;
    let dir = base_dir_with_bundle();
    let res = app
        .post_without_token(
            routes::REGISTER,
            &serde_json::json!({
                "username": "mallory",
                "email": "Hack@G2Net.eu",
                "password": "securepass",
            }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);

    let err = provision(&app.db, &app.importer(), &ProvisionOptions::with_base_dir(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::EmailTaken(ref email) if email == "hack@g2net.eu"));

    let address = email_address::Entity::find()
        .filter(email_address::Column::Email.eq("hack@g2net.eu"))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!address.verified);
    assert!(
        user::Entity::find()
            .filter(user::Column::Username.eq("g2net_hack"))
            .one(&app.db)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(challenge::Entity::find().count(&app.db).await.unwrap(), 0);
}
