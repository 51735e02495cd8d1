//! End-to-end tests driving the full route table against an in-memory
//! database.

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use postedit_backend::helper::auth_helpers::JwtKeys;
use postedit_backend::models::db_operations::users_db_operations;
use postedit_backend::setup::db_setup;
use postedit_backend::{routes, AppState, DbPool};
use rstest::{fixture, rstest};
use serde_json::{json, Value};

const PASSWORD: &str = "password123";

struct TestContext {
    pool: DbPool,
    state: web::Data<AppState>,
}

#[fixture]
fn ctx() -> TestContext {
    let keys = JwtKeys::from_pem(
        include_bytes!("fixtures/jwt_private.pem"),
        include_str!("fixtures/jwt_public.pem"),
    )
    .expect("test keys");
    TestContext {
        pool: db_setup::open_memory_pool().expect("in-memory pool"),
        state: web::Data::new(AppState { keys, bcrypt_cost: 4 }),
    }
}

async fn init(
    ctx: &TestContext,
) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.pool.clone()))
            .app_data(ctx.state.clone())
            .configure(routes::configure),
    )
    .await
}

struct Reply {
    status: StatusCode,
    challenge: Option<String>,
    body: Value,
}

async fn send(
    app: &impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
    req: test::TestRequest,
) -> Reply {
    let response = test::call_service(app, req.to_request()).await;
    let status = response.status();
    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|v| v.to_str().expect("ascii header").to_string());
    let bytes = test::read_body(response).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    Reply { status, challenge, body }
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Registers `name` and returns its id and token.
async fn register(
    app: &impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
    name: &str,
) -> (i64, String) {
    let reply = send(
        app,
        test::TestRequest::post().uri("/users/register").set_json(json!({
            "name": name,
            "email": format!("{}@example.com", name),
            "password": PASSWORD,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let id = reply.body["id"].as_i64().expect("id");
    let token = reply.body["token"].as_str().expect("token").to_string();
    (id, token)
}

fn make_admin(ctx: &TestContext, user_id: i64) {
    let conn = ctx.pool.get().expect("connection");
    users_db_operations::update_flags(&conn, user_id, Some(true), None, None).expect("promote");
}

fn count(ctx: &TestContext, sql: &str, id: i64) -> i64 {
    let conn = ctx.pool.get().expect("connection");
    conn.query_row(sql, [id], |row| row.get(0)).expect("count")
}

async fn create_post(
    app: &impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
    name: &str,
    token: &str,
) -> i64 {
    let reply = send(
        app,
        test::TestRequest::post()
            .uri(&format!("/users/{}/posts/create", name))
            .insert_header(bearer(token))
            .set_json(json!({ "title": "Hello", "content": "First post" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["post"]["id"].as_i64().expect("post id")
}

#[rstest]
#[actix_web::test]
async fn root_and_public_key(ctx: TestContext) {
    let app = init(&ctx).await;

    let reply = send(&app, test::TestRequest::get().uri("/")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["message"], "API Root");

    let reply = send(&app, test::TestRequest::get().uri("/public-key")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["publicKey"], include_str!("fixtures/jwt_public.pem"));
}

#[rstest]
#[actix_web::test]
async fn registration_rejects_duplicates_and_bad_input(ctx: TestContext) {
    let app = init(&ctx).await;
    let (_, token) = register(&app, "alice").await;
    assert!(!token.is_empty());

    let duplicate_name = send(
        &app,
        test::TestRequest::post().uri("/users/register").set_json(json!({
            "name": "alice", "email": "other@example.com", "password": PASSWORD,
        })),
    )
    .await;
    assert_eq!(duplicate_name.status, StatusCode::BAD_REQUEST);

    let duplicate_email = send(
        &app,
        test::TestRequest::post().uri("/users/register").set_json(json!({
            "name": "alice2", "email": "alice@example.com", "password": PASSWORD,
        })),
    )
    .await;
    assert_eq!(duplicate_email.status, StatusCode::BAD_REQUEST);

    let missing_password = send(
        &app,
        test::TestRequest::post()
            .uri("/users/register")
            .set_json(json!({ "name": "carol", "email": "carol@example.com" })),
    )
    .await;
    assert_eq!(missing_password.status, StatusCode::BAD_REQUEST);

    let malformed = send(
        &app,
        test::TestRequest::post()
            .uri("/users/register")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json"),
    )
    .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert!(malformed.body["error"].is_string());

    let users = send(&app, test::TestRequest::get().uri("/users")).await;
    assert_eq!(users.body["users"].as_array().map(Vec::len), Some(1));
    assert!(users.body["users"][0].get("passwordHash").is_none());
}

#[rstest]
#[actix_web::test]
async fn login_checks_password(ctx: TestContext) {
    let app = init(&ctx).await;
    let (id, _) = register(&app, "alice").await;

    let ok = send(
        &app,
        test::TestRequest::post()
            .uri("/users/login")
            .set_json(json!({ "name": "alice", "password": PASSWORD })),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["id"], id);
    assert!(ok.body["token"].is_string());

    let wrong = send(
        &app,
        test::TestRequest::post()
            .uri("/users/login")
            .set_json(json!({ "name": "alice", "password": "not-the-password" })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert!(wrong.challenge.expect("WWW-Authenticate").starts_with("Basic"));

    let unknown = send(
        &app,
        test::TestRequest::post()
            .uri("/users/login")
            .set_json(json!({ "name": "nobody", "password": PASSWORD })),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let user = send(&app, test::TestRequest::get().uri("/users/alice")).await;
    assert!(user.body["user"]["lastLoginAt"].is_string());
}

#[rstest]
#[actix_web::test]
async fn protected_routes_require_a_valid_token(ctx: TestContext) {
    let app = init(&ctx).await;
    register(&app, "alice").await;

    let missing = send(
        &app,
        test::TestRequest::post()
            .uri("/posts/create")
            .set_json(json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], "Missing token");
    assert!(missing.challenge.expect("WWW-Authenticate").starts_with("Bearer"));

    let invalid = send(
        &app,
        test::TestRequest::post()
            .uri("/posts/create")
            .insert_header(bearer("definitely.not.valid"))
            .set_json(json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
    assert_eq!(invalid.body["error"], "Invalid token");
}

#[rstest]
#[actix_web::test]
async fn only_the_author_can_change_a_post(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;

    let post_id = create_post(&app, "alice", &alice).await;

    let not_for_bob = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/posts/create")
            .insert_header(bearer(&bob))
            .set_json(json!({ "title": "Spoof", "content": "nope" })),
    )
    .await;
    assert_eq!(not_for_bob.status, StatusCode::FORBIDDEN);

    let bob_edit = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/users/alice/posts/{}/edit", post_id))
            .insert_header(bearer(&bob))
            .set_json(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(bob_edit.status, StatusCode::FORBIDDEN);

    let bob_delete = send(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/posts/{}/delete", post_id))
            .insert_header(bearer(&bob)),
    )
    .await;
    assert_eq!(bob_delete.status, StatusCode::FORBIDDEN);

    let alice_edit = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/posts/{}/edit", post_id))
            .insert_header(bearer(&alice))
            .set_json(json!({ "title": "Hello again" })),
    )
    .await;
    assert_eq!(alice_edit.status, StatusCode::OK);
    assert_eq!(alice_edit.body["post"]["title"], "Hello again");
    assert_eq!(alice_edit.body["post"]["content"], "First post");
    assert!(alice_edit.body["post"]["editedAt"].is_string());

    let empty_edit = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/posts/{}/edit", post_id))
            .insert_header(bearer(&alice))
            .set_json(json!({})),
    )
    .await;
    assert_eq!(empty_edit.status, StatusCode::BAD_REQUEST);

    let wrong_owner_path = send(&app, test::TestRequest::get().uri(&format!("/users/bob/posts/{}", post_id))).await;
    assert_eq!(wrong_owner_path.status, StatusCode::NOT_FOUND);

    let listed = send(&app, test::TestRequest::get().uri("/users/alice/posts")).await;
    assert_eq!(listed.body["posts"][0]["userId"], alice_id);

    let bad_id = send(&app, test::TestRequest::get().uri("/posts/abc")).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);

    let deleted = send(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/users/alice/posts/{}/delete", post_id))
            .insert_header(bearer(&alice)),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = send(&app, test::TestRequest::get().uri(&format!("/posts/{}", post_id))).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[actix_web::test]
async fn admins_can_act_as_another_user(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;
    let (root_id, root) = register(&app, "root").await;
    make_admin(&ctx, root_id);

    let created = send(
        &app,
        test::TestRequest::post()
            .uri("/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "displayName": "Alice" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let as_self = send(
        &app,
        test::TestRequest::put()
            .uri("/users/alice/profile/edit")
            .insert_header(bearer(&root))
            .set_json(json!({ "bio": "edited by root" })),
    )
    .await;
    assert_eq!(as_self.status, StatusCode::FORBIDDEN);

    let acting = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/users/alice/profile/edit?actingAsUserId={}", alice_id))
            .insert_header(bearer(&root))
            .set_json(json!({ "bio": "edited by root" })),
    )
    .await;
    assert_eq!(acting.status, StatusCode::OK, "{}", acting.body);
    assert_eq!(acting.body["profile"]["bio"], "edited by root");
    assert_eq!(acting.body["profile"]["displayName"], "Alice");

    let post = send(
        &app,
        test::TestRequest::post()
            .uri(&format!("/posts/create?actingAsUserId={}", alice_id))
            .insert_header(bearer(&root))
            .set_json(json!({ "title": "On behalf", "content": "of alice" })),
    )
    .await;
    assert_eq!(post.status, StatusCode::CREATED);
    assert_eq!(post.body["post"]["userId"], alice_id);

    let whoami = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/auth/whoami?actingAsUserId={}", alice_id))
            .insert_header(bearer(&root)),
    )
    .await;
    assert_eq!(whoami.body["claims"]["name"], "root");
    assert_eq!(whoami.body["actingAs"]["name"], "alice");
    assert_eq!(whoami.body["actingAs"]["impersonatedBy"], root_id);

    let unknown_target = send(
        &app,
        test::TestRequest::get()
            .uri("/profile?actingAsUserId=9999")
            .insert_header(bearer(&root)),
    )
    .await;
    assert_eq!(unknown_target.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[actix_web::test]
async fn non_admin_acting_as_is_ignored(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;

    send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "displayName": "Alice" })),
    )
    .await;

    let attempt = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/users/alice/profile/edit?actingAsUserId={}", alice_id))
            .insert_header(bearer(&bob))
            .set_json(json!({ "bio": "bob was here" })),
    )
    .await;
    assert_eq!(attempt.status, StatusCode::FORBIDDEN);
    assert_eq!(attempt.body["error"], "You can only update your own profile");
}

#[rstest]
#[actix_web::test]
async fn profile_lifecycle(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;

    let missing = send(&app, test::TestRequest::get().uri("/users/alice/profile")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let no_display_name = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "bio": "hi" })),
    )
    .await;
    assert_eq!(no_display_name.status, StatusCode::BAD_REQUEST);

    let created = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({
                "displayName": "Alice",
                "bio": "hi",
                "profilePictureUrl": "https://example.com/a.png",
            })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["profile"]["userId"], alice_id);

    let again = send(
        &app,
        test::TestRequest::post()
            .uri("/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "displayName": "Alice" })),
    )
    .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let nothing = send(
        &app,
        test::TestRequest::put()
            .uri("/profile/edit")
            .insert_header(bearer(&alice))
            .set_json(json!({})),
    )
    .await;
    assert_eq!(nothing.status, StatusCode::BAD_REQUEST);
    assert_eq!(nothing.body["error"], "No fields to update");

    let edited = send(
        &app,
        test::TestRequest::put()
            .uri("/profile/edit")
            .insert_header(bearer(&alice))
            .set_json(json!({ "about": "Writes about Rust" })),
    )
    .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["profile"]["about"], "Writes about Rust");
    assert_eq!(edited.body["profile"]["bio"], "hi");

    let own = send(&app, test::TestRequest::get().uri("/profile").insert_header(bearer(&alice))).await;
    assert_eq!(own.body["profile"]["displayName"], "Alice");

    let deleted = send(&app, test::TestRequest::delete().uri("/profile/delete").insert_header(bearer(&alice))).await;
    assert_eq!(deleted.status, StatusCode::OK);
    let deleted_again = send(&app, test::TestRequest::delete().uri("/profile/delete").insert_header(bearer(&alice))).await;
    assert_eq!(deleted_again.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[actix_web::test]
async fn post_comment_threads(ctx: TestContext) {
    let app = init(&ctx).await;
    let (_, alice) = register(&app, "alice").await;
    let (bob_id, bob) = register(&app, "bob").await;
    let (_, carol) = register(&app, "carol").await;
    let post_id = create_post(&app, "alice", &alice).await;
    let base = format!("/users/alice/posts/{}/comments", post_id);

    let comment = send(
        &app,
        test::TestRequest::post()
            .uri(&format!("{}/create", base))
            .insert_header(bearer(&bob))
            .set_json(json!({ "content": "Nice post" })),
    )
    .await;
    assert_eq!(comment.status, StatusCode::CREATED);
    assert_eq!(comment.body["comment"]["userId"], bob_id);
    assert_eq!(comment.body["comment"]["postId"], post_id);
    let comment_id = comment.body["comment"]["id"].as_i64().expect("comment id");

    let reply = send(
        &app,
        test::TestRequest::post()
            .uri(&format!("{}/{}/reply", base, comment_id))
            .insert_header(bearer(&alice))
            .set_json(json!({ "content": "Thanks!" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["reply"]["parentId"], comment_id);
    let reply_id = reply.body["reply"]["id"].as_i64().expect("reply id");

    let nested = send(
        &app,
        test::TestRequest::post()
            .uri(&format!("{}/{}/reply", base, reply_id))
            .insert_header(bearer(&bob))
            .set_json(json!({ "content": "Too deep" })),
    )
    .await;
    assert_eq!(nested.status, StatusCode::BAD_REQUEST);

    let replies = send(&app, test::TestRequest::get().uri(&format!("{}/{}/replies", base, comment_id))).await;
    assert_eq!(replies.body["replies"].as_array().map(Vec::len), Some(1));

    let carol_edit = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("{}/{}/edit", base, comment_id))
            .insert_header(bearer(&carol))
            .set_json(json!({ "content": "edited" })),
    )
    .await;
    assert_eq!(carol_edit.status, StatusCode::FORBIDDEN);

    let carol_delete = send(
        &app,
        test::TestRequest::delete()
            .uri(&format!("{}/{}/delete", base, comment_id))
            .insert_header(bearer(&carol)),
    )
    .await;
    assert_eq!(carol_delete.status, StatusCode::FORBIDDEN);

    let bob_edit = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("{}/{}/edit", base, comment_id))
            .insert_header(bearer(&bob))
            .set_json(json!({ "content": "Very nice post" })),
    )
    .await;
    assert_eq!(bob_edit.status, StatusCode::OK);
    assert_eq!(bob_edit.body["comment"]["content"], "Very nice post");

    let by_author = send(&app, test::TestRequest::get().uri("/users/bob/post-comments")).await;
    assert_eq!(by_author.body["comments"].as_array().map(Vec::len), Some(1));
    let one = send(&app, test::TestRequest::get().uri(&format!("/users/bob/post-comments/{}", comment_id))).await;
    assert_eq!(one.status, StatusCode::OK);
    let not_hers = send(&app, test::TestRequest::get().uri(&format!("/users/carol/post-comments/{}", comment_id))).await;
    assert_eq!(not_hers.status, StatusCode::NOT_FOUND);

    // The post author may moderate comments on their post; replies go too.
    let moderated = send(
        &app,
        test::TestRequest::delete()
            .uri(&format!("{}/{}/delete", base, comment_id))
            .insert_header(bearer(&alice)),
    )
    .await;
    assert_eq!(moderated.status, StatusCode::OK);

    let listed = send(&app, test::TestRequest::get().uri(&base)).await;
    assert_eq!(listed.body["comments"].as_array().map(Vec::len), Some(0));
}

#[rstest]
#[actix_web::test]
async fn user_page_comments(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;

    let signed = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/user-comments/create")
            .insert_header(bearer(&bob))
            .set_json(json!({ "content": "Hi Alice" })),
    )
    .await;
    assert_eq!(signed.status, StatusCode::CREATED);
    assert_eq!(signed.body["comment"]["userPageId"], alice_id);
    let comment_id = signed.body["comment"]["id"].as_i64().expect("comment id");

    let empty = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/user-comments/create")
            .insert_header(bearer(&bob))
            .set_json(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let reply = send(
        &app,
        test::TestRequest::post()
            .uri(&format!("/users/alice/user-comments/{}/reply", comment_id))
            .insert_header(bearer(&alice))
            .set_json(json!({ "content": "Hi Bob" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let alice_edit = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/users/alice/user-comments/{}/edit", comment_id))
            .insert_header(bearer(&alice))
            .set_json(json!({ "content": "rewritten" })),
    )
    .await;
    assert_eq!(alice_edit.status, StatusCode::FORBIDDEN);

    let wrong_page = send(&app, test::TestRequest::get().uri(&format!("/users/bob/user-comments/{}", comment_id))).await;
    assert_eq!(wrong_page.status, StatusCode::NOT_FOUND);

    let page_owner_delete = send(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/users/alice/user-comments/{}/delete", comment_id))
            .insert_header(bearer(&alice)),
    )
    .await;
    assert_eq!(page_owner_delete.status, StatusCode::OK);

    let listed = send(&app, test::TestRequest::get().uri("/users/alice/user-comments")).await;
    assert_eq!(listed.body["comments"].as_array().map(Vec::len), Some(0));
}

#[rstest]
#[actix_web::test]
async fn deleting_a_user_cascades(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;

    send(
        &app,
        test::TestRequest::post()
            .uri("/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "displayName": "Alice" })),
    )
    .await;
    let alice_post = create_post(&app, "alice", &alice).await;
    let bob_post = create_post(&app, "bob", &bob).await;
    for (uri, token) in [
        (format!("/users/alice/posts/{}/comments/create", alice_post), &bob),
        (format!("/users/bob/posts/{}/comments/create", bob_post), &alice),
        ("/users/bob/user-comments/create".to_string(), &alice),
        ("/users/alice/user-comments/create".to_string(), &bob),
    ] {
        let reply = send(
            &app,
            test::TestRequest::post()
                .uri(&uri)
                .insert_header(bearer(token))
                .set_json(json!({ "content": "hello" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", uri);
    }

    let wrong = send(
        &app,
        test::TestRequest::delete()
            .uri("/users/alice/delete")
            .set_json(json!({ "password": "wrong-password" })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let deleted = send(
        &app,
        test::TestRequest::delete()
            .uri("/users/alice/delete")
            .set_json(json!({ "password": PASSWORD })),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = send(&app, test::TestRequest::get().uri("/users/alice")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM profiles WHERE user_id = ?1", alice_id), 0);
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM posts WHERE user_id = ?1", alice_id), 0);
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM comments WHERE post_id = ?1", alice_post), 0);
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM comments WHERE user_id = ?1", alice_id), 0);
    assert_eq!(
        count(&ctx, "SELECT COUNT(*) FROM user_comments WHERE user_id = ?1 OR user_page_id = ?1", alice_id),
        0
    );
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM posts WHERE id = ?1", bob_post), 1);

    // The old token no longer identifies anyone.
    let stale = send(&app, test::TestRequest::get().uri("/auth/whoami").insert_header(bearer(&alice))).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_web::test]
async fn password_and_email_changes(ctx: TestContext) {
    let app = init(&ctx).await;
    register(&app, "alice").await;
    register(&app, "bob").await;

    let changed = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/set-password")
            .set_json(json!({ "oldPassword": PASSWORD, "newPassword": "a-new-password" })),
    )
    .await;
    assert_eq!(changed.status, StatusCode::OK);

    let old_login = send(
        &app,
        test::TestRequest::post()
            .uri("/users/login")
            .set_json(json!({ "name": "alice", "password": PASSWORD })),
    )
    .await;
    assert_eq!(old_login.status, StatusCode::UNAUTHORIZED);

    let taken = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/set-email")
            .set_json(json!({ "password": "a-new-password", "newEmail": "bob@example.com" })),
    )
    .await;
    assert_eq!(taken.status, StatusCode::BAD_REQUEST);

    let email = send(
        &app,
        test::TestRequest::post()
            .uri("/users/alice/set-email")
            .set_json(json!({ "password": "a-new-password", "newEmail": "alice@new.example.com" })),
    )
    .await;
    assert_eq!(email.status, StatusCode::OK);

    let user = send(&app, test::TestRequest::get().uri("/users/alice")).await;
    assert_eq!(user.body["user"]["email"], "alice@new.example.com");
}

#[rstest]
#[actix_web::test]
async fn admin_flags_and_suspension(ctx: TestContext) {
    let app = init(&ctx).await;
    let (_, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;
    let (root_id, root) = register(&app, "root").await;
    make_admin(&ctx, root_id);

    let not_admin = send(
        &app,
        test::TestRequest::put()
            .uri("/users/bob/admin-flags")
            .insert_header(bearer(&alice))
            .set_json(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(not_admin.status, StatusCode::FORBIDDEN);

    let suspended = send(
        &app,
        test::TestRequest::put()
            .uri("/users/bob/admin-flags")
            .insert_header(bearer(&root))
            .set_json(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(suspended.status, StatusCode::OK);
    assert_eq!(suspended.body["user"]["isActive"], false);
    assert!(suspended.body["user"]["permissions"].is_null());

    let tagged = send(
        &app,
        test::TestRequest::put()
            .uri("/users/alice/admin-flags")
            .insert_header(bearer(&root))
            .set_json(json!({ "permissions": "moderate" })),
    )
    .await;
    assert_eq!(tagged.status, StatusCode::OK);
    assert_eq!(tagged.body["user"]["permissions"], "moderate");
    assert_eq!(tagged.body["user"]["isActive"], true);

    let login = send(
        &app,
        test::TestRequest::post()
            .uri("/users/login")
            .set_json(json!({ "name": "bob", "password": PASSWORD })),
    )
    .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);

    let with_old_token = send(
        &app,
        test::TestRequest::post()
            .uri("/posts/create")
            .insert_header(bearer(&bob))
            .set_json(json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(with_old_token.status, StatusCode::FORBIDDEN);
}

#[rstest]
#[actix_web::test]
async fn refresh_issues_a_new_token(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;

    let refreshed = send(&app, test::TestRequest::post().uri("/auth/refresh").insert_header(bearer(&alice))).await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.body["id"], alice_id);

    let token = refreshed.body["token"].as_str().expect("token");
    let whoami = send(&app, test::TestRequest::get().uri("/auth/whoami").insert_header(bearer(token))).await;
    assert_eq!(whoami.status, StatusCode::OK);
    assert_eq!(whoami.body["actingAs"]["id"], alice_id);
}

#[rstest]
#[actix_web::test]
async fn permissions_can_be_cleared(ctx: TestContext) {
    let app = init(&ctx).await;
    let (alice_id, alice) = register(&app, "alice").await;
    let (root_id, root) = register(&app, "root").await;
    make_admin(&ctx, root_id);

    fn flags(body: Value, token: &str, uri: &str) -> test::TestRequest {
        test::TestRequest::put()
            .uri(uri)
            .insert_header(bearer(token))
            .set_json(body)
    }

    let tagged = send(&app, flags(json!({ "permissions": "moderate" }), &root, "/users/alice/admin-flags")).await;
    assert_eq!(tagged.body["user"]["permissions"], "moderate");

    // Omitting the field leaves it alone.
    let untouched = send(&app, flags(json!({ "isAdmin": false }), &root, "/users/alice/admin-flags")).await;
    assert_eq!(untouched.status, StatusCode::OK);
    assert_eq!(untouched.body["user"]["permissions"], "moderate");

    let cleared = send(&app, flags(json!({ "permissions": null }), &root, "/users/alice/admin-flags")).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(cleared.body["user"]["permissions"].is_null());

    let empty = send(&app, flags(json!({}), &root, "/users/alice/admin-flags")).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    // Admin rights come from the token's own user, not the impersonated one.
    let as_alice = send(
        &app,
        flags(
            json!({ "permissions": "edit" }),
            &root,
            &format!("/users/alice/admin-flags?actingAsUserId={}", alice_id),
        ),
    )
    .await;
    assert_eq!(as_alice.status, StatusCode::OK);
    assert_eq!(as_alice.body["user"]["permissions"], "edit");

    let alice_herself = send(&app, flags(json!({ "permissions": null }), &alice, "/users/alice/admin-flags")).await;
    assert_eq!(alice_herself.status, StatusCode::FORBIDDEN);
}

#[rstest]
#[case(255, StatusCode::CREATED)]
#[case(256, StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn post_title_length_on_create(ctx: TestContext, #[case] len: usize, #[case] expected: StatusCode) {
    let app = init(&ctx).await;
    let (_, alice) = register(&app, "alice").await;

    let reply = send(
        &app,
        test::TestRequest::post()
            .uri("/posts/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "title": "t".repeat(len), "content": "body" })),
    )
    .await;
    assert_eq!(reply.status, expected, "{}", reply.body);
}

#[rstest]
#[case(255, StatusCode::OK)]
#[case(256, StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn post_title_length_on_edit(ctx: TestContext, #[case] len: usize, #[case] expected: StatusCode) {
    let app = init(&ctx).await;
    let (_, alice) = register(&app, "alice").await;
    let post_id = create_post(&app, "alice", &alice).await;

    let reply = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/users/alice/posts/{}/edit", post_id))
            .insert_header(bearer(&alice))
            .set_json(json!({ "title": "t".repeat(len) })),
    )
    .await;
    assert_eq!(reply.status, expected, "{}", reply.body);

    let stored = send(&app, test::TestRequest::get().uri(&format!("/posts/{}", post_id))).await;
    let stored_len = stored.body["post"]["title"].as_str().map(str::len);
    if expected == StatusCode::OK {
        assert_eq!(stored_len, Some(len));
    } else {
        assert_eq!(stored_len, Some("Hello".len()));
    }
}

#[rstest]
#[actix_web::test]
async fn profile_picture_url_length(ctx: TestContext) {
    let app = init(&ctx).await;
    let (_, alice) = register(&app, "alice").await;
    let url = |len: usize| {
        let prefix = "https://example.com/";
        format!("{}{}", prefix, "p".repeat(len - prefix.len()))
    };

    let too_long_create = send(
        &app,
        test::TestRequest::post()
            .uri("/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "displayName": "Alice", "profilePictureUrl": url(2084) })),
    )
    .await;
    assert_eq!(too_long_create.status, StatusCode::BAD_REQUEST);

    let at_limit = send(
        &app,
        test::TestRequest::post()
            .uri("/profile/create")
            .insert_header(bearer(&alice))
            .set_json(json!({ "displayName": "Alice", "profilePictureUrl": url(2083) })),
    )
    .await;
    assert_eq!(at_limit.status, StatusCode::CREATED, "{}", at_limit.body);

    let too_long_edit = send(
        &app,
        test::TestRequest::put()
            .uri("/profile/edit")
            .insert_header(bearer(&alice))
            .set_json(json!({ "profilePictureUrl": url(2084) })),
    )
    .await;
    assert_eq!(too_long_edit.status, StatusCode::BAD_REQUEST);

    let profile = send(&app, test::TestRequest::get().uri("/profile").insert_header(bearer(&alice))).await;
    assert_eq!(profile.body["profile"]["profilePictureUrl"].as_str().map(str::len), Some(2083));
}

#[rstest]
#[case("not-an-email".to_string(), StatusCode::BAD_REQUEST)]
#[case("missing-domain@".to_string(), StatusCode::BAD_REQUEST)]
#[case(format!("{}@example.com", "a".repeat(89)), StatusCode::BAD_REQUEST)]
#[case(format!("{}@example.com", "a".repeat(88)), StatusCode::CREATED)]
#[actix_web::test]
async fn registration_email_shapes(ctx: TestContext, #[case] email: String, #[case] expected: StatusCode) {
    let app = init(&ctx).await;

    let reply = send(
        &app,
        test::TestRequest::post().uri("/users/register").set_json(json!({
            "name": "alice", "email": email, "password": PASSWORD,
        })),
    )
    .await;
    assert_eq!(reply.status, expected, "{}", reply.body);
}
