use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use boss_tracker::app::{AppState, router};
use boss_tracker::config::TrackerConfig;
use boss_tracker::loader::load_tracker_data;
use boss_tracker::saving::to_xlsx;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const REFERENCE_CSV: &str = "\
周本名称,材料名称
风魔龙·特瓦林,东风之翎
风魔龙·特瓦林,东风之爪
风魔龙·特瓦林,东风的吐息
「狼王」安德留斯,北风之尾
「狼王」安德留斯,北风之环
「狼王」安德留斯,北风的魂匣
若陀龙王,磐石之心
若陀龙王,磐石之鳞
若陀龙王,磐石之角
";

const COUNTS_CSV: &str = "\
怪物,WindDragon,NorthWolf,RockKing
材料1,2,5,4
材料2,1,5,4
材料3,0,5,4
总计,3,15,12
";

fn app_with_files() -> (TempDir, TrackerConfig, Router) {
    let dir = TempDir::new().unwrap();
    let config = TrackerConfig::default().with_files(dir.path().join("原神.csv"), dir.path().join("1.csv"));
    fs::write(&config.data_file, COUNTS_CSV).unwrap();
    fs::write(&config.meta_file, REFERENCE_CSV).unwrap();
    let app = router(Arc::new(AppState::new(config.clone()).unwrap()));
    (dir, config, app)
}

// Same tables, but the counts live in an `.xlsm` workbook, which loads and
// never saves.
fn app_with_read_only_counts() -> (TempDir, TrackerConfig, Router) {
    let (dir, csv_config, _) = app_with_files();
    let counts = load_tracker_data(&csv_config).unwrap().counts;
    let config = csv_config
        .clone()
        .with_files(dir.path().join("原神.xlsm"), &csv_config.meta_file);
    fs::write(&config.data_file, to_xlsx(&counts).unwrap()).unwrap();
    let app = router(Arc::new(AppState::new(config.clone()).unwrap()));
    (dir, config, app)
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn first_visit_renders_page_and_sets_session() {
    let (_dir, _config, app) = app_with_files();

    let response = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert!(session_cookie(&response).starts_with("session="));

    let html = body_text(response).await;
    assert!(html.contains("本周进度: 0/3"));
    assert!(html.contains("第 1 名: WindDragon"));
    assert!(html.contains("东风之翎"));
}

#[tokio::test]
async fn missing_files_render_only_the_error() {
    let dir = TempDir::new().unwrap();
    let app = router(Arc::new(AppState::new(TrackerConfig::in_dir(dir.path())).unwrap()));

    let response = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let html = body_text(response).await;
    assert!(html.contains("找不到文件"));
    assert!(!html.contains("<form"));
}

#[tokio::test]
async fn loot_submission_updates_file_and_progress() {
    let (_dir, config, app) = app_with_files();
    let first = app.clone().oneshot(get("/", None)).await.unwrap();
    let cookie = session_cookie(&first);

    let response = app
        .clone()
        .oneshot(post_form("/loot", &cookie, "boss=WindDragon&q0=1&q1=1&q2=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let data = load_tracker_data(&config).unwrap();
    assert_eq!(data.counts.materials(0), [3, 2, 1]);
    assert_eq!(data.counts.stored_total(0), Some(6));

    let html = body_text(app.oneshot(get("/", Some(&cookie))).await.unwrap()).await;
    assert!(html.contains("本周进度: 1/3"));
    assert!(html.contains("数据保存成功"));
    // Logged boss is no longer recommended.
    assert!(!html.contains("名: WindDragon"));
}

#[tokio::test]
async fn zero_loot_is_rejected_with_warning() {
    let (_dir, config, app) = app_with_files();
    let cookie = "session=zero-loot";
    let before = fs::read_to_string(&config.data_file).unwrap();

    app.clone()
        .oneshot(post_form("/loot", cookie, "boss=NorthWolf&q0=0&q1=0&q2=0"))
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(&config.data_file).unwrap(), before);
    let html = body_text(app.oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains("请输入获得的材料数量"));
    assert!(html.contains("本周进度: 0/3"));
}

#[tokio::test]
async fn progress_is_per_session() {
    let (_dir, _config, app) = app_with_files();

    app.clone()
        .oneshot(post_form("/loot", "session=alice", "boss=NorthWolf&q0=1"))
        .await
        .unwrap();

    let alice = body_text(app.clone().oneshot(get("/", Some("session=alice"))).await.unwrap()).await;
    let bob = body_text(app.oneshot(get("/", Some("session=bob"))).await.unwrap()).await;
    assert!(alice.contains("本周进度: 1/3"));
    assert!(bob.contains("本周进度: 0/3"));
}

#[tokio::test]
async fn inventory_edit_is_saved_without_submit_step() {
    let (_dir, config, app) = app_with_files();
    let cookie = "session=editor";

    let response = app
        .clone()
        .oneshot(post_form(
            "/inventory",
            cookie,
            "slot_0_0=2&slot_0_1=1&slot_0_2=0&slot_1_0=2&slot_1_1=5&slot_1_2=5",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let data = load_tracker_data(&config).unwrap();
    assert_eq!(data.counts.materials(1), [2, 5, 5]);
    assert_eq!(data.counts.stored_total(1), Some(12));
    assert_eq!(data.counts.stored_total(0), Some(3));

    let html = body_text(app.oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains("✅ 已更新 NorthWolf - 北风之尾 为 2"));
}

#[tokio::test]
async fn cleared_inventory_field_keeps_stored_count() {
    let (_dir, config, app) = app_with_files();
    let cookie = "session=clearer";
    let before = fs::read_to_string(&config.data_file).unwrap();

    let response = app
        .clone()
        .oneshot(post_form("/inventory", cookie, "slot_1_0=&slot_1_1=5&slot_1_2=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    assert_eq!(fs::read_to_string(&config.data_file).unwrap(), before);
    let data = load_tracker_data(&config).unwrap();
    assert_eq!(data.counts.materials(1), [5, 5, 5]);
    assert_eq!(data.counts.stored_total(1), Some(15));

    let html = body_text(app.oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(!html.contains("已更新"));
}

#[tokio::test]
async fn failed_save_shows_error_and_still_counts_the_boss() {
    let (_dir, config, app) = app_with_read_only_counts();
    let cookie = "session=unlucky";
    let before = fs::read(&config.data_file).unwrap();

    app.clone()
        .oneshot(post_form("/loot", cookie, "boss=NorthWolf&q0=1"))
        .await
        .unwrap();

    assert_eq!(fs::read(&config.data_file).unwrap(), before);
    let html = body_text(app.oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains(r#"class="notice error""#));
    assert!(html.contains("保存文件失败"));
    assert!(!html.contains("数据保存成功"));
    assert!(html.contains("本周进度: 1/3"));
}

#[tokio::test]
async fn reset_needs_a_complete_week() {
    let (_dir, config, app) = app_with_files();
    let cookie = "session=resetter";

    app.clone().oneshot(post_form("/reset", cookie, "")).await.unwrap();
    let html = body_text(app.clone().oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains("无需重置"));

    // Logging the same boss twice only counts once.
    for body in ["boss=WindDragon&q0=1", "boss=WindDragon&q1=1", "boss=NorthWolf&q2=1"] {
        app.clone().oneshot(post_form("/loot", cookie, body)).await.unwrap();
    }
    let html = body_text(app.clone().oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains("本周进度: 2/3"));
    assert!(!html.contains(r#"action="/reset""#));

    app.clone()
        .oneshot(post_form("/loot", cookie, "boss=RockKing&q0=1"))
        .await
        .unwrap();
    let html = body_text(app.clone().oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains("本周进度: 3/3"));
    assert!(html.contains("本周三个周本任务已完成"));
    assert!(html.contains(r#"action="/reset""#));
    // Nothing left to recommend, so the loot form falls back to the first column.
    assert!(html.contains(
        r#"<option value="WindDragon" data-full="风魔龙·特瓦林" data-materials="东风之翎|东风之爪|东风的吐息" data-done="true" selected>"#
    ));

    let before = fs::read_to_string(&config.data_file).unwrap();
    let response = app.clone().oneshot(post_form("/reset", cookie, "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(fs::read_to_string(&config.data_file).unwrap(), before);

    let html = body_text(app.oneshot(get("/", Some(cookie))).await.unwrap()).await;
    assert!(html.contains("新的一周开始了"));
    assert!(html.contains("本周进度: 0/3"));
    assert!(!html.contains("本周三个周本任务已完成"));
}

#[tokio::test]
async fn summary_reports_recommendations_as_json() {
    let (_dir, _config, app) = app_with_files();

    let response = app.oneshot(get("/api/summary", Some("session=api"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();

    assert_eq!(body["recommendations"][0]["boss"], "WindDragon");
    assert_eq!(body["recommendations"][0]["total"], 3);
    assert_eq!(body["bosses"][1]["full_name"], "「狼王」安德留斯");
    assert_eq!(body["progress"]["state"]["state"], "in_progress");
}
