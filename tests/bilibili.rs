use serde_json::json;
use std::time::Duration;
use videonote::bilibili::Bilibili;
use videonote::App;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BVID: &str = "BV1GJ411x7h7";
const STREAM: &str = "https://upos-sz-mirror.bilivideo.com/ugc/111.mp4?deadline=1700000000";

fn page_url(page: u32) -> String {
    format!("https://www.bilibili.com/video/{BVID}?p={page}")
}

async fn mount_view(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", BVID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "0",
            "data": {
                "cid": 111,
                "pages": [{ "cid": 111, "page": 1 }, { "cid": 222, "page": 2 }]
            }
        })))
        .mount(server)
        .await;
}

async fn mount_playurl(server: &MockServer, cid: &str, durl: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .and(query_param("cid", cid))
        .and(query_param("platform", "html5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "quality": 80, "durl": durl }
        })))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> Bilibili {
    Bilibili::new(Some(Duration::from_secs(5)))
        .unwrap()
        .with_api_base(server.uri())
}

#[tokio::test]
async fn resolves_stream_and_subtitles_of_the_requested_page() {
    let server = MockServer::start().await;
    mount_view(&server).await;
    mount_playurl(&server, "222", json!([{ "url": STREAM }])).await;
    Mock::given(path("/x/player/v2"))
        .and(query_param("cid", "222"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "subtitle": { "subtitles": [{
                "lan": "zh-CN",
                "lan_doc": "中文（中国）",
                "subtitle_url": format!("{}/bfs/subtitle/zh.json", server.uri())
            }] } }
        })))
        .mount(&server)
        .await;
    Mock::given(path("/bfs/subtitle/zh.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": [{ "from": 1.0, "to": 2.5, "content": "你好" }]
        })))
        .mount(&server)
        .await;

    let stream = client(&server).resolve(&page_url(2)).await.unwrap();

    assert_eq!(stream.stream_url, STREAM);
    assert_eq!(stream.subtitles.len(), 1);
    let track = &stream.subtitles[0];
    assert_eq!(track.label, "中文（中国）");
    assert_eq!(track.kind, "subtitles");
    assert!(track.src_url.starts_with("data:text/vtt;charset=utf-8,"));
    let vtt = urlencoding::decode(track.src_url.split_once(',').unwrap().1).unwrap();
    assert!(vtt.starts_with("WEBVTT"));
    assert!(vtt.contains("00:00:01.000 --> 00:00:02.500"));
    assert!(vtt.contains("你好"));
}

#[tokio::test]
async fn missing_subtitles_do_not_fail_resolution() {
    let server = MockServer::start().await;
    mount_view(&server).await;
    mount_playurl(&server, "111", json!([{ "url": STREAM }])).await;
    Mock::given(path("/x/player/v2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let stream = client(&server).resolve(&page_url(1)).await.unwrap();

    assert_eq!(stream.stream_url, STREAM);
    assert!(stream.subtitles.is_empty());
}

#[tokio::test]
async fn api_error_code_is_a_resolution_error() {
    let server = MockServer::start().await;
    Mock::given(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -404,
            "message": "啥都木有",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client(&server).resolve(&page_url(1)).await.unwrap_err();

    assert!(matches!(err, App::Resolution(ref m) if m.contains("-404")), "{err}");
}

#[tokio::test]
async fn http_failure_is_a_resolution_error() {
    let server = MockServer::start().await;
    Mock::given(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).resolve(&page_url(1)).await.unwrap_err();

    assert!(matches!(err, App::Resolution(_)), "{err}");
}

#[tokio::test]
async fn no_stream_is_a_resolution_error() {
    let server = MockServer::start().await;
    mount_view(&server).await;
    mount_playurl(&server, "111", json!([])).await;

    let err = client(&server).resolve(&page_url(1)).await.unwrap_err();

    assert!(matches!(err, App::Resolution(_)), "{err}");
}

#[tokio::test]
async fn unreadable_payload_is_a_resolution_error() {
    let server = MockServer::start().await;
    Mock::given(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .mount(&server)
        .await;

    let err = client(&server).resolve(&page_url(1)).await.unwrap_err();

    assert!(matches!(err, App::Resolution(_)), "{err}");
}

#[tokio::test]
async fn slow_api_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/x/web-interface/view"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 0, "data": { "cid": 1 } }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let bilibili = Bilibili::new(Some(Duration::from_millis(50)))
        .unwrap()
        .with_api_base(server.uri());

    let err = bilibili.resolve(&page_url(1)).await.unwrap_err();

    assert!(matches!(err, App::Timeout(_)), "{err}");
}

#[tokio::test]
async fn short_link_is_followed_to_its_page() {
    let server = MockServer::start().await;
    mount_view(&server).await;
    mount_playurl(&server, "222", json!([{ "url": STREAM }])).await;
    Mock::given(path("/x/player/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": {} })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/aB3xYz"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "Location",
            format!("{}/video/{BVID}?p=2&share_source=copy", server.uri()).as_str(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/video/{BVID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let stream = client(&server)
        .resolve(&format!("{}/aB3xYz", server.uri()))
        .await
        .unwrap();

    assert_eq!(stream.stream_url, STREAM);
}

#[tokio::test]
async fn short_link_without_video_is_a_resolution_error() {
    let server = MockServer::start().await;
    Mock::given(path("/aB3xYz"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/landing", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .resolve(&format!("{}/aB3xYz", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, App::Resolution(ref m) if m.contains("No bilibili video id")), "{err}");
}
