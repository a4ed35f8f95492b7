use intelligence::{
    clients::{AlertSource, AlertmanagerClient, AnnotationSink, DashboardSource, GrafanaClient, SilenceSource},
    config::Config,
    models::{dashboard_id, AnnotationPayload},
    Error,
};
use mockito::{Matcher, Server};
use serde_json::json;

fn config(alertmanager_url: &str, grafana_url: &str) -> Config {
    serde_json::from_value(json!({
        "server": { "httpTimeout": 2 },
        "alerts": {
            "serviceLabel": "service",
            "uniqueLabel": "alertname",
            "alertmanagerUrl": alertmanager_url
        },
        "annotation": {
            "url": grafana_url,
            "annotationApi": "/api/annotations",
            "dashboardSearchApi": "/api/search",
            "token": "secret-token",
            "tags": ["cmsweb", "intelligence"]
        },
        "services": []
    }))
    .unwrap()
}

#[tokio::test]
async fn test_list_silences() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/silences")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "success",
                "data": [{
                    "id": "0f1c",
                    "status": { "state": "active" },
                    "matchers": [{ "name": "alertname", "value": "ggus-1", "isRegex": false }],
                    "startsAt": "2020-07-01T11:00:00Z",
                    "endsAt": "2020-07-01T13:00:00Z",
                    "createdBy": "ops",
                    "comment": "GGUS maintenance"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AlertmanagerClient::new(&config(&server.url(), "http://localhost:3000")).unwrap();
    let silences = client.list_silences().await.unwrap();

    mock.assert_async().await;
    assert_eq!(silences.data.len(), 1);
    assert_eq!(silences.data[0].id, "0f1c");
    assert_eq!(silences.data[0].matchers[0].name, "alertname");
}

#[tokio::test]
async fn test_list_silences_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/silences")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let client = AlertmanagerClient::new(&config(&server.url(), "http://localhost:3000")).unwrap();
    match client.list_silences().await {
        Err(Error::Upstream { status, body, .. }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "unavailable");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_alerts() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/alerts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "success",
                "data": [{
                    "labels": { "service": "GGUS", "alertname": "ggus-1" },
                    "annotations": { "shortDescription": "Ticket closed" },
                    "startsAt": "2020-07-01T11:04:01Z",
                    "endsAt": "0001-01-01T00:00:00Z",
                    "generatorURL": ""
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AlertmanagerClient::new(&config(&server.url(), "http://localhost:3000")).unwrap();
    let alerts = client.list_alerts().await.unwrap();

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].label("alertname"), Some("ggus-1"));
    assert_eq!(alerts[0].ends_at_millis(), 0);
}

#[tokio::test]
async fn test_find_dashboards_by_tag() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/search")
        .match_header("authorization", "Bearer secret-token")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("tag".into(), "cmsweb".into()),
            Matcher::UrlEncoded("tag".into(), "intelligence".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{ "id": 17, "title": "CMS" }, { "uid": "no-id" }]).to_string())
        .create_async()
        .await;

    let client = GrafanaClient::new(&config("http://localhost:9093", &server.url())).unwrap();
    let dashboards = client.find_dashboards().await.unwrap();

    mock.assert_async().await;
    let ids: Vec<i64> = dashboards.iter().map(dashboard_id).collect();
    assert_eq!(ids, vec![17, 0]);
}

#[tokio::test]
async fn test_dispatch_posts_annotation() {
    let mut server = Server::new_async().await;
    let payload = AnnotationPayload {
        dashboard_id: 17,
        time: 1_593_601_441_000,
        time_end: 0,
        tags: vec!["cmsweb".to_string()],
        text: "Ticket closed".to_string(),
    };
    let mock = server
        .mock("POST", "/api/annotations")
        .match_header("authorization", "Bearer secret-token")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "dashboardId": 17,
            "time": 1_593_601_441_000i64,
            "timeEnd": 0,
            "tags": ["cmsweb"],
            "text": "Ticket closed"
        })))
        .with_status(200)
        .with_body(r#"{"message":"Annotation added","id":1}"#)
        .expect(1)
        .create_async()
        .await;

    let client = GrafanaClient::new(&config("http://localhost:9093", &server.url())).unwrap();
    client.dispatch(serde_json::to_vec(&payload).unwrap()).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn test_dispatch_swallows_failures() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/annotations")
        .with_status(500)
        .with_body("boom")
        .expect(2)
        .create_async()
        .await;

    let client = GrafanaClient::new(&config("http://localhost:9093", &server.url())).unwrap();
    client.dispatch(b"{}".to_vec()).await;
    assert!(matches!(
        client.post_annotation(b"{}".to_vec()).await,
        Err(Error::Upstream { status: 500, .. })
    ));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_dispatch_to_unreachable_host_does_not_panic() {
    // Port 9 (discard) is expected to refuse connections.
    let client = GrafanaClient::new(&config("http://localhost:9093", "http://127.0.0.1:9")).unwrap();
    client.dispatch(b"{}".to_vec()).await;
}

#[tokio::test]
async fn test_list_silences_uses_configured_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/alertmanager/api/v1/silences")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "status": "success", "data": [] }).to_string())
        .create_async()
        .await;

    let mut config = config(&server.url(), "http://localhost:3000");
    config.alerts.silences_api = "/alertmanager/api/v1/silences".to_string();
    let client = AlertmanagerClient::new(&config).unwrap();
    let silences = client.list_silences().await.unwrap();

    mock.assert_async().await;
    assert!(silences.data.is_empty());
}
