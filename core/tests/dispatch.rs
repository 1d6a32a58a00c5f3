//! End-to-end dispatch scenarios against an in-process `MockTransport`.
//!
//! Each test owns its transport, registers the canned replies it needs and
//! inspects what the transport received.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use netkit_core::{
    Authenticated, Date, DateStrategy, Endpoint, HttpRequest, HttpResponse, HttpStatusCode,
    JsonDecoder, Method, MockTransport, NetworkError, NetworkService, Public, Transport,
    TransportError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

const HOST: &str = "testing.com";

#[derive(Debug, Deserialize, PartialEq)]
struct MockResponse {
    title: String,
    date: Option<Date>,
}

fn service(transport: &Arc<MockTransport>) -> NetworkService {
    NetworkService::new(HOST, Arc::clone(transport))
}

fn url(path: &str) -> String {
    format!("https://{HOST}{path}")
}

/// Run `request` and wait for its completion.
async fn request<T>(service: &NetworkService, endpoint: &Endpoint<Public>) -> Result<T, NetworkError>
where
    T: DeserializeOwned + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    service.request(endpoint, &(), move |result: Result<T, NetworkError>| {
        let _ = tx.send(result);
    });
    rx.await.expect("completion must run")
}

#[tokio::test]
async fn request_get_success() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Get,
        url("/object/response/success"),
        HttpResponse::json(200, &json!({"title": "Mocker"})),
    );

    let endpoint = Endpoint::<Public>::new("/object/response/success");
    let value: MockResponse = request(&service(&transport), &endpoint).await.unwrap();
    assert_eq!(value.title, "Mocker");
    assert_eq!(value.date, None);
}

#[tokio::test]
async fn request_post_success() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Post,
        url("/object/response/success"),
        HttpResponse::json(200, &json!({"title": "Mocker"})),
    );

    let endpoint = Endpoint::<Public>::new("/object/response/success")
        .with_method(Method::Post)
        .with_body_parameter("title", "Mocker");
    let value: MockResponse = request(&service(&transport), &endpoint).await.unwrap();
    assert_eq!(value.title, "Mocker");

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body.as_deref(), Some(&br#"{"title":"Mocker"}"#[..]));
}

#[tokio::test]
async fn not_connected_is_reported() {
    let transport = Arc::new(MockTransport::new());
    transport.fail(
        Method::Get,
        url("/to/failure"),
        TransportError::NotConnected("offline".into()),
    );

    let endpoint = Endpoint::<Public>::new("/to/failure");
    let err = request::<MockResponse>(&service(&transport), &endpoint).await.unwrap_err();
    assert!(matches!(err, NetworkError::NotConnectedToInternet));
}

#[tokio::test]
async fn other_transport_failures_are_generic() {
    let transport = Arc::new(MockTransport::new());
    transport.fail(Method::Get, url("/slow"), TransportError::TimedOut);

    let endpoint = Endpoint::<Public>::new("/slow");
    let err = request::<MockResponse>(&service(&transport), &endpoint).await.unwrap_err();
    assert!(matches!(err, NetworkError::Generic(TransportError::TimedOut)));
}

#[tokio::test]
async fn empty_body_is_empty_data() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/to/dataempty"), HttpResponse::new(200, ""));

    let endpoint = Endpoint::<Public>::new("/to/dataempty");
    let err = request::<MockResponse>(&service(&transport), &endpoint).await.unwrap_err();
    assert!(matches!(err, NetworkError::EmptyData));
}

#[tokio::test]
async fn unauthorized_is_server_side_error() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/to/unauthorized"), HttpResponse::new(401, ""));

    let endpoint = Endpoint::<Public>::new("/to/unauthorized");
    let err = request::<MockResponse>(&service(&transport), &endpoint).await.unwrap_err();
    assert!(matches!(err, NetworkError::ServerSideError(HttpStatusCode::UNAUTHORIZED)));
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/garbage"), HttpResponse::new(200, "<html>"));

    let endpoint = Endpoint::<Public>::new("/garbage");
    let err = request::<MockResponse>(&service(&transport), &endpoint).await.unwrap_err();
    assert!(matches!(err, NetworkError::Parse(Some(_))));
}

#[tokio::test]
async fn invalid_endpoint_fails_before_sending() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/to/unauthorized"), HttpResponse::new(401, ""));

    let endpoint = Endpoint::<Public>::new("unauthorized");
    let (tx, rx) = mpsc::channel();
    let handle = service(&transport).request(&endpoint, &(), move |result: Result<MockResponse, _>| {
        tx.send(result).unwrap();
    });

    assert!(handle.is_none());
    // Delivered synchronously, before `request` returned.
    let result = rx.try_recv().expect("completion already ran");
    assert!(matches!(result, Err(NetworkError::InvalidEndpoint)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn per_call_decoder_applies_date_strategy() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Get,
        url("/object/response/date"),
        HttpResponse::json(200, &json!({"title": "Mocker", "date": "2020-11-05"})),
    );

    let service = service(&transport);
    let endpoint = Endpoint::<Public>::new("/object/response/date");
    let decoder = JsonDecoder::new().with_date_strategy(DateStrategy::formatted("%Y-%m-%d"));

    let (tx, rx) = oneshot::channel();
    service.request_with_decoder(&endpoint, &(), decoder, move |result: Result<MockResponse, _>| {
        let _ = tx.send(result);
    });
    let value = rx.await.unwrap().unwrap();
    assert_eq!(value.date, Date::from_ymd(2020, 11, 5));

    // The service's own decoder still expects RFC 3339.
    let err = request::<MockResponse>(&service, &endpoint).await.unwrap_err();
    assert!(matches!(err, NetworkError::Parse(Some(_))));
}

#[tokio::test]
async fn service_decoder_applies_date_strategy() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Get,
        url("/object/response/date"),
        HttpResponse::json(200, &json!({"title": "Mocker", "date": 1604534400})),
    );

    let service = service(&transport)
        .with_decoder(JsonDecoder::new().with_date_strategy(DateStrategy::SecondsSince1970));
    let endpoint = Endpoint::<Public>::new("/object/response/date");
    let value: MockResponse = service.fetch(&endpoint, &()).await.unwrap();
    assert_eq!(value.date, Date::from_ymd(2020, 11, 5));
}

#[tokio::test]
async fn accept_overrides_the_success_band() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Get,
        url("/legacy"),
        HttpResponse::json(401, &json!({"title": "Mocker"})),
    );
    transport.respond(
        Method::Get,
        url("/created"),
        HttpResponse::json(201, &json!({"title": "Mocker"})),
    );

    let service = service(&transport).accept([200, 401]);
    let legacy: MockResponse = request(&service, &Endpoint::new("/legacy")).await.unwrap();
    assert_eq!(legacy.title, "Mocker");

    let err = request::<MockResponse>(&service, &Endpoint::new("/created")).await.unwrap_err();
    assert!(matches!(err, NetworkError::ServerSideError(HttpStatusCode::CREATED)));
}

#[tokio::test]
async fn repeated_accept_of_success_band_changes_nothing() {
    let transport = Arc::new(MockTransport::new());
    for (path, status) in [("/ok", 200), ("/moved", 301), ("/missing", 404)] {
        transport.respond(Method::Get, url(path), HttpResponse::json(status, &json!({"title": "t"})));
    }

    let default = service(&transport);
    let explicit = service(&transport).accept(200..=299).accept(200..=299);
    for path in ["/ok", "/moved", "/missing"] {
        let endpoint = Endpoint::<Public>::new(path);
        let a = request::<MockResponse>(&default, &endpoint).await;
        let b = request::<MockResponse>(&explicit, &endpoint).await;
        assert_eq!(a.is_ok(), b.is_ok(), "{path}");
        assert_eq!(
            a.err().and_then(|e| e.status_code()),
            b.err().and_then(|e| e.status_code()),
            "{path}"
        );
    }
}

#[tokio::test]
async fn authenticated_endpoint_sends_bearer_token() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Get,
        url("/me?fields=title"),
        HttpResponse::json(200, &json!({"title": "Mocker"})),
    );

    let endpoint = Endpoint::<Authenticated>::new("/me").with_query("fields", "title");
    let value: MockResponse = service(&transport)
        .fetch(&endpoint, &"secret".to_string())
        .await
        .unwrap();
    assert_eq!(value.title, "Mocker");
    assert_eq!(transport.requests()[0].header("Authorization"), Some("Bearer secret"));
}

#[tokio::test]
async fn data_task_delivers_raw_body() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/raw"), HttpResponse::new(200, "plain text"));

    let (tx, rx) = oneshot::channel();
    let handle = service(&transport)
        .data_task(&Endpoint::<Public>::new("/raw"), &(), move |result| {
            let _ = tx.send(result);
        })
        .expect("endpoint is valid");

    let body = rx.await.unwrap().unwrap();
    assert_eq!(&body[..], b"plain text");
    handle.finished().await;
}

#[tokio::test]
async fn cancel_before_response_yields_cancelled() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_secs(30)));
    transport.respond(Method::Get, url("/slow"), HttpResponse::new(200, "{}"));

    let (tx, rx) = oneshot::channel();
    let handle = service(&transport)
        .data_task(&Endpoint::<Public>::new("/slow"), &(), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    handle.cancel();
    assert!(handle.is_cancelled());

    let result = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("cancellation must complete promptly")
        .unwrap();
    assert!(matches!(result, Err(NetworkError::Cancelled)));
}

#[tokio::test]
async fn cancel_after_completion_is_a_no_op() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/fast"), HttpResponse::new(200, "1"));

    let (tx, rx) = oneshot::channel();
    let handle = service(&transport)
        .request(&Endpoint::<Public>::new("/fast"), &(), move |result: Result<u32, _>| {
            let _ = tx.send(result);
        })
        .unwrap();

    assert_eq!(rx.await.unwrap().unwrap(), 1);
    handle.cancel();
    handle.finished().await;
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn dropping_the_handle_keeps_the_call_running() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(50)));
    transport.respond(Method::Get, url("/slow"), HttpResponse::new(200, "7"));

    let (tx, rx) = oneshot::channel();
    let handle = service(&transport)
        .request(&Endpoint::<Public>::new("/slow"), &(), move |result: Result<u32, _>| {
            let _ = tx.send(result);
        })
        .unwrap();
    drop(handle);

    let result = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("call must still complete")
        .unwrap();
    assert_eq!(result.unwrap(), 7);
}

#[tokio::test]
async fn handle_reports_when_the_call_has_finished() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_secs(30)));
    transport.respond(Method::Get, url("/slow"), HttpResponse::new(200, "{}"));

    let (tx, rx) = oneshot::channel();
    let handle = service(&transport)
        .data_task(&Endpoint::<Public>::new("/slow"), &(), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    assert!(!handle.is_finished());

    handle.cancel();
    assert!(matches!(rx.await.unwrap(), Err(NetworkError::Cancelled)));
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("task must finish after delivering");
}

#[tokio::test]
#[should_panic(expected = "completion exploded")]
async fn completion_panic_resurfaces_from_finished() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, url("/fast"), HttpResponse::new(200, "1"));

    let handle = service(&transport)
        .data_task(&Endpoint::<Public>::new("/fast"), &(), |_| panic!("completion exploded"))
        .unwrap();
    handle.finished().await;
}

#[tokio::test]
async fn publisher_emits_exactly_once() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Get,
        url("/object/response/success"),
        HttpResponse::json(200, &json!({"title": "Mocker"})),
    );

    let publisher = service(&transport)
        .publisher::<_, MockResponse>(&Endpoint::<Public>::new("/object/response/success"), &());
    let items: Vec<_> = publisher.collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().title, "Mocker");
}

#[tokio::test]
async fn publisher_reports_invalid_endpoint() {
    let transport = Arc::new(MockTransport::new());
    let mut publisher =
        service(&transport).publisher::<_, MockResponse>(&Endpoint::<Public>::new("relative"), &());

    assert!(matches!(publisher.next().await, Some(Err(NetworkError::InvalidEndpoint))));
    assert!(publisher.next().await.is_none());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn publisher_cancel_yields_cancelled() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_secs(30)));
    transport.respond(Method::Get, url("/slow"), HttpResponse::new(200, "{}"));

    let mut publisher =
        service(&transport).publisher::<_, serde_json::Value>(&Endpoint::<Public>::new("/slow"), &());
    publisher.cancel();
    let item = tokio::time::timeout(Duration::from_secs(5), publisher.next())
        .await
        .expect("cancellation must complete promptly");
    assert!(matches!(item, Some(Err(NetworkError::Cancelled))));
}

/// Fires `dropped` when the in-flight send future is dropped.
struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// Transport that never answers and reports when its send starts and stops.
struct StalledTransport {
    started: Mutex<Option<oneshot::Sender<()>>>,
    dropped: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let _signal = DropSignal(self.dropped.lock().unwrap().take());
        if let Some(tx) = self.started.lock().unwrap().take() {
            let _ = tx.send(());
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(HttpResponse::new(200, "{}"))
    }
}

#[tokio::test]
async fn dropping_the_publisher_cancels_the_call() {
    let (started_tx, started_rx) = oneshot::channel();
    let (dropped_tx, dropped_rx) = oneshot::channel();
    let transport = StalledTransport {
        started: Mutex::new(Some(started_tx)),
        dropped: Mutex::new(Some(dropped_tx)),
    };
    let service = NetworkService::new(HOST, transport);

    let publisher =
        service.publisher::<_, serde_json::Value>(&Endpoint::<Public>::new("/slow"), &());
    started_rx.await.unwrap();
    drop(publisher);

    tokio::time::timeout(Duration::from_secs(5), dropped_rx)
        .await
        .expect("in-flight send must be abandoned")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_are_independent() {
    let transport = Arc::new(MockTransport::new());
    for i in 0..16 {
        transport.respond(
            Method::Get,
            url(&format!("/items/{i}")),
            HttpResponse::json(200, &json!({"title": format!("item {i}")})),
        );
    }
    let service = Arc::new(service(&transport));

    let calls = (0..16).map(|i| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let endpoint = Endpoint::<Public>::new(format!("/items/{i}"));
            let value: MockResponse = service.fetch(&endpoint, &()).await.unwrap();
            (i, value.title)
        })
    });

    for call in calls.collect::<Vec<_>>() {
        let (i, title) = call.await.unwrap();
        assert_eq!(title, format!("item {i}"));
    }
    assert_eq!(transport.request_count(), 16);
}
