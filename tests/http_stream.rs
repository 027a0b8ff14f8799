use freqwatch::{
    AnomalyDetector, DetectionConfig, Pipeline, SampleSource,
    server::{self, ServerConfig},
    source::{HttpConnector, HttpStreamSource},
    store::MemoryStore,
    supervisor::{ReconnectPolicy, Supervisor},
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_server(limit: u64) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(ServerConfig {
        interval: Duration::from_millis(1),
        limit: Some(limit),
        seed: Some(7),
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_stream_delivers_one_session() {
    let addr = spawn_server(25).await;
    let mut source = HttpStreamSource::connect(&addr.to_string(), Duration::from_secs(5))
        .await
        .unwrap();

    let mut messages = Vec::new();
    while let Some(msg) = source.next_message().await.unwrap() {
        messages.push(msg);
    }

    assert_eq!(messages.len(), 25);
    let session = &messages[0].session_id;
    assert!(!session.is_empty());
    assert!(messages.iter().all(|m| &m.session_id == session));
    assert!(messages.iter().all(|m| m.frequency.is_finite()));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = HttpStreamSource::connect(&addr.to_string(), Duration::from_secs(2)).await;
    assert!(matches!(
        result,
        Err(freqwatch::error::SourceError::Connect(_))
    ));
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let addr = spawn_server(40).await;
    let supervisor = Supervisor::new(
        HttpConnector::new(format!("http://{addr}"), Duration::from_secs(5)),
        ReconnectPolicy::default(),
    );
    let mut pipeline = Pipeline::new(
        AnomalyDetector::new(DetectionConfig::default()).unwrap(),
        MemoryStore::new(),
    );

    let stats = supervisor.run(&mut pipeline).await.unwrap();
    assert_eq!(stats.received, 40);
    assert_eq!(stats.classified, 40);
    assert_eq!(stats.persisted as usize, pipeline.store().len());
    assert!(pipeline.detector().moments().std_dev > 0.0);
}
