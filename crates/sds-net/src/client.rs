//! ---
//! sds_section: "04-networking"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Network adapters for the collaborator backend."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use sds_common::BackendConfig;
use sds_core::{BaselinePayload, DeltaPayload, StopPayload, TelemetryDispatch};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Endpoint receiving the first point of a running session and the pause notice.
pub const GPS_POINT_PATH: &str = "/gpspoint";
/// Endpoint receiving direction/mode updates.
pub const DIRECTION_PATH: &str = "/direction";
/// Endpoint deleting a recorded day.
pub const REMOVE_DAY_PATH: &str = "/rmdata";

/// Failures raised while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    Build(#[source] reqwest::Error),
    /// Base URL or endpoint path did not form a valid URL.
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    /// The request never produced a response.
    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with a non-2xx status.
    #[error("{endpoint} responded with {status}")]
    Status { endpoint: String, status: StatusCode },
}

/// Body of `POST /rmdata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDayRequest {
    pub date: String,
}

impl RemoveDayRequest {
    pub fn new(date: &NaiveDate) -> Self {
        Self {
            date: sds_common::time::calendar_day(date),
        }
    }
}

/// Stateless [`TelemetryDispatch`] implementation backed by `reqwest`.
///
/// The public operations never fail: delivery problems are logged at `warn`
/// and dropped. Use [`DispatchClient::post_json`] to observe them.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    client: Client,
    base: Url,
}

impl DispatchClient {
    pub fn new(config: &BackendConfig) -> Result<Self, DispatchError> {
        let mut base = Url::parse(&config.base_url)?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(DispatchError::Build)?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL of an endpoint path such as [`GPS_POINT_PATH`].
    pub fn endpoint(&self, path: &str) -> Result<Url, DispatchError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// POST `body` as JSON to `path`; any non-2xx answer is an error.
    pub async fn post_json<T>(&self, path: &str, body: &T) -> Result<(), DispatchError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                endpoint: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                endpoint: url.to_string(),
                status,
            });
        }
        debug!(endpoint = %url, %status, "telemetry delivered");
        Ok(())
    }

    async fn post_or_log<T>(&self, path: &str, body: &T)
    where
        T: Serialize + ?Sized,
    {
        if let Err(err) = self.post_json(path, body).await {
            warn!(path, error = %err, source = ?std::error::Error::source(&err), "telemetry dispatch failed");
        }
    }
}

#[async_trait]
impl TelemetryDispatch for DispatchClient {
    async fn send_baseline(&self, payload: BaselinePayload) {
        self.post_or_log(GPS_POINT_PATH, &payload).await;
    }

    async fn send_delta(&self, payload: DeltaPayload) {
        self.post_or_log(DIRECTION_PATH, &payload).await;
    }

    async fn send_stop(&self, payload: StopPayload) {
        self.post_or_log(GPS_POINT_PATH, &payload).await;
    }

    async fn remove_day(&self, date: NaiveDate) {
        self.post_or_log(REMOVE_DAY_PATH, &RemoveDayRequest::new(&date))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::Uri;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use sds_core::{PathPattern, TelemetryPoint};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    #[derive(Clone)]
    struct Backend {
        captured: Captured,
        status: StatusCode,
    }

    async fn record(
        State(backend): State<Backend>,
        uri: Uri,
        Json(body): Json<Value>,
    ) -> StatusCode {
        backend.captured.lock().push((uri.path().to_owned(), body));
        backend.status
    }

    async fn spawn_backend(status: StatusCode) -> (SocketAddr, Captured) {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(GPS_POINT_PATH, post(record))
            .route(DIRECTION_PATH, post(record))
            .route(REMOVE_DAY_PATH, post(record))
            .with_state(Backend {
                captured: Arc::clone(&captured),
                status,
            });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (addr, captured)
    }

    fn client_for(base_url: String) -> DispatchClient {
        DispatchClient::new(&BackendConfig {
            base_url,
            request_timeout: Duration::from_secs(2),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn operations_post_to_backend_contract() {
        let (addr, captured) = spawn_backend(StatusCode::OK).await;
        let client = client_for(format!("http://{addr}"));

        let point = TelemetryPoint {
            latitude: 45.5,
            longitude: -122.6,
            direction: 90.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            mode: PathPattern::LateralZigzag,
        };
        client
            .send_baseline(BaselinePayload::from_point(&point))
            .await;
        client
            .send_delta(DeltaPayload::new(
                135.0,
                Some(PathPattern::VerticalZigzag),
                true,
            ))
            .await;
        client.send_stop(StopPayload::new(135.0)).await;
        client
            .remove_day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
            .await;

        let captured = captured.lock().clone();
        assert_eq!(
            captured,
            vec![
                (
                    "/gpspoint".to_owned(),
                    json!({
                        "lat": 45.5,
                        "lon": -122.6,
                        "datetime": "2024-05-01T08:30:00.000Z",
                        "direct": 0,
                        "direction": 90.0,
                        "mode": 1,
                        "isStart": true
                    })
                ),
                (
                    "/direction".to_owned(),
                    json!({ "direct": 0, "direction": 135.0, "mode": 2, "isStart": true })
                ),
                (
                    "/gpspoint".to_owned(),
                    json!({ "direct": 0, "direction": 135.0, "isStart": false })
                ),
                ("/rmdata".to_owned(), json!({ "date": "2024-05-01" })),
            ]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_reported_and_swallowed() {
        let (addr, captured) = spawn_backend(StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = client_for(format!("http://{addr}"));

        let err = client
            .post_json(GPS_POINT_PATH, &StopPayload::new(10.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));

        client.send_stop(StopPayload::new(10.0)).await;
        assert_eq!(captured.lock().len(), 2);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(format!("http://{addr}"));

        let err = client
            .post_json(GPS_POINT_PATH, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport { .. }));

        client
            .remove_day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await;
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let client = client_for("http://127.0.0.1:9000/api".to_owned());
        assert_eq!(
            client.endpoint(GPS_POINT_PATH).unwrap().as_str(),
            "http://127.0.0.1:9000/api/gpspoint"
        );
        let root = client_for("http://127.0.0.1:9000".to_owned());
        assert_eq!(
            root.endpoint(REMOVE_DAY_PATH).unwrap().as_str(),
            "http://127.0.0.1:9000/rmdata"
        );
        assert!(matches!(
            DispatchClient::new(&BackendConfig {
                base_url: "not a url".into(),
                ..BackendConfig::default()
            }),
            Err(DispatchError::Url(_))
        ));
    }
}
