use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::binding::ViewState;
use crate::fact::FactId;
use crate::server::AppState;
use crate::storage::{Commit, DbStats};
use crate::Error;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::InvalidFactId(_) => StatusCode::BAD_REQUEST,
        Error::DuplicateFact(_) => StatusCode::CONFLICT,
        Error::Http(_) | Error::Status(_) | Error::Decode(_) => StatusCode::BAD_GATEWAY,
        Error::StoreClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

pub async fn list_facts(State(state): State<Arc<AppState>>) -> Json<ViewState> {
    Json(state.view_model.state())
}

pub async fn fetch_facts(State(state): State<Arc<AppState>>) -> Result<Json<Commit>, ApiError> {
    state.view_model.fetch_facts().await.map(Json).map_err(api_error)
}

pub async fn delete_all(State(state): State<Arc<AppState>>) -> Result<Json<Commit>, ApiError> {
    state.view_model.delete_facts().await.map(Json).map_err(api_error)
}

pub async fn delete_fact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Commit>, ApiError> {
    let id: FactId = id.parse().map_err(api_error)?;
    state.view_model.store().delete_one(id).await.map(Json).map_err(api_error)
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DbStats>, ApiError> {
    state.view_model.store().stats().await.map(Json).map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::{endpoint_with, spawn_server};
    use crate::fetch::{FetchClient, FetchConfig};
    use crate::server::router;
    use crate::{Fact, FactsViewModel, Status, Store};
    use std::time::Duration;

    async fn app_with_remote(status: StatusCode, body: &'static str) -> (String, Arc<Store>) {
        let endpoint = endpoint_with(status, body).await;
        let client = FetchClient::new(FetchConfig {
            endpoint,
            count: 25,
            timeout_secs: Some(5),
        })
        .unwrap();

        let store = Arc::new(Store::open_in_memory().unwrap());
        let view_model = FactsViewModel::new(store.clone(), Arc::new(client)).unwrap();
        let addr = spawn_server(router(Arc::new(AppState { view_model }))).await;
        (format!("http://{}", addr), store)
    }

    async fn view(base: &str) -> ViewState {
        reqwest::get(format!("{}/facts", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn view_at_revision(base: &str, revision: u64) -> ViewState {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let state = view(base).await;
                if state.revision >= revision {
                    return state;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("view never reached revision")
    }

    #[tokio::test]
    async fn test_fetch_then_list_then_clear() {
        let (base, _store) =
            app_with_remote(StatusCode::OK, r#"[{"fact":"Dogs have wet noses"}]"#).await;
        let http = reqwest::Client::new();

        let resp = http.post(format!("{}/facts/fetch", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let state = view_at_revision(&base, 1).await;
        assert_eq!(state.facts.len(), 1);
        assert_eq!(state.facts[0].text, "Dogs have wet noses");
        assert_eq!(state.status, Status::Idle);

        let resp = http.delete(format!("{}/facts", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let state = view_at_revision(&base, 2).await;
        assert!(state.facts.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_reported() {
        let (base, _store) = app_with_remote(StatusCode::INTERNAL_SERVER_ERROR, "").await;

        let resp = reqwest::Client::new()
            .post(format!("{}/facts/fetch", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let state = view(&base).await;
        assert!(matches!(state.status, Status::Error(_)));
        assert!(state.facts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_single_fact() {
        let (base, store) = app_with_remote(StatusCode::OK, "[]").await;
        let keep = Fact::new("keep");
        let drop_me = Fact::new("drop");
        store.append(vec![keep.clone(), drop_me.clone()]).await.unwrap();

        let http = reqwest::Client::new();
        let resp = http
            .delete(format!("{}/facts/{}", base, drop_me.id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = http.delete(format!("{}/facts/not-an-id", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let state = view_at_revision(&base, 2).await;
        assert_eq!(state.facts, vec![keep]);
    }

    #[tokio::test]
    async fn test_stats() {
        let (base, store) = app_with_remote(StatusCode::OK, "[]").await;
        store.append(vec![Fact::new("a"), Fact::new("b")]).await.unwrap();

        let stats: serde_json::Value = reqwest::get(format!("{}/stats", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["facts"], 2);
    }
}
