use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use taskflow_shared::{
    AccessToken, ErrorDetail, LoginForm, SignupRequest, TaskCreate, TaskDto, TaskPatch,
    UserProfile,
};
use tracing::{debug, instrument, warn};
use url::Url;

use super::TodoApi;
use crate::error::{ApiError, ApiResult};
use crate::session::SessionContext;
use crate::task::{Task, TaskId};

pub const DEFAULT_USER_AGENT: &str = concat!("taskflow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-backed client for the todo API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http_client: HttpClient,
    base_url: Url,
    session: SessionContext,
}

impl RestClient {
    pub fn new(base_url: Url, session: SessionContext, options: &ClientOptions) -> ApiResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: with_trailing_slash(base_url),
            session,
        })
    }

    pub fn from_url(base_url: &str, session: SessionContext) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)?;
        Self::new(base_url, session, &ClientOptions::default())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /auth/login`; the form uses OAuth2 password-flow field names.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AccessToken> {
        let form = LoginForm {
            username: email.to_string(),
            password: password.to_string(),
        };
        let url = self.endpoint("auth/login")?;
        let response = self.dispatch(self.http_client.post(url).form(&form)).await?;
        decode(response).await
    }

    /// `POST /auth/signup`
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: &SignupRequest) -> ApiResult<UserProfile> {
        let url = self.endpoint("auth/signup")?;
        let response = self.dispatch(self.http_client.post(url).json(request)).await?;
        decode(response).await
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn authed<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<Response> {
        let token = self.session.token().ok_or(ApiError::MissingCredential)?;
        let url = self.endpoint(path)?;

        let mut request = self.http_client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "api response");

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("api rejected credential");
            return Err(ApiError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ErrorDetail>(&text) {
            Ok(body) => match body.detail {
                serde_json::Value::String(message) => message,
                other => other.to_string(),
            },
            Err(_) if text.is_empty() => status.canonical_reason().unwrap_or("").to_string(),
            Err(_) => text,
        };
        Err(ApiError::Status { status, detail })
    }
}

#[async_trait]
impl TodoApi for RestClient {
    #[instrument(skip(self))]
    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        let response = self.authed(Method::GET, "api/todos", None::<&()>).await?;
        let dtos: Vec<TaskDto> = decode(response).await?;
        debug!(count = dtos.len(), "listed tasks");
        dtos.into_iter().map(Task::from_dto).collect()
    }

    #[instrument(skip(self, payload), fields(title_len = payload.title.len()))]
    async fn create_task(&self, payload: &TaskCreate) -> ApiResult<Task> {
        let response = self.authed(Method::POST, "api/todos", Some(payload)).await?;
        Task::from_dto(decode(response).await?)
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<Task> {
        let path = format!("api/todos/{id}");
        let response = self.authed(Method::PUT, &path, Some(patch)).await?;
        Task::from_dto(decode(response).await?)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        let path = format!("api/todos/{id}");
        self.authed(Method::DELETE, &path, None::<&()>).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn current_user(&self) -> ApiResult<UserProfile> {
        let response = self.authed(Method::GET, "auth/me", None::<&()>).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.expect("read");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(head_end) = find_head_end(&buf) {
                    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn find_head_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|window| window == b"\r\n\r\n")
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let client =
            RestClient::from_url("http://localhost:8000/backend", SessionContext::in_memory(None))
                .expect("client");
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/backend/");
        assert_eq!(
            client.endpoint("/api/todos").expect("join").as_str(),
            "http://localhost:8000/backend/api/todos"
        );
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let client = RestClient::from_url("http://127.0.0.1:9", SessionContext::in_memory(None))
            .expect("client");
        let err = client.list_tasks().await.expect_err("no token");
        assert!(matches!(err, ApiError::MissingCredential));
    }

    #[tokio::test]
    async fn list_sends_bearer_and_decodes_tasks() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 94\r\nconnection: close\r\n\r\n\
             [{\"id\":1,\"title\":\"A\",\"description\":null,\"completed\":false,\"created_at\":\"2025-01-01T00:00:00\"}]",
        )
        .await;
        let client =
            RestClient::from_url(&base, SessionContext::in_memory(Some("s3cret"))).expect("client");

        let tasks = client.list_tasks().await.expect("list");
        let request = server.await.expect("server");

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, TaskId::new(1));
        assert!(request.starts_with("GET /api/todos "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer s3cret"));
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_unauthorized() {
        let (base, server) = serve_once(
            "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: 30\r\nconnection: close\r\n\r\n\
             {\"detail\":\"Not authenticated\"}",
        )
        .await;
        let client =
            RestClient::from_url(&base, SessionContext::in_memory(Some("old"))).expect("client");

        let err = client.list_tasks().await.expect_err("401");
        server.await.expect("server");
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn error_detail_is_kept() {
        let (base, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: 27\r\nconnection: close\r\n\r\n\
             {\"detail\":\"Todo not found\"}",
        )
        .await;
        let client =
            RestClient::from_url(&base, SessionContext::in_memory(Some("tok"))).expect("client");

        let err = client.delete_task(TaskId::new(9)).await.expect_err("404");
        let request = server.await.expect("server");
        assert!(request.starts_with("DELETE /api/todos/9 "));
        match err {
            ApiError::Status { status, detail } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(detail, "Todo not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_accepts_empty_no_content() {
        let (base, server) =
            serve_once("HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n").await;
        let client =
            RestClient::from_url(&base, SessionContext::in_memory(Some("tok"))).expect("client");

        client.delete_task(TaskId::new(3)).await.expect("deleted");
        server.await.expect("server");
    }
}
