use crate::engine::{Joke, JokeEngine};
use crate::error::{JokeError, ModelError, TopicError};
use crate::model::LanguageModel;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState<M> = Arc<AppState<M>>;

pub struct AppState<M> {
    pub engine: Arc<JokeEngine<M>>,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve<M>(config: WebConfig, engine: Arc<JokeEngine<M>>) -> Result<(), WebError>
where
    M: LanguageModel + 'static,
{
    let state = Arc::new(AppState { engine });
    let router = build_router(state);
    info!(%config.addr, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<JokeError> for ApiError {
    fn from(value: JokeError) -> Self {
        let status = match &value {
            JokeError::NoJokeFound => StatusCode::NOT_FOUND,
            JokeError::Topic(
                TopicError::Missing | TopicError::TooLong { .. } | TopicError::Inappropriate { .. },
            ) => StatusCode::BAD_REQUEST,
            JokeError::Model(ModelError::Retriable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            JokeError::Model(ModelError::ResponseFormat { .. }) => StatusCode::BAD_GATEWAY,
            JokeError::Model(ModelError::Permanent { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router<M>(state: SharedState<M>) -> Router
where
    M: LanguageModel + 'static,
{
    Router::new()
        .route("/", get(home))
        .route("/jokes", get(jokes_html::<M>))
        .route("/api/joke", get(api_joke::<M>))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "punsmith-web" }))
}

async fn home() -> impl IntoResponse {
    Html(render_home())
}

#[derive(Debug, Deserialize)]
struct JokeParams {
    topic: Option<String>,
    setup: Option<String>,
    punchline: Option<String>,
    nucleus: Option<String>,
    component: Option<String>,
    change: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct JokePayload {
    setup: String,
    punchline: String,
    nucleus: String,
    component: String,
    change: String,
    substitution: String,
}

impl From<&Joke> for JokePayload {
    fn from(joke: &Joke) -> Self {
        Self {
            setup: joke.setup.clone(),
            punchline: joke.punchline.clone(),
            nucleus: joke.nucleus.clone(),
            component: joke.component.clone(),
            change: joke.change.clone(),
            substitution: joke.substitution.clone(),
        }
    }
}

/// Joke page. Without a `punchline` parameter this generates a joke
/// (optionally about `topic`) and redirects back here with the joke spelled
/// out in the query string; with one, it renders the joke from the query
/// string alone.
async fn jokes_html<M>(
    State(state): State<SharedState<M>>,
    Query(params): Query<JokeParams>,
) -> Response
where
    M: LanguageModel + 'static,
{
    if params.punchline.is_none() {
        return match generate(&state, params.topic.clone()).await {
            Ok(joke) => Redirect::to(&joke_page_url(&joke)).into_response(),
            Err(err) => Html(render_error_page(&err.message)).into_response(),
        };
    }
    Html(render_joke_page(&params)).into_response()
}

async fn api_joke<M>(
    State(state): State<SharedState<M>>,
    Query(params): Query<JokeParams>,
) -> Result<Json<JokePayload>, ApiError>
where
    M: LanguageModel + 'static,
{
    let joke = generate(&state, params.topic).await?;
    Ok(Json(JokePayload::from(&joke)))
}

/// Runs the blocking engine on the blocking pool. An in-flight model call
/// cannot be cancelled; request deadlines are the caller's concern.
async fn generate<M>(state: &SharedState<M>, topic: Option<String>) -> Result<Joke, ApiError>
where
    M: LanguageModel + 'static,
{
    let engine = state.engine.clone();
    let joke = tokio::task::spawn_blocking(move || match topic.as_deref() {
        Some(topic) => engine.tell_joke_about(topic),
        None => engine.tell_joke(),
    })
    .await
    .map_err(|err| ApiError::internal(format!("joke task failed: {err}")))??;
    Ok(joke)
}

fn joke_page_url(joke: &Joke) -> String {
    format!(
        "/jokes?setup={}&punchline={}&nucleus={}&component={}&change={}",
        encode_component(&joke.setup),
        encode_component(&joke.punchline),
        encode_component(&joke.nucleus),
        encode_component(&joke.component),
        encode_component(&joke.change),
    )
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-3xl w-full space-y-6">
{body}
      </div>
    </main>
  </body>
</html>"#,
        title = html_escape(title),
        body = body,
    )
}

fn render_home() -> String {
    let body = format!(
        r#"        <div>
          <p class="uppercase tracking-wide text-sm text-slate-500">Punsmith v{version}</p>
          <h1 class="text-4xl font-extrabold tracking-tight">Puns on demand.</h1>
          <p class="text-lg text-slate-600">Takes a phrase, swaps part of it for a sound-alike, and dresses the result up as a joke.</p>
        </div>
        <div class="flex flex-wrap gap-3">
          <a href="/jokes" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors">Tell me a joke</a>
        </div>
        <form action="/jokes" method="get" class="flex flex-wrap gap-3">
          <input type="text" name="topic" placeholder="a topic, e.g. cheese" class="rounded-md border border-slate-300 px-4 py-2" />
          <button type="submit" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors">Joke about it</button>
        </form>"#,
        version = env!("CARGO_PKG_VERSION"),
    );
    page("Punsmith • Pun generator", &body)
}

fn render_joke_page(params: &JokeParams) -> String {
    let setup = html_escape(params.setup.as_deref().unwrap_or_default());
    let punchline = html_escape(params.punchline.as_deref().unwrap_or_default());
    let provenance = match (&params.nucleus, &params.component, &params.change) {
        (Some(nucleus), Some(component), Some(change)) => format!(
            r#"<p class="text-sm text-slate-500">Built from <strong>{}</strong> by swapping <strong>{}</strong> for <strong>{}</strong>.</p>"#,
            html_escape(nucleus),
            html_escape(component),
            html_escape(change),
        ),
        _ => String::new(),
    };
    let body = format!(
        r#"        <div>
          <p class="uppercase tracking-wide text-sm text-slate-500">Punsmith</p>
          <h1 class="text-3xl font-extrabold tracking-tight">{setup}</h1>
          <p class="text-2xl text-slate-700 mt-4">{punchline}</p>
        </div>
        {provenance}
        <div class="flex flex-wrap gap-3">
          <a href="/jokes" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors">Another!</a>
          <a href="/" class="inline-flex items-center rounded-md border border-slate-300 px-4 py-2 font-semibold hover:bg-slate-100 transition-colors">Home</a>
        </div>"#,
    );
    page("Punsmith • A joke", &body)
}

fn render_error_page(message: &str) -> String {
    let body = format!(
        r#"        <div>
          <h1 class="text-3xl font-extrabold tracking-tight">No joke this time</h1>
          <p class="text-lg text-slate-600">{}</p>
        </div>
        <div class="flex flex-wrap gap-3">
          <a href="/jokes" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors">Try again</a>
          <a href="/" class="inline-flex items-center rounded-md border border-slate-300 px-4 py-2 font-semibold hover:bg-slate-100 transition-colors">Home</a>
        </div>"#,
        html_escape(message),
    );
    page("Punsmith • Error", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PhraseIndex;
    use crate::error::ModelError;
    use crate::model::JokeLines;
    use crate::topic::TopicValidator;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct StubModel;

    impl LanguageModel for StubModel {
        fn phonetic_neighbors(
            &self,
            word: &str,
            _context: Option<&str>,
        ) -> Result<Vec<String>, ModelError> {
            if word == "cat" {
                Ok(vec!["mat".to_string()])
            } else {
                Ok(Vec::new())
            }
        }

        fn phrase_joke(
            &self,
            punchline_word: &str,
            _original: &str,
            _change: &str,
        ) -> Result<JokeLines, ModelError> {
            Ok(JokeLines {
                setup: "What do you wipe your paws on?".to_string(),
                punchline: format!("A {punchline_word}!"),
            })
        }

        fn related_words(&self, _topic: &str) -> Result<Vec<String>, ModelError> {
            Ok(Vec::new())
        }

        fn is_inappropriate(&self, _topic: &str) -> Result<bool, ModelError> {
            Ok(false)
        }
    }

    fn test_router() -> Router {
        let index = Arc::new(PhraseIndex::from_lists(
            ["cat".to_string()],
            ["category".to_string()],
        ));
        let validator = TopicValidator::from_entries(["murder".to_string()]);
        let engine = Arc::new(JokeEngine::with_seed(index, validator, StubModel, 7));
        build_router(Arc::new(AppState { engine }))
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let response = test_router()
            .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_joke_returns_the_substitution() {
        let response = test_router()
            .oneshot(Request::get("/api/joke").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["substitution"], "mat-egory");
        assert_eq!(payload["component"], "cat");
        assert_eq!(payload["nucleus"], "category");
    }

    #[tokio::test]
    async fn api_joke_rejects_blocked_topics() {
        let response = test_router()
            .oneshot(
                Request::get("/api/joke?topic=murder")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn jokes_page_redirects_after_generation() {
        let response = test_router()
            .oneshot(Request::get("/jokes").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .expect("location header")
            .to_str()
            .expect("utf-8 location");
        assert!(location.starts_with("/jokes?setup="));
        assert!(location.contains("punchline="));
    }

    #[tokio::test]
    async fn jokes_page_renders_from_the_query_string() {
        let response = test_router()
            .oneshot(
                Request::get("/jokes?setup=Why&punchline=Because&nucleus=category&component=cat&change=mat")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        let html = String::from_utf8(bytes.to_vec()).expect("utf-8 body");
        assert!(html.contains("Because"));
        assert!(html.contains("category"));
    }
}
