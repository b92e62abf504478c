//! Board page, form handlers and the live update stream.

use crate::csrf::{
    ensure_session_id, get_csrf_token, validate_csrf_token, CsrfOnlyForm, CsrfProtectedForm,
};
use crate::session::{session_device_id, set_alert, take_alert, SharedBoardSession};
use crate::AppState;
use axum::{
    extract::{Form, Multipart, Path as AxumPath, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Redirect,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::WatchStream;
use topicboard::board::{ImageUpload, PostDraft, SubmissionPhase, SubmitStep};
use topicboard::constants::{
    ALERT_ADD_COMMENT_FAILED, ALERT_ADD_POST_FAILED, ALERT_ADD_TOPIC_FAILED,
    ALERT_DELETE_COMMENT_FAILED, ALERT_DELETE_POST_FAILED,
};
use topicboard::render::{render_board, render_posts_fragment, PageContext};
use topicboard::types::{AuthorType, RecordId};
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

/// Form data for selecting or adding a topic
#[derive(Debug, Deserialize)]
pub struct TopicNameForm {
    name: String,
}

/// Form data for adding a comment
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    content: String,
    author_type: String,
}

fn parse_id(raw: &str) -> Result<RecordId, StatusCode> {
    raw.parse().map_err(|_| {
        warn!("Invalid record id in path: {}", raw);
        StatusCode::BAD_REQUEST
    })
}

/// Opens the board client for this browser session.
async fn open_board(app: &AppState, session: &Session) -> Result<SharedBoardSession, StatusCode> {
    let session_id = ensure_session_id(session).await?;
    let device_id = session_device_id(session).await?;
    app.boards.open(&session_id, &device_id).await.map_err(|e| {
        error!("Failed to start board client: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Board page
#[instrument(skip(app, session))]
pub async fn board_page(
    State(app): State<AppState>,
    session: Session,
) -> Result<Html<String>, StatusCode> {
    let csrf_token = get_csrf_token(&session, &app.csrf_store).await?;
    let board = open_board(&app, &session).await?;
    let mut board = board.lock().await;

    if let Err(e) = board.client.sync().await {
        warn!("Failed to refresh board: {}", e);
    }

    let context = PageContext {
        csrf_token,
        viewer: board.client.device_id().to_string(),
        captcha_site_key: app.config.captcha_site_key.clone(),
        alert: take_alert(&session).await,
        draft: board.draft.clone(),
    };
    let html = render_board(board.client.state(), &board.client.feed().snapshot(), context)
        .map_err(|e| {
            error!("Failed to render board template: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Html(html))
}

/// Switch the active topic
#[instrument(skip(app, session, form))]
pub async fn select_topic(
    State(app): State<AppState>,
    session: Session,
    Form(form): Form<CsrfProtectedForm<TopicNameForm>>,
) -> Result<Redirect, StatusCode> {
    if !form.validate(&session, &app.csrf_store) {
        warn!("CSRF validation failed for topic selection");
        return Err(StatusCode::FORBIDDEN);
    }

    let board = open_board(&app, &session).await?;
    let mut board = board.lock().await;
    if let Err(e) = board.client.sync().await {
        warn!("Failed to refresh board: {}", e);
    }

    let previous = board.client.state().active_topic.clone();
    match board.client.select_topic(&form.data.name).await {
        Ok(()) if previous != form.data.name => board.clear_draft(),
        Ok(()) => {}
        Err(e) => {
            warn!("Failed to select topic '{}': {}", form.data.name, e);
            set_alert(&session, e.alert_text()).await;
        }
    }
    Ok(Redirect::to("/"))
}

/// Add a topic
#[instrument(skip(app, session, form))]
pub async fn add_topic(
    State(app): State<AppState>,
    session: Session,
    Form(form): Form<CsrfProtectedForm<TopicNameForm>>,
) -> Result<Redirect, StatusCode> {
    if !form.validate(&session, &app.csrf_store) {
        warn!("CSRF validation failed for topic creation");
        return Err(StatusCode::FORBIDDEN);
    }

    let board = open_board(&app, &session).await?;
    let mut board = board.lock().await;
    match board.client.add_topic(&form.data.name).await {
        Ok(topic) => info!("Added topic '{}'", topic.name),
        Err(e) => {
            warn!("Failed to add topic '{}': {}", form.data.name, e);
            set_alert(&session, e.alert_or(ALERT_ADD_TOPIC_FAILED)).await;
        }
    }
    Ok(Redirect::to("/"))
}

/// One press of the post form's submit control
#[instrument(skip(app, session, multipart))]
pub async fn create_post(
    State(app): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Redirect, StatusCode> {
    let mut csrf_token = String::new();
    let mut content = String::new();
    let mut captcha_token: Option<String> = None;
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {:?}", e);
        StatusCode::BAD_REQUEST
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "csrf_token" => {
                csrf_token = field.text().await.map_err(|e| {
                    error!("Failed to read CSRF token: {:?}", e);
                    StatusCode::BAD_REQUEST
                })?;
            }
            "content" => {
                content = field.text().await.map_err(|e| {
                    error!("Failed to read post content: {:?}", e);
                    StatusCode::BAD_REQUEST
                })?;
            }
            "captcha_token" => {
                captcha_token = Some(field.text().await.map_err(|e| {
                    error!("Failed to read CAPTCHA token: {:?}", e);
                    StatusCode::BAD_REQUEST
                })?);
            }
            "image" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    error!("Failed to read image data: {:?}", e);
                    StatusCode::BAD_REQUEST
                })?;
                // An empty file input still sends an empty part.
                if !bytes.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {
                continue;
            }
        }
    }

    if !validate_csrf_token(&session, &app.csrf_store, &csrf_token) {
        warn!("CSRF validation failed for post submission");
        return Err(StatusCode::FORBIDDEN);
    }

    let board = open_board(&app, &session).await?;
    let mut board = board.lock().await;
    if let Err(e) = board.client.sync().await {
        warn!("Failed to refresh board: {}", e);
    }

    let image = image.or_else(|| board.pending_image.take());
    if let SubmissionPhase::AwaitingVerification { widget } = &board.client.state().phase {
        if let Err(e) = app
            .boards
            .captcha()
            .record_response(widget, captcha_token.as_deref())
        {
            warn!("Dropping CAPTCHA response: {}", e);
        }
    }

    let mut draft = PostDraft::new(content.clone());
    if let Some(image) = image.clone() {
        draft = draft.with_image(image);
    }

    match board.client.submit_post(draft).await {
        Ok(SubmitStep::ChallengeShown { .. }) => {
            board.draft = content;
            board.pending_image = image;
        }
        Ok(SubmitStep::Posted { post, warning }) => {
            info!("Post {} added to '{}'", post.id.short(), post.topic);
            board.clear_draft();
            if let Some(warning) = warning {
                set_alert(&session, warning).await;
            }
        }
        Err(e) => {
            warn!("Failed to add post: {}", e);
            board.draft = content;
            board.pending_image = None;
            set_alert(&session, e.alert_or(ALERT_ADD_POST_FAILED)).await;
        }
    }
    Ok(Redirect::to("/"))
}

/// Delete one of this device's posts
#[instrument(skip(app, session, form))]
pub async fn delete_post(
    State(app): State<AppState>,
    session: Session,
    AxumPath(post_id): AxumPath<String>,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf_token(&session, &app.csrf_store, &form.csrf_token) {
        warn!("CSRF validation failed for post deletion");
        return Err(StatusCode::FORBIDDEN);
    }
    let post_id = parse_id(&post_id)?;

    let board = open_board(&app, &session).await?;
    let board = board.lock().await;
    if let Err(e) = board.client.delete_post(&post_id).await {
        warn!("Failed to delete post {}: {}", post_id.short(), e);
        set_alert(&session, e.alert_or(ALERT_DELETE_POST_FAILED)).await;
    }
    Ok(Redirect::to("/"))
}

/// Comment on a post
#[instrument(skip(app, session, form))]
pub async fn add_comment(
    State(app): State<AppState>,
    session: Session,
    AxumPath(post_id): AxumPath<String>,
    Form(form): Form<CsrfProtectedForm<CommentForm>>,
) -> Result<Redirect, StatusCode> {
    if !form.validate(&session, &app.csrf_store) {
        warn!("CSRF validation failed for comment");
        return Err(StatusCode::FORBIDDEN);
    }
    let post_id = parse_id(&post_id)?;

    let board = open_board(&app, &session).await?;
    let board = board.lock().await;
    let result = match form.data.author_type.parse::<AuthorType>() {
        Ok(author_type) => {
            board
                .client
                .add_comment(&post_id, &form.data.content, author_type)
                .await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!("Failed to add comment to {}: {}", post_id.short(), e);
        set_alert(&session, e.alert_or(ALERT_ADD_COMMENT_FAILED)).await;
    }
    Ok(Redirect::to("/"))
}

/// Remove one of this device's comments
#[instrument(skip(app, session, form))]
pub async fn remove_comment(
    State(app): State<AppState>,
    session: Session,
    AxumPath((post_id, comment_id)): AxumPath<(String, String)>,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf_token(&session, &app.csrf_store, &form.csrf_token) {
        warn!("CSRF validation failed for comment removal");
        return Err(StatusCode::FORBIDDEN);
    }
    let post_id = parse_id(&post_id)?;
    let comment_id = parse_id(&comment_id)?;

    let board = open_board(&app, &session).await?;
    let board = board.lock().await;
    if let Err(e) = board.client.remove_comment(&post_id, &comment_id).await {
        warn!("Failed to delete comment {}: {}", comment_id.short(), e);
        set_alert(&session, e.alert_or(ALERT_DELETE_COMMENT_FAILED)).await;
    }
    Ok(Redirect::to("/"))
}

/// Renders the post list as a `posts` event.
async fn posts_event(board: SharedBoardSession, viewer: String, csrf_token: String) -> Event {
    let snapshot = board.lock().await.client.feed().snapshot();
    match render_posts_fragment(&snapshot, &viewer, &csrf_token) {
        // Carriage returns cannot be carried in an SSE data field.
        Ok(html) => Event::default().event("posts").data(html.replace('\r', "")),
        Err(e) => {
            error!("Failed to render posts fragment: {}", e);
            Event::default().event("posts").data("")
        }
    }
}

/// Live updates: a `posts` event with fresh list HTML after every post
/// delivery, a `topics` event after every topic delivery.
#[instrument(skip(app, session))]
pub async fn events(
    State(app): State<AppState>,
    session: Session,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let csrf_token = get_csrf_token(&session, &app.csrf_store).await?;
    let board = open_board(&app, &session).await?;
    let (post_changes, topic_changes, viewer) = {
        let guard = board.lock().await;
        (
            guard.client.post_changes(),
            guard.client.topic_changes(),
            guard.client.device_id().to_string(),
        )
    };

    let posts = WatchStream::from_changes(post_changes).then(move |_| {
        posts_event(board.clone(), viewer.clone(), csrf_token.clone())
    });
    let topics =
        WatchStream::from_changes(topic_changes).map(|_| Event::default().event("topics").data("changed"));

    let stream = stream::select(posts, topics).map(Ok);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Health check
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "topicboard-web",
        "version": topicboard::VERSION
    }))
}
