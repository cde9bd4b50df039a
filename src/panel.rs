//! Interactive control panel served over HTTP.
//!
//! A single blocking `tiny_http` loop: `GET /` shows the form, `POST
//! /generate` runs the pipeline once and shows the form again with the
//! preview, the image and a download link. Requests are handled one at a
//! time and share nothing.

use crate::pipeline::{LinkSource, Pipeline, RunOutcome, RunRequest};
use crate::shape::{BuiltinShape, NoticeLevel, ShapeNotice, ShapeSource};
use crate::{Category, Error, Result, WordLimit, PREDEFINED_LINKS};
use askama::Template;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use std::io::Read;
use tiny_http::{Header, Method, Response, Server};

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8501";

/// Default cap on a request body, uploads included
pub const MAX_BODY: u64 = 16 * 1024 * 1024;

/// Which kind of mask the form asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeMode {
    #[default]
    Builtin,
    Upload,
    /// Unshaped cloud
    None,
}

/// The control values of one form submission
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub link_source: LinkSource,
    pub predefined: usize,
    pub custom_url: String,
    pub word_limit: WordLimit,
    pub shape_mode: ShapeMode,
    pub builtin: BuiltinShape,
    /// Uploaded file as posted: a base64 data URL
    pub upload: String,
}

impl FormState {
    /// Parse an `application/x-www-form-urlencoded` body. Unknown fields
    /// are ignored and bad values fall back to defaults.
    pub fn parse(body: &str) -> Self {
        let mut state = FormState::default();
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            match key.as_ref() {
                "link_source" => {
                    state.link_source = if value == "custom" {
                        LinkSource::Custom
                    } else {
                        LinkSource::Predefined
                    }
                }
                "predefined" => state.predefined = value.parse().unwrap_or(0),
                "custom_url" => state.custom_url = value.into_owned(),
                "word_limit" => {
                    state.word_limit = value
                        .parse()
                        .map(WordLimit::new)
                        .unwrap_or_default()
                }
                "shape_mode" => {
                    state.shape_mode = match value.as_ref() {
                        "upload" => ShapeMode::Upload,
                        "none" => ShapeMode::None,
                        _ => ShapeMode::Builtin,
                    }
                }
                "builtin" => state.builtin = BuiltinShape::from_name(&value).unwrap_or_default(),
                "shape_upload" => state.upload = value.into_owned(),
                _ => {}
            }
        }
        state
    }

    /// Build the run request. A malformed upload encoding yields a warning
    /// and no mask.
    pub fn to_request(&self) -> (RunRequest, Option<ShapeNotice>) {
        let mut notice = None;
        let shape = match self.shape_mode {
            ShapeMode::None => ShapeSource::None,
            ShapeMode::Builtin => ShapeSource::Builtin(self.builtin),
            ShapeMode::Upload => match decode_upload(&self.upload) {
                Ok(bytes) => ShapeSource::Upload(bytes),
                Err(e) => {
                    warn!("upload field is not valid base64: {}", e);
                    notice = Some(ShapeNotice::warning(format!(
                        "Error loading uploaded image: {}",
                        e
                    )));
                    ShapeSource::None
                }
            },
        };
        let request = RunRequest {
            link_source: self.link_source,
            predefined: self.predefined,
            custom_url: self.custom_url.clone(),
            word_limit: self.word_limit,
            shape,
        };
        (request, notice)
    }
}

/// Strip an optional `data:...;base64,` prefix and decode the rest.
fn decode_upload(field: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let data = field.split_once(',').map_or(field, |(_, d)| d).trim();
    STANDARD.decode(data)
}

/// A response before it is handed to `tiny_http`
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    fn text(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: message.into().into_bytes(),
        }
    }

    fn not_found() -> Self {
        Self::text(404, "Not Found")
    }
}

/// Read a request body of at most `limit` bytes as UTF-8. Anything else is
/// answered with a client error instead of being run.
pub fn read_body(reader: impl Read, limit: u64) -> std::result::Result<String, Reply> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| Reply::text(400, format!("Couldn't read the request body: {}", e)))?;
    if bytes.len() as u64 > limit {
        return Err(too_large(limit));
    }
    String::from_utf8(bytes).map_err(|_| Reply::text(400, "Request body is not valid UTF-8"))
}

fn too_large(limit: u64) -> Reply {
    Reply::text(
        413,
        format!("Request body is larger than {} bytes", limit),
    )
}

pub struct Panel {
    pipeline: Pipeline,
    max_body: u64,
}

impl Panel {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            max_body: MAX_BODY,
        }
    }

    pub fn with_max_body(mut self, bytes: u64) -> Self {
        self.max_body = bytes;
        self
    }

    /// Serve until the process is stopped.
    pub fn serve(&self, addr: &str) -> Result<()> {
        let server = Server::http(addr)
            .map_err(|e| Error::Other(format!("failed to bind {}: {}", addr, e)))?;
        info!("control panel listening on http://{}", server.server_addr());

        for mut request in server.incoming_requests() {
            let reply = if *request.method() != Method::Post {
                self.handle(request.method(), request.url(), "")
            } else if request
                .body_length()
                .is_some_and(|len| len as u64 > self.max_body)
            {
                too_large(self.max_body)
            } else {
                match read_body(request.as_reader(), self.max_body) {
                    Ok(body) => self.handle(request.method(), request.url(), &body),
                    Err(reply) => reply,
                }
            };
            if reply.status >= 400 {
                warn!("{} {} -> {}", request.method(), request.url(), reply.status);
            } else {
                debug!("{} {} -> {}", request.method(), request.url(), reply.status);
            }

            let mut response = Response::from_data(reply.body).with_status_code(reply.status);
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
                response = response.with_header(header);
            }
            if let Err(e) = request.respond(response) {
                warn!("failed to send response: {}", e);
            }
        }
        Ok(())
    }

    /// Route one request.
    pub fn handle(&self, method: &Method, url: &str, body: &str) -> Reply {
        let path = url.split('?').next().unwrap_or(url);
        let page = match (method, path) {
            (Method::Get, "/") => render_page(&FormState::default(), None, &[]),
            (Method::Post, "/generate") => {
                let state = FormState::parse(body);
                let (request, notice) = state.to_request();
                let outcome = self.pipeline.run(&request);
                let extra: Vec<ShapeNotice> = notice.into_iter().collect();
                render_page(&state, Some(&outcome), &extra)
            }
            (Method::Get, p) if p.starts_with("/shapes/") => {
                let name = &p["/shapes/".len()..];
                return match BuiltinShape::ALL.iter().find(|s| s.file_name() == name) {
                    Some(shape) => Reply {
                        status: 200,
                        content_type: "image/svg+xml",
                        body: shape.bytes().to_vec(),
                    },
                    None => Reply::not_found(),
                };
            }
            _ => return Reply::not_found(),
        };
        match page {
            Ok(html) => Reply::html(html),
            Err(e) => Reply::text(500, e.to_string()),
        }
    }
}

struct LinkChoice {
    index: usize,
    url: &'static str,
    selected: bool,
}

struct ShapeChoice {
    name: &'static str,
    file: &'static str,
    selected: bool,
}

struct Message {
    class: &'static str,
    text: String,
}

impl From<&ShapeNotice> for Message {
    fn from(notice: &ShapeNotice) -> Self {
        let class = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        };
        Message {
            class,
            text: notice.message.clone(),
        }
    }
}

struct ResultView {
    url: String,
    preview: String,
    png_base64: String,
}

#[derive(Template)]
#[template(path = "panel.html")]
struct PanelPage<'a> {
    link_custom: bool,
    links: Vec<LinkChoice>,
    custom_url: &'a str,
    word_min: u32,
    word_max: u32,
    word_step: u32,
    word_limit: u32,
    shape_builtin: bool,
    shape_upload: bool,
    shape_none: bool,
    shapes: Vec<ShapeChoice>,
    upload: &'a str,
    messages: Vec<Message>,
    result: Option<ResultView>,
}

/// The whole panel page, with results when a run has happened.
pub fn render_page(
    state: &FormState,
    outcome: Option<&RunOutcome>,
    extra: &[ShapeNotice],
) -> Result<String> {
    let mut messages: Vec<Message> = extra.iter().map(Message::from).collect();
    let mut result = None;
    if let Some(outcome) = outcome {
        messages.extend(outcome.notices().iter().map(Message::from));
        match outcome {
            RunOutcome::Done(report) => {
                result = Some(ResultView {
                    url: report.url.clone(),
                    preview: report.preview.clone(),
                    png_base64: STANDARD.encode(&report.png),
                })
            }
            RunOutcome::Failed { error, .. } => messages.push(Message {
                class: match error.category() {
                    Category::InputValidation => "warning",
                    _ => "error",
                },
                text: error.user_message(),
            }),
        }
    }

    let page = PanelPage {
        link_custom: state.link_source == LinkSource::Custom,
        links: PREDEFINED_LINKS
            .iter()
            .enumerate()
            .map(|(index, url)| LinkChoice {
                index,
                url,
                selected: index == state.predefined,
            })
            .collect(),
        custom_url: &state.custom_url,
        word_min: WordLimit::MIN,
        word_max: WordLimit::MAX,
        word_step: WordLimit::STEP,
        word_limit: state.word_limit.get(),
        shape_builtin: state.shape_mode == ShapeMode::Builtin,
        shape_upload: state.shape_mode == ShapeMode::Upload,
        shape_none: state.shape_mode == ShapeMode::None,
        shapes: BuiltinShape::ALL
            .iter()
            .map(|shape| ShapeChoice {
                name: shape.name(),
                file: shape.file_name(),
                selected: *shape == state.builtin,
            })
            .collect(),
        upload: &state.upload,
        messages,
        result,
    };
    page.render()
        .map_err(|e| Error::Render(format!("panel template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineConfig;
    use std::io::Cursor;
    use std::time::Duration;

    fn panel() -> Panel {
        Panel::new(Pipeline::new(PipelineConfig::default()).unwrap())
    }

    fn page(reply: Reply) -> String {
        String::from_utf8(reply.body).unwrap()
    }

    #[test]
    fn form_parsing() {
        let state = FormState::parse(
            "link_source=custom&custom_url=http%3A%2F%2Fa.test%2Fx&word_limit=749&shape_mode=builtin&builtin=Unique+01",
        );
        assert_eq!(state.link_source, LinkSource::Custom);
        assert_eq!(state.custom_url, "http://a.test/x");
        assert_eq!(state.word_limit.get(), 700);
        assert_eq!(state.shape_mode, ShapeMode::Builtin);
        assert_eq!(state.builtin, BuiltinShape::Unique01);

        let (request, notice) = state.to_request();
        assert!(notice.is_none());
        assert!(matches!(request.shape, ShapeSource::Builtin(BuiltinShape::Unique01)));
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let state = FormState::parse("word_limit=lots&predefined=x&shape_mode=??&builtin=hexagon");
        assert_eq!(state.word_limit, WordLimit::default());
        assert_eq!(state.predefined, 0);
        assert_eq!(state.shape_mode, ShapeMode::Builtin);
        assert_eq!(state.builtin, BuiltinShape::Circle);

        let state = FormState::parse("shape_mode=none");
        assert!(matches!(state.to_request().0.shape, ShapeSource::None));
    }

    #[test]
    fn default_shape_is_builtin_circle() {
        let (request, _) = FormState::default().to_request();
        assert!(matches!(request.shape, ShapeSource::Builtin(BuiltinShape::Circle)));
    }

    #[test]
    fn upload_is_base64_decoded() {
        let state = FormState {
            shape_mode: ShapeMode::Upload,
            upload: "data:image/png;base64,aGVsbG8=".into(),
            ..Default::default()
        };
        let (request, notice) = state.to_request();
        assert!(notice.is_none());
        match request.shape {
            ShapeSource::Upload(bytes) => assert_eq!(bytes, b"hello"),
            other => panic!("unexpected shape {:?}", other),
        }

        let broken = FormState {
            shape_mode: ShapeMode::Upload,
            upload: "data:image/png;base64,***".into(),
            ..Default::default()
        };
        let (request, notice) = broken.to_request();
        assert!(matches!(request.shape, ShapeSource::None));
        assert_eq!(notice.map(|n| n.level), Some(NoticeLevel::Warning));
    }

    #[test]
    fn user_input_is_escaped() {
        let state = FormState {
            link_source: LinkSource::Custom,
            custom_url: "\"><script>alert(1)</script>".into(),
            ..Default::default()
        };
        let html = render_page(&state, None, &[]).unwrap();
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;alert(1)"));
    }

    #[test]
    fn index_page_lists_controls() {
        let reply = panel().handle(&Method::Get, "/", "");
        assert_eq!(reply.status, 200);
        let html = page(reply);
        assert!(html.contains("<option value=\"0\" selected>"));
        assert!(html.contains("name=\"word_limit\""));
        assert!(html.contains("value=\"400\""));
        assert!(html.contains("value=\"builtin\" checked"));
        assert!(html.contains("value=\"Circle\" checked"));
        for shape in BuiltinShape::ALL {
            assert!(html.contains(shape.name()));
        }
    }

    #[test]
    fn shapes_and_unknown_routes() {
        let panel = panel();
        let svg = panel.handle(&Method::Get, "/shapes/star.svg", "");
        assert_eq!(svg.status, 200);
        assert_eq!(svg.content_type, "image/svg+xml");
        assert_eq!(panel.handle(&Method::Get, "/shapes/../Cargo.toml", "").status, 404);
        assert_eq!(panel.handle(&Method::Get, "/nope", "").status, 404);
        assert_eq!(panel.handle(&Method::Get, "/generate", "").status, 404);
    }

    #[test]
    fn missing_url_is_shown_as_warning() {
        let reply = panel().handle(&Method::Post, "/generate", "link_source=custom&custom_url=+++");
        let html = page(reply);
        assert!(html.contains("<p class=\"warning\">Please enter or select a valid URL</p>"));
        assert!(!html.contains("wordcloud.png"));
    }

    #[test]
    fn failed_fetch_is_shown_as_error() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let _ = request.respond(tiny_http::Response::from_string("gone").with_status_code(404));
            }
        });
        let body = format!(
            "link_source=custom&shape_mode=none&custom_url={}",
            url::form_urlencoded::byte_serialize(format!("http://{}", addr).as_bytes())
                .collect::<String>()
        );
        let html = page(panel().handle(&Method::Post, "/generate", &body));
        assert!(html.contains("<p class=\"error\">Request error:"));
        assert!(!html.contains("data:image/png"));
    }

    #[test]
    fn unreadable_bodies_are_refused() {
        let bad = read_body(Cursor::new(vec![b'a', 0xff, 0xfe]), 64).unwrap_err();
        assert_eq!(bad.status, 400);

        let big = read_body(Cursor::new(vec![b'a'; 65]), 64).unwrap_err();
        assert_eq!(big.status, 413);

        assert_eq!(read_body(Cursor::new(b"a=1".to_vec()), 3).unwrap(), "a=1");
    }

    #[test]
    fn server_answers_bad_posts_with_client_errors() {
        std::thread::spawn(|| {
            let panel = Panel::new(Pipeline::new(PipelineConfig::default()).unwrap())
                .with_max_body(64);
            let _ = panel.serve("127.0.0.1:18502");
        });
        std::thread::sleep(Duration::from_millis(200));

        let client = reqwest::blocking::Client::new();
        let url = "http://127.0.0.1:18502/generate";
        let resp = client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(vec![b'a', 0xff, 0xfe, 0xfd])
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        let resp = client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("custom_url=".to_string() + &"x".repeat(100))
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 413);

        let resp = client.get("http://127.0.0.1:18502/").send().unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }
}
