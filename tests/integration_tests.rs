//! End-to-end runs of the pipeline against a local fixture server

use std::sync::Once;
use std::time::Duration;
use tiny_http::{Response, Server};
use webcloud::pipeline::{Pipeline, RunOutcome, RunRequest};
use webcloud::shape::{BuiltinShape, NoticeLevel, ShapeSource};
use webcloud::{Category, Error, PipelineConfig, WordLimit};

static INIT: Once = Once::new();
const BASE: &str = "http://127.0.0.1:18481";

/// Start the fixture server once for all tests
fn start_test_server() -> &'static str {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18481").unwrap();
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                if path == "/slow" {
                    // answered off-thread so other tests are not held up
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(1500));
                        let _ = request.respond(Response::from_string("<body>too late</body>"));
                    });
                    continue;
                }
                let response = match path.as_str() {
                    "/ai" => Response::from_string(
                        "<!DOCTYPE html><html><head><title>AI</title></head>\
                         <body>AI is the simulation of human intelligence AI AI</body></html>",
                    ),
                    "/article" => Response::from_string(
                        r#"<!DOCTYPE html>
<html>
<body>
<header>Site Header</header>
<nav>Home About Contact</nav>
<article>Rust ownership rules keep memory safe.[1] Ownership moves values.</article>
<main>Borrowing borrowing borrowing lets code read values without ownership.[12]</main>
<footer>Copyright footer</footer>
</body>
</html>"#,
                    ),
                    "/empty" => Response::from_string(
                        "<html><head><title>Nothing</title><script>var x = 1;</script></head></html>\n",
                    ),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(Duration::from_millis(100));
    });
    BASE
}

fn pipeline() -> Pipeline {
    let mut config = PipelineConfig::default();
    config.seed = Some(7);
    config.fetch.timeout_ms = 1000;
    Pipeline::new(config).expect("pipeline")
}

#[test]
fn test_ai_page_end_to_end() {
    let base = start_test_server();
    let request = RunRequest::custom(format!("{}/ai", base)).with_word_limit(WordLimit::new(100));

    let RunOutcome::Done(report) = pipeline().run(&request) else {
        panic!("run failed");
    };
    assert_eq!(report.image.top_word().map(|w| w.text.as_str()), Some("AI"));
    assert!(report.png.starts_with(b"\x89PNG"));
    assert_eq!((report.image.width(), report.image.height()), (800, 400));
    assert_eq!(
        report.preview,
        "AI is the simulation of human intelligence AI AI..."
    );
    assert!(report.notices.is_empty());
}

#[test]
fn test_main_content_wins_and_is_cleaned() {
    let base = start_test_server();
    let RunOutcome::Done(report) = pipeline().run(&RunRequest::custom(format!("{}/article", base)))
    else {
        panic!("run failed");
    };
    assert_eq!(
        report.cleaned_text,
        "Borrowing borrowing borrowing lets code read values without ownership."
    );
    assert!(!report.cleaned_text.contains("Header"));
    assert!(!report.cleaned_text.contains("Rust"));
    assert_eq!(report.image.top_word().map(|w| w.text.as_str()), Some("borrowing"));
}

#[test]
fn test_builtin_shape_sets_canvas_and_notice() {
    let base = start_test_server();
    let request = RunRequest::custom(format!("{}/ai", base))
        .with_shape(ShapeSource::Builtin(BuiltinShape::Heart));

    let RunOutcome::Done(report) = pipeline().run(&request) else {
        panic!("run failed");
    };
    assert_eq!((report.image.width(), report.image.height()), (600, 600));
    assert_eq!(report.image.image.get_pixel(0, 0).0, [255, 255, 255, 255]);
    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].level, NoticeLevel::Info);
    assert_eq!(report.notices[0].message, "Loaded built-in shape: Heart");
}

#[test]
fn test_corrupt_upload_degrades_to_unshaped() {
    let base = start_test_server();
    let request = RunRequest::custom(format!("{}/ai", base))
        .with_shape(ShapeSource::Upload(b"\x89PNG definitely not a png".to_vec()));

    let RunOutcome::Done(report) = pipeline().run(&request) else {
        panic!("a bad mask must not fail the run");
    };
    assert_eq!((report.image.width(), report.image.height()), (800, 400));
    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].level, NoticeLevel::Warning);
    assert!(report.notices[0]
        .message
        .starts_with("Error loading uploaded image"));
}

#[test]
fn test_not_found_is_transport_error() {
    let base = start_test_server();
    match pipeline().run(&RunRequest::custom(format!("{}/missing", base))) {
        RunOutcome::Failed { error, .. } => {
            assert_eq!(error.category(), Category::Transport);
            assert!(error.user_message().starts_with("Request error:"));
        }
        RunOutcome::Done(_) => panic!("404 must not produce an image"),
    }
}

#[test]
fn test_slow_page_times_out() {
    let base = start_test_server();
    match pipeline().run(&RunRequest::custom(format!("{}/slow", base))) {
        RunOutcome::Failed { error, .. } => assert!(matches!(error, Error::Request(_))),
        RunOutcome::Done(_) => panic!("expected a timeout"),
    }
}

#[test]
fn test_head_only_page_has_no_content() {
    let base = start_test_server();
    match pipeline().run(&RunRequest::custom(format!("{}/empty", base))) {
        RunOutcome::Failed { error, .. } => {
            assert_eq!(error.category(), Category::NoContent);
            assert_eq!(
                error.user_message(),
                "Couldn't find usable content. Try a different link or page structure."
            );
        }
        RunOutcome::Done(_) => panic!("expected no content"),
    }
}

#[test]
fn test_missing_url_never_fetches() {
    match pipeline().run(&RunRequest::custom("   ")) {
        RunOutcome::Failed { error, notices } => {
            assert!(matches!(error, Error::MissingUrl));
            assert!(notices.is_empty());
        }
        RunOutcome::Done(_) => panic!("expected input validation failure"),
    }
}
