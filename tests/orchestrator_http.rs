use std::sync::Arc;

use httpmock::{Method::POST, MockServer};
use triptych::{
    Credentials, GenerationIntent, GoogleImages, ImageModel, ImageRef, ModelId, OpenAiImages,
    Orchestrator, Result, RetryPolicy, RunState, SourceImage,
};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay: std::time::Duration::from_millis(5),
        max_delay: std::time::Duration::from_millis(20),
    }
}

fn credentials() -> Credentials {
    Credentials::new("sk-test", "gm-test")
}

fn orchestrator_against(openai: &MockServer, google: &MockServer) -> Orchestrator {
    let models: Vec<Arc<dyn ImageModel>> = vec![
        Arc::new(OpenAiImages::dalle2("sk-test").with_base_url(openai.url("/v1"))),
        Arc::new(OpenAiImages::dalle3("sk-test").with_base_url(openai.url("/v1"))),
        Arc::new(GoogleImages::new("gm-test").with_base_url(google.url("/v1beta"))),
    ];
    Orchestrator::with_models(models, credentials()).with_retry(fast_retry())
}

fn tiny_png() -> Vec<u8> {
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        4,
        4,
        image::Rgba([9, 9, 9, 255]),
    ))
    .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
    .expect("encode test png");
    out
}

fn gemini_inline_body() -> String {
    serde_json::json!({
        "candidates": [{
            "content": {
                "parts": [{ "inlineData": { "mimeType": "image/png", "data": "AQID" } }]
            }
        }]
    })
    .to_string()
}

fn openai_url_body(url: &str) -> String {
    serde_json::json!({ "data": [{ "url": url }] }).to_string()
}

#[tokio::test]
async fn text_mode_completes_all_three_models() -> Result<()> {
    if triptych::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }
    let openai = MockServer::start_async().await;
    let google = MockServer::start_async().await;

    let dalle2_mock = openai
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/images/generations")
                .body_includes("\"model\":\"dall-e-2\"");
            then.status(200)
                .header("content-type", "application/json")
                .body(openai_url_body("https://img.example/d2.png"));
        })
        .await;
    let dalle3_mock = openai
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/images/generations")
                .body_includes("\"model\":\"dall-e-3\"");
            then.status(200)
                .header("content-type", "application/json")
                .body(openai_url_body("https://img.example/d3.png"));
        })
        .await;
    let gemini_mock = google
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash-image-preview:generateContent")
                .body_includes("Generate an image: a red fox");
            then.status(200)
                .header("content-type", "application/json")
                .body(gemini_inline_body());
        })
        .await;

    let orchestrator = orchestrator_against(&openai, &google);
    let intent = GenerationIntent::text("a red fox")?;
    orchestrator.generate_images(&intent).await?;

    dalle2_mock.assert_async().await;
    dalle3_mock.assert_async().await;
    gemini_mock.assert_async().await;

    let snapshot = orchestrator.snapshot();
    assert!(!snapshot.generating);
    assert!(snapshot.runs.values().all(RunState::is_terminal));
    assert_eq!(
        snapshot.run(ModelId::Dalle2),
        Some(&RunState::Completed {
            image: ImageRef::Url {
                url: "https://img.example/d2.png".to_string()
            },
            elapsed_seconds: 0
        })
    );
    match snapshot.run(ModelId::Gemini) {
        Some(RunState::Completed { image, .. }) => {
            assert_eq!(image.display_source(), "data:image/png;base64,AQID");
        }
        other => panic!("unexpected gemini state: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn image_mode_skips_dalle3_and_posts_the_edit_form() -> Result<()> {
    if triptych::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }
    let openai = MockServer::start_async().await;
    let google = MockServer::start_async().await;

    let edit_mock = openai
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/images/edits")
                .body_includes("name=\"prompt\"")
                .body_includes("add a hat")
                .body_includes("name=\"model\"")
                .body_includes("dall-e-2");
            then.status(200)
                .header("content-type", "application/json")
                .body(openai_url_body("https://img.example/edited.png"));
        })
        .await;
    // Any request here would mean the text-only model was launched anyway.
    let generations_mock = openai
        .mock_async(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(500).body("unexpected");
        })
        .await;
    let gemini_mock = google
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash-image-preview:generateContent")
                .body_includes("Generate the edited image: add a hat")
                .body_includes("inlineData");
            then.status(200)
                .header("content-type", "application/json")
                .body(gemini_inline_body());
        })
        .await;

    let orchestrator = orchestrator_against(&openai, &google);
    let intent = GenerationIntent::edit("add a hat", SourceImage::new("image/png", tiny_png()))?;
    orchestrator.generate_images(&intent).await?;

    edit_mock.assert_async().await;
    gemini_mock.assert_async().await;
    assert_eq!(generations_mock.hits_async().await, 0);

    let snapshot = orchestrator.snapshot();
    assert!(matches!(
        snapshot.run(ModelId::Dalle2),
        Some(RunState::Completed { .. })
    ));
    assert!(matches!(
        snapshot.run(ModelId::Gemini),
        Some(RunState::Completed { .. })
    ));
    // Not part of this run's task set: never left the reset state.
    assert_eq!(snapshot.run(ModelId::Dalle3), Some(&RunState::Waiting));
    Ok(())
}

#[tokio::test]
async fn one_failing_provider_does_not_stop_the_others() -> Result<()> {
    if triptych::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }
    let openai = MockServer::start_async().await;
    let google = MockServer::start_async().await;

    openai
        .mock_async(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(200)
                .header("content-type", "application/json")
                .body(openai_url_body("https://img.example/ok.png"));
        })
        .await;
    // Shape failure: parsed fine, but no inline image part anywhere.
    let gemini_mock = google
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash-image-preview:generateContent");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    serde_json::json!({
                        "candidates": [{ "content": { "parts": [{ "text": "nope" }] } }]
                    })
                    .to_string(),
                );
        })
        .await;

    let orchestrator = orchestrator_against(&openai, &google);
    let intent = GenerationIntent::text("a red fox")?;
    orchestrator.generate_images(&intent).await?;

    let snapshot = orchestrator.snapshot();
    assert!(matches!(
        snapshot.run(ModelId::Dalle2),
        Some(RunState::Completed { .. })
    ));
    assert!(matches!(
        snapshot.run(ModelId::Dalle3),
        Some(RunState::Completed { .. })
    ));
    match snapshot.run(ModelId::Gemini) {
        Some(RunState::Failed { error }) => {
            assert!(error.contains("no image data in response"), "{error}");
        }
        other => panic!("unexpected gemini state: {other:?}"),
    }
    // Shape failures are retried like transport failures before settling.
    assert_eq!(gemini_mock.hits_async().await, 2);
    Ok(())
}

#[tokio::test]
async fn quota_exhaustion_fails_without_a_second_attempt() -> Result<()> {
    if triptych::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }
    let openai = MockServer::start_async().await;
    let google = MockServer::start_async().await;

    let generations_mock = openai
        .mock_async(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(429)
                .body("You exceeded your current quota, please check your plan");
        })
        .await;
    google
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash-image-preview:generateContent");
            then.status(200)
                .header("content-type", "application/json")
                .body(gemini_inline_body());
        })
        .await;

    let orchestrator = orchestrator_against(&openai, &google);
    let intent = GenerationIntent::text("a red fox")?;
    orchestrator.generate_images(&intent).await?;

    let snapshot = orchestrator.snapshot();
    assert!(matches!(
        snapshot.run(ModelId::Dalle2),
        Some(RunState::Failed { .. })
    ));
    assert!(matches!(
        snapshot.run(ModelId::Gemini),
        Some(RunState::Completed { .. })
    ));
    // One request per OpenAI variant, no retries.
    assert_eq!(generations_mock.hits_async().await, 2);
    Ok(())
}

#[tokio::test]
async fn a_second_run_replaces_previous_results() -> Result<()> {
    if triptych::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }
    let openai = MockServer::start_async().await;
    let google = MockServer::start_async().await;

    openai
        .mock_async(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(200)
                .header("content-type", "application/json")
                .body(openai_url_body("https://img.example/run.png"));
        })
        .await;
    google
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash-image-preview:generateContent");
            then.status(200)
                .header("content-type", "application/json")
                .body(gemini_inline_body());
        })
        .await;

    let orchestrator = orchestrator_against(&openai, &google);

    let first = GenerationIntent::text("a red fox")?;
    orchestrator.generate_images(&first).await?;
    assert!(
        orchestrator
            .snapshot()
            .runs
            .values()
            .all(RunState::is_terminal)
    );

    let second = GenerationIntent::edit("add a hat", SourceImage::new("image/png", tiny_png()))?;
    // DALL-E 2's edit call fails (no mock for the edit endpoint), which must
    // not keep the stale completed result from the first run around.
    orchestrator.generate_images(&second).await?;

    let snapshot = orchestrator.snapshot();
    assert!(!snapshot.generating);
    assert!(matches!(
        snapshot.run(ModelId::Dalle2),
        Some(RunState::Failed { .. })
    ));
    assert_eq!(snapshot.run(ModelId::Dalle3), Some(&RunState::Waiting));
    assert!(matches!(
        snapshot.run(ModelId::Gemini),
        Some(RunState::Completed { .. })
    ));
    Ok(())
}
