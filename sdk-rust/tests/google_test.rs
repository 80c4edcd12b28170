use futures::StreamExt;
use logicleap_sdk::{
    google::{GoogleModel, GoogleModelOptions},
    LanguageModel, LanguageModelError, LanguageModelInput, ModelUsage, Part,
    PartialModelResponse,
};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

/// A captured request: headers and the JSON body.
struct CapturedRequest {
    head: String,
    body: Value,
}

/// Serve exactly one HTTP response on a local port and report the request.
async fn serve_once(
    status_line: &'static str,
    content_type: &'static str,
    body: String,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let content_length: usize = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())?
            })
            .unwrap_or(0);
        while buffer.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            buffer.extend_from_slice(&chunk[..n]);
        }
        let request_body =
            serde_json::from_slice(&buffer[header_end..header_end + content_length])
                .unwrap_or(Value::Null);

        let response = format!(
            "{status_line}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n{body}"
        );
        let _ = tx.send(CapturedRequest {
            head,
            body: request_body,
        });
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    (base_url, rx)
}

fn sse(chunks: &[Value]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("data: {chunk}\r\n\r\n"))
        .collect()
}

fn model(base_url: String) -> GoogleModel {
    GoogleModel::new(
        "gemini-2.5-flash",
        GoogleModelOptions {
            api_key: "test-key".to_string(),
            base_url: Some(base_url),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn streams_text_fragments_then_usage() {
    let (base_url, request) = serve_once(
        "HTTP/1.1 200 OK",
        "text/event-stream",
        sse(&[
            json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": "```bash\n" }] } }] }),
            json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": "df -h\n```" }] } }],
                    "usageMetadata": { "promptTokenCount": 20, "candidatesTokenCount": 5 } }),
            json!({ "candidates": [{ "content": { "role": "model", "parts": [] }, "finishReason": "STOP" }],
                    "usageMetadata": { "promptTokenCount": 20, "candidatesTokenCount": 8 } }),
        ]),
    )
    .await;

    let stream = model(base_url)
        .stream(LanguageModelInput {
            content: vec![Part::text("disk usage"), Part::image("aGVsbG8=", "image/png")],
            ..Default::default()
        })
        .await
        .unwrap();
    let partials: Vec<PartialModelResponse> = stream
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(
        partials,
        vec![
            PartialModelResponse::text("```bash\n"),
            PartialModelResponse::text("df -h\n```"),
            PartialModelResponse::usage(ModelUsage {
                input_tokens: 20,
                output_tokens: 8,
            }),
        ]
    );

    let request = request.await.unwrap();
    assert!(request
        .head
        .starts_with("POST /v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse "));
    assert!(request.head.to_lowercase().contains("x-goog-api-key: test-key"));
    assert_eq!(
        request.body,
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": "disk usage" },
                    { "inlineData": { "data": "aGVsbG8=", "mimeType": "image/png" } }
                ]
            }]
        })
    );
}

#[tokio::test]
async fn non_success_status_fails_before_streaming() {
    let (base_url, _request) = serve_once(
        "HTTP/1.1 403 Forbidden",
        "application/json",
        json!({ "error": { "message": "API key not valid" } }).to_string(),
    )
    .await;

    let error = model(base_url)
        .stream(LanguageModelInput {
            content: vec![Part::text("hi")],
            ..Default::default()
        })
        .await
        .err()
        .unwrap();

    match error {
        LanguageModelError::StatusCode(status, body) => {
            assert_eq!(status.as_u16(), 403);
            assert!(body.contains("API key not valid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_chunk_breaks_stream_after_earlier_text() {
    let (base_url, _request) = serve_once(
        "HTTP/1.1 200 OK",
        "text/event-stream",
        format!(
            "{}data: {{not json\r\n\r\n",
            sse(&[json!({ "candidates": [{ "content": { "parts": [{ "text": "partial" }] } }] })])
        ),
    )
    .await;

    let items: Vec<_> = model(base_url)
        .stream(LanguageModelInput {
            content: vec![Part::text("hi")],
            ..Default::default()
        })
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().delta_text(), "partial");
    assert!(matches!(
        items[1],
        Err(LanguageModelError::Invariant("google", _))
    ));
}
