use chat_export_rust::export::{ExportFormat, ExportRequest, export};
use chat_export_rust::render::layout::{header_height, layout_document};
use chat_export_rust::render::{ApproxMeasure, CancellationToken, FontSource, NeverCancelled, NoProgress};
use chat_export_rust::style::{Backend, StyleOverride, resolve_style};
use chat_export_rust::timestamp::DefaultTimestampFormatter;
use chat_export_rust::{Agent, Conversation, ExportError, Message};

const CONVERSATION: &str = r##"{
  "agents": [
    { "id": "alice", "name": "Alice", "color": "#3B82F6", "model": "llama2" },
    { "id": "bob", "name": "Bob", "color": "#10B981", "model": "mistral", "originalName": "Robert" }
  ],
  "messages": [
    { "id": "m1", "agentId": "alice", "content": "Hello **world**", "timestamp": "2024-05-01T10:00:00Z" },
    { "id": "m2", "agentId": "bob", "content": "Hi", "timestamp": "2024-05-01T10:01:00Z" }
  ]
}"##;

fn conversation() -> Conversation {
    serde_json::from_str(CONVERSATION).expect("conversation fixture")
}

fn request<'a>(
    conversation: &'a Conversation,
    style: &'a StyleOverride,
) -> ExportRequest<'a, [Agent]> {
    ExportRequest {
        name: "standup",
        title: "Standup",
        messages: &conversation.messages,
        agents: conversation.agents.as_slice(),
        style,
        formatter: &DefaultTimestampFormatter,
        font_source: FontSource::Approximate,
    }
}

#[test]
fn json_export_is_a_literal_dump() {
    let conversation = conversation();
    let style = StyleOverride::default();
    let file = export(
        &request(&conversation, &style),
        ExportFormat::Json,
        &NeverCancelled,
        &mut NoProgress,
    )
    .expect("json export");
    assert_eq!(file.file_name, "standup.json");
    assert_eq!(file.mime, "application/json");

    let value: serde_json::Value = serde_json::from_slice(&file.bytes).expect("valid json");
    let entries = value["messages"].as_array().expect("messages array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["agent"]["name"], "Alice");
    assert_eq!(entries[1]["agent"]["name"], "Bob");
    assert_eq!(entries[0]["content"], "Hello **world**");
    assert_eq!(entries[1]["content"], "Hi");
}

#[test]
fn png_matches_predicted_layout() {
    let conversation = conversation();
    let overrides = StyleOverride::default();
    let mut reports = Vec::new();
    let mut sink = |percent: f32| reports.push(percent);
    let file = export(
        &request(&conversation, &overrides),
        ExportFormat::Png,
        &NeverCancelled,
        &mut sink,
    )
    .expect("png export");
    assert_eq!(reports, vec![50.0, 100.0]);
    assert_eq!(file.file_name, "standup.png");
    assert_eq!(file.warnings.len(), 1);
    assert!(file.warnings[0].contains("text was not painted"));

    let style = resolve_style(&overrides, Backend::Raster);
    let layout = layout_document(
        &conversation.messages,
        conversation.agents.as_slice(),
        &style,
        &ApproxMeasure,
        &DefaultTimestampFormatter,
    );
    let line_height = style.line_height();
    let expected_height = 2.0 * style.padding
        + 2.0 * (header_height(&style) + 8.0 + 2.0 * style.padding + line_height)
        + 16.0;
    assert!((layout.size.height - expected_height).abs() < 1e-3);

    let image = image::load_from_memory_with_format(&file.bytes, image::ImageFormat::Png)
        .expect("decodable png");
    assert_eq!(image.width(), 1600);
    assert_eq!(image.height(), (layout.size.height * 2.0).ceil() as u32);
}

#[test]
fn svg_renders_with_theme_background() {
    let conversation = conversation();
    let style = StyleOverride {
        theme: Some("light".to_string()),
        ..StyleOverride::default()
    };
    let file = export(
        &request(&conversation, &style),
        ExportFormat::Svg,
        &NeverCancelled,
        &mut NoProgress,
    )
    .expect("svg export");
    assert_eq!(file.mime, "image/svg+xml");
    assert!(file.warnings.is_empty());
    let svg = String::from_utf8(file.bytes).expect("utf8");

    let tree = resvg::usvg::Tree::from_str(&svg, &resvg::usvg::Options::default())
        .expect("parseable svg");
    let size = tree.size().to_int_size();
    assert_eq!(size.width(), 800);
    let mut pixmap =
        resvg::tiny_skia::Pixmap::new(size.width(), size.height()).expect("pixmap");
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::default(),
        &mut pixmap.as_mut(),
    );
    let corner = pixmap.pixel(1, 1).expect("corner pixel");
    assert_eq!(
        (corner.red(), corner.green(), corner.blue()),
        (0xff, 0xff, 0xff)
    );
}

#[test]
fn cancelled_token_rejects_both_image_formats() {
    let conversation = conversation();
    let style = StyleOverride::default();
    let token = CancellationToken::new();
    token.cancel();
    for format in [ExportFormat::Png, ExportFormat::Svg] {
        let mut reports = 0usize;
        let mut sink = |_: f32| reports += 1;
        let err = export(&request(&conversation, &style), format, &token, &mut sink)
            .expect_err("cancelled export");
        assert!(matches!(err, ExportError::Cancelled), "{format}: {err}");
        assert!(err.is_cancelled());
        assert_eq!(reports, 0, "{format} reported progress");
    }
}

#[test]
fn cancelling_mid_render_stops_after_painted_messages() {
    let mut conversation = conversation();
    let extra: Vec<Message> = (0..6)
        .map(|idx| Message {
            id: format!("x{idx}"),
            agent_id: if idx % 2 == 0 { "alice" } else { "bob" }.to_string(),
            content: format!("follow-up {idx}"),
            timestamp: "2024-05-01T10:05:00Z".to_string(),
        })
        .collect();
    conversation.messages.extend(extra);
    let style = StyleOverride::default();
    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut reports = Vec::new();
    let mut sink = |percent: f32| {
        reports.push(percent);
        if reports.len() == 3 {
            trigger.cancel();
        }
    };
    let err = export(
        &request(&conversation, &style),
        ExportFormat::Png,
        &token,
        &mut sink,
    )
    .expect_err("cancelled export");
    assert!(err.is_cancelled());
    assert_eq!(reports, vec![12.5, 25.0, 37.5]);
}

#[test]
fn rendering_failures_name_the_format() {
    let conversation = conversation();
    let style = StyleOverride {
        scale: Some(1.0e6),
        ..StyleOverride::default()
    };
    let err = export(
        &request(&conversation, &style),
        ExportFormat::Png,
        &NeverCancelled,
        &mut NoProgress,
    )
    .expect_err("surface too large");
    assert!(!err.is_cancelled());
    let message = err.to_string();
    assert!(message.starts_with("failed to export PNG:"), "{message}");
    assert!(message.contains("rendering surface unavailable"), "{message}");
}

#[test]
fn transcripts_use_their_extensions() {
    let conversation = conversation();
    let style = StyleOverride::default();
    let dir = tempfile::tempdir().expect("tempdir");
    for (format, expected) in [
        (ExportFormat::Markdown, "standup.md"),
        (ExportFormat::Text, "standup.txt"),
    ] {
        let file = export(
            &request(&conversation, &style),
            format,
            &NeverCancelled,
            &mut NoProgress,
        )
        .expect("transcript export");
        let path = file.save(dir.path()).expect("save");
        assert!(path.ends_with(expected));
        let saved = std::fs::read_to_string(&path).expect("read back");
        assert!(saved.contains("Bob (originally Robert)"));
        assert!(saved.contains("Hello **world**"));
    }
}
