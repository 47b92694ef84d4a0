mod support;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use creaclips::models::request::{ClipRequest, ClipStrategy, SourceType};
use creaclips::services::context::PipelineContext;
use creaclips::services::pipeline::{PipelineError, PipelineExecutor, ProgressSink};
use support::{defaults, stages, FakeMedia};

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(f64, String)>>,
}

impl ProgressSink for RecordingSink {
    fn report(&self, progress: f64, message: &str) {
        self.reports.lock().push((progress, message.to_string()));
    }
}

impl RecordingSink {
    fn values(&self) -> Vec<f64> {
        self.reports.lock().iter().map(|(p, _)| *p).collect()
    }

    fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

async fn context(root: &std::path::Path, request: ClipRequest) -> PipelineContext {
    let ctx = PipelineContext::new(Uuid::new_v4(), request, root, CancellationToken::new());
    ctx.ensure_dirs().await.unwrap();
    ctx
}

fn interval_request() -> ClipRequest {
    let mut request = ClipRequest::remote(SourceType::Url, "https://cdn.example.com/talk.mp4");
    request.clip_strategy = ClipStrategy::Interval;
    request
}

#[tokio::test]
async fn test_progress_reports_follow_stage_order() {
    let dir = tempfile::tempdir().unwrap();
    let executor = PipelineExecutor::new(stages(Arc::new(FakeMedia::silent_video(30.0))), defaults());
    let ctx = context(dir.path(), interval_request()).await;
    let sink = RecordingSink::default();

    let outputs = executor.run(&ctx, &sink).await.unwrap();
    assert_eq!(outputs.len(), 3);

    let values = sink.values();
    assert_eq!(values.first().copied(), Some(0.05));
    assert_eq!(values.last().copied(), Some(1.0));
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);

    let messages = sink.messages();
    assert!(messages.contains(&"Clip 1/3 exported.".to_string()));
    assert!(messages.contains(&"Clip 3/3 exported.".to_string()));
}

#[tokio::test]
async fn test_outputs_are_ordered_by_clip_index() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeMedia::with_loud_ranges(90.0, &[(70.0, 80.0), (5.0, 10.0)]));
    let executor = PipelineExecutor::new(stages(fake), defaults());
    let ctx = context(dir.path(), ClipRequest::remote(SourceType::Youtube, "https://youtu.be/x")).await;

    let outputs = executor.run(&ctx, &RecordingSink::default()).await.unwrap();
    let indices: Vec<usize> = outputs.iter().map(|o| o.clip_index).collect();
    assert_eq!(indices, vec![1, 2, 3]);

    let first = std::fs::read_to_string(&outputs[0].video_path).unwrap();
    assert_eq!(first, "5.0-15.0");
}

#[tokio::test]
async fn test_subtitles_written_only_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let executor = PipelineExecutor::new(stages(Arc::new(FakeMedia::silent_video(10.0))), defaults());

    let ctx = context(dir.path(), interval_request()).await;
    let outputs = executor.run(&ctx, &RecordingSink::default()).await.unwrap();
    assert!(ctx.subtitle_path(1).exists());
    assert_eq!(outputs[0].subtitle_path.as_deref(), Some(ctx.subtitle_path(1).as_path()));

    let mut request = interval_request();
    request.generate_subtitles = false;
    let ctx = context(dir.path(), request).await;
    let outputs = executor.run(&ctx, &RecordingSink::default()).await.unwrap();
    assert!(!ctx.subtitle_path(1).exists());
    assert!(outputs[0].subtitle_path.is_none());
}

#[tokio::test]
async fn test_cancelled_context_stops_before_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let executor = PipelineExecutor::new(stages(Arc::new(FakeMedia::silent_video(30.0))), defaults());
    let ctx = context(dir.path(), interval_request()).await;
    ctx.cancel.cancel();
    let sink = RecordingSink::default();

    let err = executor.run(&ctx, &sink).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert!(sink.values().is_empty());
}

#[tokio::test]
async fn test_missing_audio_is_a_selection_error() {
    let dir = tempfile::tempdir().unwrap();
    let executor = PipelineExecutor::new(stages(Arc::new(FakeMedia::silent_video(30.0))), defaults());
    let ctx = context(dir.path(), ClipRequest::remote(SourceType::Youtube, "https://youtu.be/x")).await;

    let err = executor.run(&ctx, &RecordingSink::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Selection(_)));
}
