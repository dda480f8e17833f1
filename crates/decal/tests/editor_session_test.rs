//! Integration tests for an editing session: build a design through the
//! editor, interact with it, then export and save it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use decal::{
    Decal,
    config::AppConfig,
    design::Design,
    editor::{Editor, TextStyle},
    export::{ExportFormat, ResolutionScale},
    geometry::Point,
    image_ref::ImageReference,
    layer::{LayerKind, ShapeKind},
    persist::{DesignStore, SaveError, SaveReceipt, SaveRequest, SavedDesign, StoreError},
    resolve::{FetchError, FetchMode, FetchedImage, ImageFetcher},
};

struct UnreachableFetcher;

#[async_trait]
impl ImageFetcher for UnreachableFetcher {
    async fn fetch(&self, _url: &Url, _mode: FetchMode) -> Result<FetchedImage, FetchError> {
        Err(FetchError::Transport("connection refused".to_string()))
    }
}

#[derive(Default)]
struct RecordingStore {
    requests: Mutex<Vec<SaveRequest>>,
}

#[async_trait]
impl DesignStore for RecordingStore {
    async fn save(&self, request: &SaveRequest) -> Result<SaveReceipt, StoreError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(SaveReceipt::new("saved-1"))
    }
}

fn editor() -> Editor {
    let decal = Decal::with_fetcher(AppConfig::default(), Arc::new(UnreachableFetcher)).unwrap();
    decal.editor(Design::default()).unwrap()
}

#[tokio::test]
async fn test_click_selects_topmost_layer() {
    let mut editor = editor();
    let below = editor
        .add_shape(ShapeKind::Rectangle, 200.0, 200.0, "#000000")
        .unwrap();
    let above = editor
        .add_shape(ShapeKind::Circle, 100.0, 100.0, "#ff0000")
        .unwrap();
    editor.render_preview().await.unwrap();

    // Both start at the insert position; the later layer wins.
    assert_eq!(editor.pointer_down(Point::new(60.0, 60.0)), Some(above.clone()));
    editor.pointer_up();

    // Outside the circle's box, only the rectangle remains.
    assert_eq!(editor.pointer_down(Point::new(200.0, 200.0)), Some(below));
    editor.pointer_up();

    // Empty canvas clears the selection.
    assert_eq!(editor.pointer_down(Point::new(700.0, 500.0)), None);
    assert!(editor.selected().is_none());
}

#[tokio::test]
async fn test_preview_draws_selection_and_export_does_not() {
    let mut editor = editor();
    editor
        .add_shape(ShapeKind::Rectangle, 40.0, 40.0, "#00ff00")
        .unwrap();
    editor.render_preview().await.unwrap();

    let preview = editor.preview().to_rgba_image().unwrap();
    // The dashed outline runs 5px outside the layer, starting with a dash.
    let outline = preview.get_pixel(47, 45).0;
    assert!(outline[2] > outline[0], "expected blue outline, got {outline:?}");

    let artifact = editor
        .export(ExportFormat::Png, ResolutionScale::Standard)
        .await
        .unwrap();
    let exported = image::load_from_memory(artifact.bytes()).unwrap().to_rgba8();
    assert_eq!(exported.get_pixel(47, 45).0, [255, 255, 255, 255]);
    assert_eq!(exported.get_pixel(60, 60).0, [0, 255, 0, 255]);
}

#[tokio::test]
async fn test_save_redacts_remote_images_and_loads_back() {
    let mut editor = editor();
    editor.add_text("HELLO", TextStyle::default()).unwrap();
    editor
        .add_image_src("https://storage.googleapis.com/bucket/art/logo.png?alt=media", 80, 80)
        .unwrap();
    editor.set_base_image(Some(ImageReference::parse("/images/tee.png")));
    let before = editor.design().clone();

    let store = RecordingStore::default();
    let outcome = editor.save(&store, Some("tee")).await.unwrap();
    assert_eq!(outcome.receipt().id(), "saved-1");
    assert_eq!(editor.design(), &before);

    let request = store.requests.lock().unwrap().remove(0);
    assert!(request.preview().starts_with("data:image/png;base64,"));

    let json = request.design().to_json().unwrap();
    assert!(json.contains("[EXTERNAL:logo.png]"));
    assert!(!json.contains("storage.googleapis.com"));

    let loaded = SavedDesign::from_json(&json).unwrap().into_design().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.layers()[0].id(), before.layers()[0].id());
    match loaded.layers()[1].kind() {
        LayerKind::Image(image) => assert_eq!(image.src(), "[EXTERNAL:logo.png]"),
        other => panic!("expected image layer, got {other:?}"),
    }

    // A reloaded design still previews; the redacted image is a placeholder.
    let decal = Decal::with_fetcher(AppConfig::default(), Arc::new(UnreachableFetcher)).unwrap();
    let mut reopened = decal.editor(loaded).unwrap();
    assert!(reopened.render_preview().await.unwrap());
}

#[tokio::test]
async fn test_saving_an_emptied_design_never_reaches_the_store() {
    let mut editor = editor();
    editor.add_text("SOON GONE", TextStyle::default()).unwrap();
    editor.reset();

    let store = RecordingStore::default();
    let err = editor.save(&store, None).await.unwrap_err();
    assert!(matches!(err, SaveError::EmptyDesign));
    assert!(store.requests.lock().unwrap().is_empty());
}
