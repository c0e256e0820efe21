use image::{GrayImage, Luma};
use windowscan::{
    Cascade, CascadeParams, Detection, DetectorConfig, Record, Rect, Size,
    SlidingWindowDetector, Template,
};

const OBJECT: Rect = Rect::new(16, 16, 8, 8);

fn edge(bright: u8, dark: u8) -> GrayImage {
    GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { bright } else { dark }]))
}

fn flat(w: u32, h: u32, v: u8) -> GrayImage { GrayImage::from_pixel(w, h, Luma([v])) }

/// A uniform scene with one edge object pasted in
fn scene() -> GrayImage {
    let mut img = flat(48, 48, 100);
    image::imageops::replace(&mut img, &edge(220, 30), OBJECT.x as i64, OBJECT.y as i64);
    img
}

fn training_templates() -> Vec<Template> {
    let mut out = Vec::new();
    for (b, d) in [(220, 30), (200, 60), (180, 20), (240, 90)] {
        out.push(Template::new("object").with_image(edge(b, d)).with_label(1.0));
    }
    let mut background = Template::new("background");
    for v in [0, 60, 100, 160, 250] {
        background = background.with_image(flat(8, 8, v));
    }
    let horizontal =
        GrayImage::from_fn(8, 8, |_, y| Luma([if y < 4 { 220 } else { 30 }]));
    background = background.with_image(edge(30, 220)).with_image(horizontal);
    out.push(background);
    out
}

fn config() -> DetectorConfig {
    DetectorConfig {
        min_size: 8,
        max_size: 8,
        scale_factor: 1.2,
        min_neighbors: 1,
        eps: 0.2,
    }
}

fn trained_detector() -> SlidingWindowDetector<Cascade> {
    let params = CascadeParams {
        num_stages: 3,
        min_hit_rate: 1.0,
        feature_step: 2,
        ..Default::default()
    };
    let cascade = Cascade::new(Size::square(8), params);
    let mut det = SlidingWindowDetector::new(cascade, config()).unwrap();
    det.train(&training_templates()).unwrap();
    det
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
}

#[test]
fn finds_the_object_in_a_scene() {
    let det = trained_detector();
    let found = det.detect(&scene()).unwrap();
    assert!(!found.is_empty());
    for d in &found {
        assert!(overlaps(&d.rect, &OBJECT), "{} misses the object", d.rect);
        assert!(d.confidence >= 1.0);
    }
}

#[test]
fn blank_scene_falls_back_to_whole_image() {
    let det = trained_detector();
    let found = det.detect_image(&flat(48, 40, 100), false).unwrap();
    assert_eq!(found, vec![Detection { rect: Rect::new(0, 0, 48, 40), confidence: 1.0 }]);
    assert!(det.detect_image(&flat(48, 40, 100), true).unwrap().is_empty());
}

#[test]
fn stored_model_detects_the_same() {
    let dir = tempfile::tempdir().unwrap();
    let det = trained_detector();
    assert!(det.store(dir.path()).unwrap().is_written());

    let blank = Cascade::new(Size::square(24), CascadeParams::default());
    let mut restored = SlidingWindowDetector::new(blank, config()).unwrap();
    assert!(restored.load(dir.path()).unwrap().is_loaded());

    assert_eq!(restored.detect(&scene()).unwrap(), det.detect(&scene()).unwrap());
}

#[test]
fn missing_model_leaves_classifier_untrained() {
    let dir = tempfile::tempdir().unwrap();
    let cascade = Cascade::new(Size::square(8), CascadeParams::default());
    let mut det = SlidingWindowDetector::new(cascade, config()).unwrap();
    assert!(!det.load(&dir.path().join("nowhere")).unwrap().is_loaded());
    assert!(!det.classifier().is_trained());
    assert!(det.detect(&scene()).is_err());
}

#[test]
fn batch_projection_matches_sequential() {
    let det = trained_detector();
    let templates = vec![
        Template::new("scene").with_image(scene()),
        Template::new("empty"),
        Template::new("blank").with_image(flat(32, 32, 100)),
        Template::new("both")
            .with_image(scene())
            .with_image(flat(20, 20, 0))
            .with_enroll_all(true),
    ];
    let sequential = det.project(&templates).unwrap();
    let parallel = det.project_batch(&templates).unwrap();
    assert_eq!(sequential, parallel);

    assert!(matches!(&sequential[..], [Record::Detection(_), ..]));
    assert!(sequential
        .iter()
        .any(|r| matches!(r, Record::PassThrough(t) if t.source == "empty")));
    let blank: Vec<_> = sequential
        .iter()
        .filter_map(Record::detection)
        .filter(|d| d.source == "blank")
        .collect();
    assert_eq!(blank.len(), 1);
    assert_eq!(blank[0].rect, Rect::new(0, 0, 32, 32));
    assert!(sequential
        .iter()
        .filter_map(Record::detection)
        .filter(|d| d.source == "both")
        .all(|d| d.image == 0));
}
