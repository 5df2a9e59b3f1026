//! End-to-end tests from frame files on disk to labeled clips


use expression_clips::{
    augment::{AugmentFrames, ClipTransform},
    clip::ClipAssembler,
    config::{ClipConfig, Config, PreprocessConfig},
    constants::{IMAGENET_MEAN, IMAGENET_STD},
    dataset::ClipDataset,
    dataset_index::index_directory,
    face_detection::NullDetector,
    normalizer::FrameNormalizer,
    Error,
};
use image::{Rgb, RgbImage};
use ndarray::{s, Axis};
use std::sync::Arc;
use test_helpers::{frame_color, write_frame, write_video, CenterFaceDetector, StubFactory};

fn dataset_for(root: &std::path::Path, transform: Option<Arc<dyn ClipTransform>>) -> ClipDataset {
    ClipDataset::new(
        index_directory(root).unwrap(),
        ClipConfig::default(),
        PreprocessConfig::default(),
        Arc::new(StubFactory::default()),
        transform,
    )
    .unwrap()
}

#[test]
fn test_short_video_is_padded_with_last_frame() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Happy", "vid1", 5);

    let videos = index_directory(dir.path()).unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos.groups[0].video_id, "vid1");
    assert_eq!(videos.groups[0].frames.len(), 5);
    assert_eq!(videos.labels, vec![1]);

    let dataset = dataset_for(dir.path(), None);
    let example = dataset.get(0).unwrap();
    assert_eq!(example.label, 1);
    assert_eq!(example.clip.shape(), &[3, 10, 112, 112]);

    // Frames keep their order, then frame 4 repeats
    for t in 0..10 {
        let expected = frame_color(t.min(4) as u8);
        for ch in 0..3 {
            let value = example.clip[[ch, t, 56, 56]];
            assert!((value - f32::from(expected[ch]) / 255.0).abs() < 1e-6);
        }
    }
    let last = example.clip.slice(s![.., 4, .., ..]);
    for t in 5..10 {
        assert_eq!(example.clip.slice(s![.., t, .., ..]), last);
    }
}

#[test]
fn test_long_video_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Sad", "long", 14);

    let example = dataset_for(dir.path(), None).get(0).unwrap();
    assert_eq!(example.label, 3);
    assert_eq!(example.clip.len_of(Axis(1)), 10);
    let expected = frame_color(9);
    assert!((example.clip[[0, 9, 0, 0]] - f32::from(expected[0]) / 255.0).abs() < 1e-6);
}

#[test]
fn test_unreadable_frames_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let label_dir = dir.path().join("Fear");
    write_frame(&label_dir, "vid_000.png", [10, 20, 30]);
    std::fs::write(label_dir.join("vid_001.png"), b"not a png").unwrap();
    std::fs::write(label_dir.join("vid_002.txt"), b"notes").unwrap();
    write_frame(&label_dir, "vid_003.png", [40, 50, 60]);

    let example = dataset_for(dir.path(), None).get(0).unwrap();
    assert_eq!(example.clip.shape(), &[3, 10, 112, 112]);
    assert!((example.clip[[0, 1, 0, 0]] - 40.0 / 255.0).abs() < 1e-6);
    assert!((example.clip[[2, 9, 0, 0]] - 60.0 / 255.0).abs() < 1e-6);
}

#[test]
fn test_video_without_readable_frames_is_empty_clip() {
    let dir = tempfile::tempdir().unwrap();
    let label_dir = dir.path().join("Angry");
    std::fs::create_dir_all(&label_dir).unwrap();
    std::fs::write(label_dir.join("broken_000.png"), b"garbage").unwrap();

    let err = dataset_for(dir.path(), None).get(0).unwrap_err();
    assert!(matches!(err, Error::EmptyClip { frames: 1 }));
}

#[test]
fn test_zero_faces_yields_full_frame() {
    let image = RgbImage::from_fn(64, 48, |x, _| if x < 32 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
    let mut normalizer = FrameNormalizer::new(Box::new(NullDetector), None, PreprocessConfig::default(), (112, 112));

    let frame = normalizer.process(&image).unwrap();
    assert!(frame.face.is_none());
    assert_eq!(frame.pixels.shape(), &[112, 112, 3]);
    assert!(frame.pixels.iter().all(|v| (0.0..=1.0).contains(v)));
    // Both halves survive: nothing was cropped away
    assert!(frame.pixels[[56, 0, 0]] > 0.9);
    assert!(frame.pixels[[56, 111, 2]] > 0.9);
}

#[test]
fn test_detected_face_is_cropped() {
    // Red border, white center
    let image = RgbImage::from_fn(100, 100, |x, y| {
        if (20..80).contains(&x) && (20..80).contains(&y) {
            Rgb([255, 255, 255])
        } else {
            Rgb([255, 0, 0])
        }
    });
    let mut normalizer =
        FrameNormalizer::new(Box::new(CenterFaceDetector), None, PreprocessConfig::default(), (112, 112));

    let frame = normalizer.process(&image).unwrap();
    let face = frame.face.unwrap();
    // Central box (25..75) grown by 5px per margin
    assert_eq!((face.x, face.y, face.width, face.height), (20, 20, 60, 60));
    assert_eq!(frame.pixels.shape(), &[112, 112, 3]);
    // The crop is all white, so the red border is gone
    assert!(frame.pixels[[56, 56, 1]] > 0.99);
    assert!(frame.pixels[[56, 0, 1]] > 0.9);
}

#[test]
fn test_assembler_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_frame(dir.path(), "still.png", [1, 2, 3]);
    let mut assembler = ClipAssembler::new(FrameNormalizer::default(), 4);

    let clip = assembler.assemble_file(&path).unwrap();
    assert_eq!(clip.frames().shape(), &[4, 112, 112, 3]);
    assert_eq!(clip.frame(0), clip.frame(3));
}

#[test]
fn test_transform_produces_normalized_channel_first_clip() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Neutral", "v", 3);

    let transform: Arc<dyn ClipTransform> = Arc::new(AugmentFrames::normalize_only());
    let example = dataset_for(dir.path(), Some(transform)).get(0).unwrap();
    assert_eq!(example.clip.shape(), &[3, 10, 112, 112]);
    assert_eq!(example.label, 2);

    let color = frame_color(0);
    for ch in 0..3 {
        let expected = (f32::from(color[ch]) / 255.0 - IMAGENET_MEAN[ch]) / IMAGENET_STD[ch];
        assert!((example.clip[[ch, 0, 10, 10]] - expected).abs() < 1e-4);
    }
}

#[test]
fn test_augmented_clip_shape() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Surprise", "v", 2);

    let transform: Arc<dyn ClipTransform> = Arc::new(AugmentFrames::default());
    let example = dataset_for(dir.path(), Some(transform)).get(0).unwrap();
    assert_eq!(example.clip.shape(), &[3, 10, 112, 112]);
    assert!(example.clip.iter().all(|v| v.is_finite()));
}

#[test]
fn test_disabled_augmentation_keeps_raw_clip() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Fear", "v", 2);

    let mut config = Config::default();
    config.augment.enabled = false;
    let example = dataset_for(dir.path(), config.train_transform()).get(0).unwrap();

    // Plain [0, 1] pixels, no ImageNet normalization
    let color = frame_color(1);
    for ch in 0..3 {
        assert!((example.clip[[ch, 1, 30, 30]] - f32::from(color[ch]) / 255.0).abs() < 1e-6);
    }
}
