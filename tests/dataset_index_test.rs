//! Dataset indexing and splitting against real directory trees


use expression_clips::{
    constants::UNLABELED,
    dataset_index::{index_directory, split_dataset, train_val_split},
    Error,
};
use test_helpers::{write_frame, write_video};

#[test]
fn test_groups_frames_by_video_id() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Happy", "vid2", 3);
    write_video(dir.path(), "Happy", "vid1", 2);
    write_video(dir.path(), "Angry", "clip_a", 4);

    let videos = index_directory(dir.path()).unwrap();
    // Label folders sorted, videos in sorted filename order
    let ids: Vec<&str> = videos.groups.iter().map(|g| g.video_id.as_str()).collect();
    assert_eq!(ids, vec!["clip_a", "vid1", "vid2"]);
    assert_eq!(videos.labels, vec![0, 1, 1]);
    assert_eq!(videos.groups[0].frames.len(), 4);
    assert_eq!(videos.groups[2].frames.len(), 3);

    for group in &videos.groups {
        let mut sorted = group.frames.clone();
        sorted.sort();
        assert_eq!(group.frames, sorted);
        let parent = group.frames[0].parent().unwrap();
        assert!(group.frames.iter().all(|f| f.parent() == Some(parent)));
    }
}

#[test]
fn test_unknown_label_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_video(dir.path(), "Contempt", "v", 2);
    write_video(dir.path(), "Disgust", "w", 1);

    let videos = index_directory(dir.path()).unwrap();
    assert_eq!(videos.labels, vec![UNLABELED, 6]);

    let labeled = videos.without_unlabeled();
    assert_eq!(labeled.len(), 1);
    assert_eq!(labeled.groups[0].video_id, "w");
}

#[test]
fn test_missing_root_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = index_directory(dir.path().join("missing"));
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn test_empty_directories() {
    let dir = tempfile::tempdir().unwrap();
    assert!(index_directory(dir.path()).unwrap().is_empty());

    std::fs::create_dir_all(dir.path().join("Sad")).unwrap();
    assert!(index_directory(dir.path()).unwrap().is_empty());
}

#[test]
fn test_stray_files_at_root_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), "loose_000.png", [0, 0, 0]);
    write_video(dir.path(), "Neutral", "n", 1);

    let videos = index_directory(dir.path()).unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos.labels, vec![2]);
}

#[test]
fn test_name_without_underscore_is_its_own_video() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(&dir.path().join("Sad"), "portrait.png", [9, 9, 9]);

    let videos = index_directory(dir.path()).unwrap();
    assert_eq!(videos.groups[0].video_id, "portrait");
}

#[test]
fn test_split_dataset() {
    let train = tempfile::tempdir().unwrap();
    let test = tempfile::tempdir().unwrap();
    for i in 0..10 {
        write_video(train.path(), "Happy", &format!("t{i}"), 1);
    }
    write_video(test.path(), "Sad", "x", 2);

    let split = split_dataset(train.path(), test.path(), 0.2, 42).unwrap();
    assert_eq!(split.train.len(), 8);
    assert_eq!(split.val.len(), 2);
    assert_eq!(split.test.len(), 1);
    assert_eq!(split.test.labels, vec![3]);

    let again = split_dataset(train.path(), test.path(), 0.2, 42).unwrap();
    assert_eq!(split.train, again.train);
    assert_eq!(split.val, again.val);
}

#[test]
fn test_different_seeds_can_differ() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        write_video(dir.path(), "Fear", &format!("f{i:02}"), 1);
    }
    let videos = index_directory(dir.path()).unwrap();

    let val_sets: Vec<Vec<String>> = (0..5u64)
        .map(|seed| {
            let (_, val) = train_val_split(&videos, 0.25, seed).unwrap();
            let mut ids: Vec<String> = val.groups.into_iter().map(|g| g.video_id).collect();
            ids.sort();
            ids
        })
        .collect();
    assert!(val_sets.iter().all(|ids| ids.len() == 5));
    assert!(val_sets.windows(2).any(|w| w[0] != w[1]));
}
