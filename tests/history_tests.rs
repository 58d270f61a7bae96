//! Store + HistoryIndex integration tests

use std::fs;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use clipit::entry::parse_timestamp;
use clipit::{
    Capture, ClipboardContent, ClipboardError, ClipboardPoller, ClipboardSource, HistoryIndex, PngImage, Store,
};

fn at(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn open_store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

fn append_text(store: &Store, when: &str, text: &str) {
    store
        .append(&Capture {
            captured_at: at(when),
            content: ClipboardContent::Text(text.to_string()),
        })
        .unwrap();
}

fn checkerboard() -> PngImage {
    let mut rgba = Vec::new();
    for y in 0..8u32 {
        for x in 0..8u32 {
            let pixel: [u8; 4] = if (x + y) % 2 == 0 { [255, 0, 0, 255] } else { [0, 0, 255, 255] };
            rgba.extend_from_slice(&pixel);
        }
    }
    PngImage::from_rgba(8, 8, rgba).unwrap()
}

fn append_image(store: &Store, when: &str, image: &PngImage) {
    store
        .append(&Capture {
            captured_at: at(when),
            content: ClipboardContent::Image(image.clone()),
        })
        .unwrap();
}

fn bucket_texts(index: &HistoryIndex) -> Vec<(NaiveDate, Vec<String>)> {
    index
        .buckets()
        .iter()
        .map(|bucket| {
            let texts = bucket
                .entries
                .iter()
                .map(|e| e.as_text().unwrap_or("<image>").to_string())
                .collect();
            (bucket.date, texts)
        })
        .collect()
}

#[test]
fn load_groups_by_date_newest_first() {
    let (_dir, store) = open_store();
    append_text(&store, "2024-01-01T10:00:00", "hello, world");
    append_text(&store, "2024-01-02T09:00:00", "foo");

    let index = HistoryIndex::load(&store).unwrap();
    assert_eq!(
        bucket_texts(&index),
        vec![
            (day("2024-01-02"), vec!["foo".to_string()]),
            (day("2024-01-01"), vec!["hello, world".to_string()]),
        ]
    );
}

#[test]
fn text_round_trip_preserves_delimiters() {
    let (_dir, store) = open_store();
    let body = "line one, with comma\n\"line two\"\n\ttabbed,,\r\nend";
    append_text(&store, "2024-05-01T12:00:00", body);

    let index = HistoryIndex::load(&store).unwrap();
    assert_eq!(index.latest().and_then(|e| e.as_text()), Some(body));
}

#[test]
fn image_round_trip_is_byte_identical() {
    let (_dir, store) = open_store();
    let image = checkerboard();
    append_image(&store, "2024-05-01T12:00:00", &image);

    let index = HistoryIndex::load(&store).unwrap();
    let path = index.latest().and_then(|e| e.image_path()).unwrap();

    let stored = fs::read(path).unwrap();
    assert_eq!(stored, image.bytes());

    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 8));
}

#[test]
fn missing_image_files_are_skipped() {
    let (_dir, store) = open_store();
    append_image(&store, "2024-05-01T12:00:00", &checkerboard());
    append_text(&store, "2024-05-01T12:05:00", "still here");

    for item in fs::read_dir(store.images_dir()).unwrap() {
        fs::remove_file(item.unwrap().path()).unwrap();
    }

    let index = HistoryIndex::load(&store).unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index.latest().and_then(|e| e.as_text()), Some("still here"));
}

#[test]
fn clear_date_leaves_other_dates_untouched() {
    let (_dir, store) = open_store();
    let image = checkerboard();
    append_text(&store, "2024-01-01T10:00:00", "keep me");
    append_image(&store, "2024-01-01T11:00:00", &image);
    append_text(&store, "2024-01-02T09:00:00", "drop me");
    append_image(&store, "2024-01-02T09:30:00", &PngImage::from_rgba(1, 1, vec![0, 0, 0, 255]).unwrap());

    let kept_image = HistoryIndex::load(&store)
        .unwrap()
        .bucket(day("2024-01-01"))
        .and_then(|b| b.entries[1].image_path().map(|p| p.to_path_buf()))
        .unwrap();

    assert_eq!(store.clear_date(day("2024-01-02")).unwrap(), 2);

    let index = HistoryIndex::load(&store).unwrap();
    assert_eq!(index.dates().collect::<Vec<_>>(), vec![day("2024-01-01")]);
    assert_eq!(index.len(), 2);
    assert!(kept_image.exists());
    assert_eq!(fs::read_dir(store.images_dir()).unwrap().count(), 1);
}

#[test]
fn clear_all_empties_everything() {
    let (_dir, store) = open_store();
    append_text(&store, "2024-01-01T10:00:00", "a");
    append_image(&store, "2024-01-02T10:00:00", &checkerboard());

    store.clear_all().unwrap();

    let index = HistoryIndex::load(&store).unwrap();
    assert!(index.is_empty());
    assert_eq!(fs::read_dir(store.images_dir()).unwrap().count(), 0);
}

#[test]
fn search_spans_dates_and_ignores_case() {
    let (_dir, store) = open_store();
    append_text(&store, "2024-01-01T10:00:00", "xxABCxx");
    append_text(&store, "2024-01-01T11:00:00", "nothing");
    append_text(&store, "2024-01-03T08:00:00", "abc at start");
    append_image(&store, "2024-01-03T09:00:00", &checkerboard());

    let index = HistoryIndex::load(&store).unwrap();
    let hits: Vec<_> = index.search("abc").into_iter().filter_map(|e| e.as_text()).collect();
    assert_eq!(hits, vec!["abc at start", "xxABCxx"]);
}

/// 依次返回给定文本的假剪贴板
struct Sequence(std::vec::IntoIter<&'static str>);

impl ClipboardSource for Sequence {
    fn read(&mut self) -> Result<Option<ClipboardContent>, ClipboardError> {
        Ok(self.0.next().map(|s| ClipboardContent::Text(s.to_string())))
    }
}

#[test]
fn restart_does_not_duplicate_last_capture() {
    let (_dir, store) = open_store();
    append_text(&store, "2024-01-01T10:00:00", "copied before restart");

    let index = HistoryIndex::load(&store).unwrap();
    let mut poller = ClipboardPoller::primed(index.latest());
    let mut source = Sequence(vec!["copied before restart", "after restart"].into_iter());

    let mut recorded = 0;
    for _ in 0..3 {
        if let Some(capture) = poller.tick_at(&mut source, at("2024-01-01T11:00:00")) {
            store.append(&capture).unwrap();
            poller.commit(&capture);
            recorded += 1;
        }
    }

    assert_eq!(recorded, 1);
    assert_eq!(HistoryIndex::load(&store).unwrap().len(), 2);
}
