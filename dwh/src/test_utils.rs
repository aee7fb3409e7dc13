use crate::schema::SchemaManager;
use crate::staging::BulkLoader;
use crate::warehouse::LocalWarehouse;
use common::config::S3Config;
use serde_json::{Value as Json, json};
use std::path::Path;

/// An application log line for a non-play page.
pub fn event(user_id: &str, first_name: &str, level: &str, ts: i64, page: &str) -> Json {
    json!({
        "artist": null,
        "auth": "Logged In",
        "firstName": first_name,
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Test",
        "length": null,
        "level": level,
        "location": "Lansing-East Lansing, MI",
        "method": "GET",
        "page": page,
        "registration": 1540919166796.0,
        "sessionId": 38,
        "song": null,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id,
    })
}

/// An application log line for a song play.
pub fn play_event(
    user_id: &str,
    first_name: &str,
    level: &str,
    ts: i64,
    song: &str,
    artist: &str,
    length: f64,
) -> Json {
    let mut line = event(user_id, first_name, level, ts, "NextSong");
    let fields = line.as_object_mut().expect("event is an object");
    fields.insert("song".to_string(), json!(song));
    fields.insert("artist".to_string(), json!(artist));
    fields.insert("length".to_string(), json!(length));
    fields.insert("method".to_string(), json!("PUT"));
    line
}

/// A song catalog record.
pub fn song(
    song_id: &str,
    title: &str,
    artist_id: &str,
    artist_name: &str,
    duration: f64,
    year: i32,
) -> Json {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": 35.14968,
        "artist_longitude": -90.04892,
        "artist_location": "Memphis, TN",
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": duration,
        "year": year,
    })
}

/// Writes each record as its own object under `root/name`, one JSON object per
/// line, and returns the directory path.
pub fn write_objects(root: &Path, name: &str, records: &[Json]) -> String {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).expect("create fixture dir");
    for (idx, record) in records.iter().enumerate() {
        let path = dir.join(format!("part-{:04}.json", idx));
        std::fs::write(&path, format!("{}\n", record)).expect("write fixture");
    }
    dir.to_string_lossy().into_owned()
}

/// A local warehouse with a fresh schema and both staging tables loaded.
pub async fn staged_warehouse(
    events: &[Json],
    songs: &[Json],
) -> (tempfile::TempDir, LocalWarehouse) {
    let dir = tempfile::tempdir().expect("tempdir");
    let s3 = S3Config {
        log_data: write_objects(dir.path(), "log_data", events),
        song_data: write_objects(dir.path(), "song_data", songs),
        region: "us-west-2".to_string(),
    };

    let mut warehouse = LocalWarehouse::default();
    SchemaManager::new()
        .reset(&mut warehouse)
        .await
        .expect("reset schema");
    BulkLoader::new(&s3, None)
        .load_staging(&mut warehouse)
        .await
        .expect("load staging");

    (dir, warehouse)
}
