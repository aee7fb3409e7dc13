pub mod calendar;
pub mod queries;
pub mod records;

pub use records::{
    ArtistRecord, Record, SongPlayRecord, SongRecord, TimeRecord, TransformedData, UserRecord,
};

use crate::schema::tables::{ARTISTS, SONGPLAYS, SONGS, TIME, USERS};
use crate::warehouse::Warehouse;
use common::{Error, Result, Stage};
use queries::with_limit;
use tracing::{debug, info};

/// Derives the star-schema record sets from the staging tables.
///
/// Each set comes from its own query. `limit` caps songs, artists and
/// songplays; users and time are never capped.
pub struct Transformer {
    limit: Option<usize>,
}

impl Transformer {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    pub async fn songs(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<SongRecord>> {
        fetch(warehouse, SONGS, &with_limit(queries::SONG_SELECT, self.limit)).await
    }

    pub async fn artists(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<ArtistRecord>> {
        fetch(warehouse, ARTISTS, &with_limit(queries::ARTIST_SELECT, self.limit)).await
    }

    pub async fn users(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<UserRecord>> {
        fetch(warehouse, USERS, queries::USER_SELECT).await
    }

    pub async fn time(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<TimeRecord>> {
        fetch(warehouse, TIME, queries::TIME_SELECT).await
    }

    pub async fn songplays(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<SongPlayRecord>> {
        fetch(warehouse, SONGPLAYS, &with_limit(queries::SONGPLAY_SELECT, self.limit)).await
    }

    pub async fn transform_all(&self, warehouse: &mut dyn Warehouse) -> Result<TransformedData> {
        let data = TransformedData {
            songs: self.songs(warehouse).await?,
            artists: self.artists(warehouse).await?,
            users: self.users(warehouse).await?,
            time: self.time(warehouse).await?,
            songplays: self.songplays(warehouse).await?,
        };

        info!(
            songplays = data.songplays.len(),
            users = data.users.len(),
            songs = data.songs.len(),
            artists = data.artists.len(),
            time = data.time.len(),
            "Transformed staging data"
        );
        Ok(data)
    }
}

async fn fetch<R: Record>(
    warehouse: &mut dyn Warehouse,
    table: &str,
    sql: &str,
) -> Result<Vec<R>> {
    debug!(table, sql, "Running transformation query");
    let rows = warehouse
        .query(sql)
        .await
        .map_err(|e| e.in_stage(Stage::Transformation, table))?;

    rows.into_iter()
        .map(|row| {
            R::from_row(row).map_err(|e| Error::Transformation(format!("{}: {}", table, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{event, play_event, song, staged_warehouse};
    use crate::warehouse::LocalWarehouse;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_user_row_comes_from_latest_play() {
        let events = vec![
            play_event("15", "Lily", "free", 1541106106796, "Song A", "Artist A", 200.0),
            play_event("15", "Lily", "paid", 1541106496796, "Song B", "Artist B", 180.0),
            event("15", "Lily", "free", 1541106500000, "Logout"),
            play_event("26", "Ryan", "free", 1541106106796, "Song A", "Artist A", 200.0),
        ];
        let songs = vec![song("SOAAA", "Song A", "ARAAA", "Artist A", 200.0, 2001)];
        let (_dir, mut warehouse) = staged_warehouse(&events, &songs).await;

        let users = Transformer::new(None).users(&mut warehouse).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].user_id, 15);
        assert_eq!(users[0].level.as_deref(), Some("paid"));
        assert_eq!(users[1].user_id, 26);
    }

    #[tokio::test]
    async fn test_artist_row_comes_from_greatest_song_id() {
        let mut first = song("SOAAA", "Song A", "ARXXX", "Artist X", 200.0, 2001);
        first["artist_location"] = "Memphis, TN".into();
        let mut second = song("SOBBB", "Song B", "ARXXX", "Artist X", 180.0, 2003);
        second["artist_location"] = "Chicago, IL".into();
        let events = vec![event("15", "Lily", "free", 1541106106796, "Home")];
        let (_dir, mut warehouse) = staged_warehouse(&events, &[first, second]).await;

        let artists = Transformer::new(None).artists(&mut warehouse).await.unwrap();
        assert_eq!(
            artists,
            vec![ArtistRecord {
                artist_id: "ARXXX".to_string(),
                name: "Artist X".to_string(),
                location: Some("Chicago, IL".to_string()),
                latitude: Some("35.14968".to_string()),
                longitude: Some("-90.04892".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_time_is_broken_down_in_seconds() {
        let events = vec![
            play_event("15", "Lily", "free", 1541548796000, "Song A", "Artist A", 200.0),
            play_event("26", "Ryan", "free", 1541548796999, "Song B", "Artist B", 180.0),
            event("26", "Ryan", "free", 1541548900000, "Home"),
        ];
        let songs = vec![song("SOAAA", "Song A", "ARAAA", "Artist A", 200.0, 2001)];
        let (_dir, mut warehouse) = staged_warehouse(&events, &songs).await;

        let time = Transformer::new(None).time(&mut warehouse).await.unwrap();
        assert_eq!(
            time,
            vec![TimeRecord {
                start_time: 1541548796,
                hour: 23,
                day: 6,
                week: 45,
                month: 11,
                year: 2018,
                weekday: 1,
            }]
        );
    }

    #[tokio::test]
    async fn test_unmatched_play_keeps_null_song() {
        let events = vec![
            play_event("15", "Lily", "free", 1541106106796, "Song A", "Artist A", 200.0),
            play_event("15", "Lily", "free", 1541106306796, "Unknown", "Nobody", 99.0),
        ];
        let songs = vec![song("SOAAA", "Song A", "ARAAA", "Artist A", 200.0, 2001)];
        let (_dir, mut warehouse) = staged_warehouse(&events, &songs).await;

        let plays = Transformer::new(None).songplays(&mut warehouse).await.unwrap();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].start_time, Some(1541106106));
        assert_eq!(plays[0].song_id.as_deref(), Some("SOAAA"));
        assert_eq!(plays[0].artist_id.as_deref(), Some("ARAAA"));
        assert_eq!(plays[0].session_id, Some(38));
        assert_eq!(plays[1].song_id, None);
        assert_eq!(plays[1].artist_id, None);
    }

    #[tokio::test]
    async fn test_limit_caps_songs_but_not_users() {
        let events: Vec<_> = (1..=3)
            .map(|id| {
                play_event(&id.to_string(), "U", "free", 1541106106796 + id, "S", "A", 1.0)
            })
            .collect();
        let songs: Vec<_> = (1..=3)
            .map(|id| song(&format!("SO{}", id), "S", &format!("AR{}", id), "A", 1.0, 2000))
            .collect();
        let (_dir, mut warehouse) = staged_warehouse(&events, &songs).await;

        let data = Transformer::new(Some(2))
            .transform_all(&mut warehouse)
            .await
            .unwrap();
        assert_eq!(data.songs.len(), 2);
        assert_eq!(data.artists.len(), 2);
        assert_eq!(data.songplays.len(), 2);
        assert_eq!(data.users.len(), 3);
        assert_eq!(data.songs[0].duration, Decimal::from(1));
    }

    #[tokio::test]
    async fn test_missing_staging_table_is_transformation_error() {
        let mut warehouse = LocalWarehouse::default();
        let err = Transformer::new(None).songs(&mut warehouse).await.unwrap_err();
        match err {
            Error::Transformation(message) => assert!(message.starts_with("songs:"), "{}", message),
            other => panic!("Expected transformation error, got {:?}", other),
        }
    }
}
