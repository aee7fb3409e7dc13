//! Read queries over the staging tables, one per destination table.
//!
//! Every query orders its result so that capped reads and identity
//! assignment are repeatable between runs.

pub const SONG_SELECT: &str = "\
SELECT DISTINCT song_id, title, artist_id, year, duration
FROM staging_songs
ORDER BY song_id";

/// One row per artist, taken from the artist's greatest song_id.
pub const ARTIST_SELECT: &str = "\
SELECT DISTINCT s.artist_id, s.artist_name, s.artist_location, s.artist_latitude, s.artist_longitude
FROM staging_songs s
JOIN (
    SELECT artist_id, max(song_id) AS song_id
    FROM staging_songs
    GROUP BY artist_id
) latest ON s.artist_id = latest.artist_id AND s.song_id = latest.song_id
ORDER BY s.artist_id";

/// One row per user, taken from the user's latest play.
pub const USER_SELECT: &str = "\
SELECT DISTINCT e.userid, e.firstname, e.lastname, e.gender, e.level
FROM staging_events e
JOIN (
    SELECT userid, max(ts) AS ts
    FROM staging_events
    WHERE page = 'NextSong'
    GROUP BY userid
) latest ON e.userid = latest.userid AND e.ts = latest.ts
ORDER BY e.userid";

pub const TIME_SELECT: &str = "\
SELECT DISTINCT ts / 1000 AS start_time
FROM staging_events
WHERE page = 'NextSong' AND ts IS NOT NULL
ORDER BY start_time";

pub const SONGPLAY_SELECT: &str = "\
SELECT DISTINCT e.ts / 1000 AS start_time, e.userid, e.level, s.song_id, s.artist_id,
       e.sessionid, e.location, e.useragent
FROM staging_events e
LEFT JOIN staging_songs s
    ON e.song = s.title AND e.artist = s.artist_name AND e.length = s.duration
WHERE e.page = 'NextSong'
ORDER BY start_time, e.userid, e.sessionid, s.song_id, s.artist_id,
         e.level, e.location, e.useragent";

/// Appends a row cap when one is set.
pub fn with_limit(sql: &str, limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!("{}\nLIMIT {}", sql, n),
        None => sql.to_string(),
    }
}
