//! Definitions of the staging tables and the star schema.

use super::{ColumnDef, DEFAULT_DECIMAL, DistStyle, SqlType, TableDef};

pub const STAGING_EVENTS: &str = "staging_events";
pub const STAGING_SONGS: &str = "staging_songs";
pub const SONGPLAYS: &str = "songplays";
pub const USERS: &str = "users";
pub const SONGS: &str = "songs";
pub const ARTISTS: &str = "artists";
pub const TIME: &str = "time";

/// Drop order: songplays goes before the tables it references.
pub const DROP_ORDER: [&str; 7] = [
    STAGING_EVENTS,
    STAGING_SONGS,
    SONGPLAYS,
    USERS,
    SONGS,
    ARTISTS,
    TIME,
];

pub fn staging_events() -> TableDef {
    TableDef::new(
        STAGING_EVENTS,
        vec![
            ColumnDef::new("artist", SqlType::Varchar).dist_key(),
            ColumnDef::new("auth", SqlType::Varchar),
            ColumnDef::new("firstname", SqlType::Varchar),
            ColumnDef::new("gender", SqlType::Varchar),
            ColumnDef::new("iteminsession", SqlType::Int),
            ColumnDef::new("lastname", SqlType::Varchar),
            ColumnDef::new("length", DEFAULT_DECIMAL),
            ColumnDef::new("level", SqlType::Varchar),
            ColumnDef::new("location", SqlType::Varchar),
            ColumnDef::new("method", SqlType::Varchar),
            ColumnDef::new("page", SqlType::Varchar),
            ColumnDef::new("registration", DEFAULT_DECIMAL),
            ColumnDef::new("sessionid", SqlType::BigInt),
            ColumnDef::new("song", SqlType::Varchar),
            ColumnDef::new("status", SqlType::Int),
            ColumnDef::new("ts", SqlType::BigInt).sort_key(),
            ColumnDef::new("useragent", SqlType::Varchar),
            ColumnDef::new("userid", SqlType::Int),
        ],
    )
}

pub fn staging_songs() -> TableDef {
    TableDef::new(
        STAGING_SONGS,
        vec![
            ColumnDef::new("num_songs", SqlType::Int),
            ColumnDef::new("artist_id", SqlType::Varchar).not_null(),
            ColumnDef::new("artist_latitude", SqlType::Varchar),
            ColumnDef::new("artist_longitude", SqlType::Varchar),
            ColumnDef::new("artist_location", SqlType::Varchar),
            ColumnDef::new("artist_name", SqlType::Varchar)
                .dist_key()
                .not_null(),
            ColumnDef::new("song_id", SqlType::Varchar).sort_key().not_null(),
            ColumnDef::new("title", SqlType::Varchar).not_null(),
            ColumnDef::new("duration", DEFAULT_DECIMAL).not_null(),
            ColumnDef::new("year", SqlType::Int).not_null(),
        ],
    )
}

pub fn songplays() -> TableDef {
    TableDef::new(
        SONGPLAYS,
        vec![
            ColumnDef::new("songplay_id", SqlType::Int).identity(0, 1),
            ColumnDef::new("start_time", DEFAULT_DECIMAL)
                .sort_key()
                .not_null()
                .references(TIME),
            ColumnDef::new("user_id", SqlType::Int)
                .not_null()
                .references(USERS),
            ColumnDef::new("level", SqlType::Varchar),
            ColumnDef::new("song_id", SqlType::Varchar)
                .dist_key()
                .references(SONGS),
            ColumnDef::new("artist_id", SqlType::Varchar).references(ARTISTS),
            ColumnDef::new("session_id", SqlType::Int).not_null(),
            ColumnDef::new("location", SqlType::Varchar),
            ColumnDef::new("user_agent", SqlType::Varchar),
        ],
    )
    .primary_key(&["songplay_id"])
}

pub fn users() -> TableDef {
    TableDef::new(
        USERS,
        vec![
            ColumnDef::new("user_id", SqlType::Int).sort_key(),
            ColumnDef::new("first_name", SqlType::Varchar).not_null(),
            ColumnDef::new("last_name", SqlType::Varchar).not_null(),
            ColumnDef::new("gender", SqlType::Varchar),
            ColumnDef::new("level", SqlType::Varchar).not_null(),
        ],
    )
    .primary_key(&["user_id"])
    .dist_style(DistStyle::All)
}

pub fn songs() -> TableDef {
    TableDef::new(
        SONGS,
        vec![
            ColumnDef::new("song_id", SqlType::Varchar).dist_key().sort_key(),
            ColumnDef::new("title", SqlType::Varchar).not_null(),
            ColumnDef::new("artist_id", SqlType::Varchar).not_null(),
            ColumnDef::new("year", SqlType::Int).not_null(),
            ColumnDef::new("duration", DEFAULT_DECIMAL).not_null(),
        ],
    )
    .primary_key(&["song_id"])
}

pub fn artists() -> TableDef {
    TableDef::new(
        ARTISTS,
        vec![
            ColumnDef::new("artist_id", SqlType::Varchar).sort_key(),
            ColumnDef::new("name", SqlType::Varchar).not_null(),
            ColumnDef::new("location", SqlType::Varchar),
            ColumnDef::new("latitude", SqlType::Varchar),
            ColumnDef::new("longitude", SqlType::Varchar),
        ],
    )
    .primary_key(&["artist_id"])
    .dist_style(DistStyle::All)
}

pub fn time() -> TableDef {
    TableDef::new(
        TIME,
        vec![
            ColumnDef::new("start_time", DEFAULT_DECIMAL).sort_key(),
            ColumnDef::new("hour", SqlType::Int),
            ColumnDef::new("day", SqlType::Int),
            ColumnDef::new("week", SqlType::Int),
            ColumnDef::new("month", SqlType::Int),
            ColumnDef::new("year", SqlType::Int),
            ColumnDef::new("weekday", SqlType::Int),
        ],
    )
    .primary_key(&["start_time"])
    .dist_style(DistStyle::All)
}

/// Every managed table in creation order: referenced tables come first.
pub fn all_tables() -> Vec<TableDef> {
    vec![
        staging_events(),
        staging_songs(),
        users(),
        songs(),
        artists(),
        time(),
        songplays(),
    ]
}

pub fn table(name: &str) -> Option<TableDef> {
    all_tables().into_iter().find(|table| table.name == name)
}
