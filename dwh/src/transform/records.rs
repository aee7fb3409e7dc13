use crate::warehouse::{Row, RowReader, Value};
use rust_decimal::Decimal;

/// A row of one destination table, in its insert column order.
pub trait Record: Sized {
    fn from_row(row: Row) -> Result<Self, String>;

    fn to_row(&self) -> Row;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongPlayRecord {
    pub start_time: Option<i64>,
    pub user_id: Option<i32>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl Record for SongPlayRecord {
    fn from_row(row: Row) -> Result<Self, String> {
        let mut reader = RowReader::new(row);
        Ok(Self {
            start_time: reader.next("start_time")?,
            user_id: reader.next("user_id")?,
            level: reader.next("level")?,
            song_id: reader.next("song_id")?,
            artist_id: reader.next("artist_id")?,
            session_id: reader.next("session_id")?,
            location: reader.next("location")?,
            user_agent: reader.next("user_agent")?,
        })
    }

    fn to_row(&self) -> Row {
        vec![
            self.start_time.into(),
            self.user_id.into(),
            self.level.clone().into(),
            self.song_id.clone().into(),
            self.artist_id.clone().into(),
            self.session_id.into(),
            self.location.clone().into(),
            self.user_agent.clone().into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

impl Record for UserRecord {
    fn from_row(row: Row) -> Result<Self, String> {
        let mut reader = RowReader::new(row);
        Ok(Self {
            user_id: reader.next("user_id")?,
            first_name: reader.next("first_name")?,
            last_name: reader.next("last_name")?,
            gender: reader.next("gender")?,
            level: reader.next("level")?,
        })
    }

    fn to_row(&self) -> Row {
        vec![
            Value::Int(self.user_id),
            self.first_name.clone().into(),
            self.last_name.clone().into(),
            self.gender.clone().into(),
            self.level.clone().into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: Decimal,
}

impl Record for SongRecord {
    fn from_row(row: Row) -> Result<Self, String> {
        let mut reader = RowReader::new(row);
        Ok(Self {
            song_id: reader.next("song_id")?,
            title: reader.next("title")?,
            artist_id: reader.next("artist_id")?,
            year: reader.next("year")?,
            duration: reader.next("duration")?,
        })
    }

    fn to_row(&self) -> Row {
        vec![
            self.song_id.as_str().into(),
            self.title.as_str().into(),
            self.artist_id.as_str().into(),
            Value::Int(self.year),
            Value::Decimal(self.duration),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl Record for ArtistRecord {
    fn from_row(row: Row) -> Result<Self, String> {
        let mut reader = RowReader::new(row);
        Ok(Self {
            artist_id: reader.next("artist_id")?,
            name: reader.next("name")?,
            location: reader.next("location")?,
            latitude: reader.next("latitude")?,
            longitude: reader.next("longitude")?,
        })
    }

    fn to_row(&self) -> Row {
        vec![
            self.artist_id.as_str().into(),
            self.name.as_str().into(),
            self.location.clone().into(),
            self.latitude.clone().into(),
            self.longitude.clone().into(),
        ]
    }
}

/// Calendar breakdown of one play start, in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRecord {
    /// Whole seconds since the epoch.
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    /// ISO-8601 week number.
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// Monday is 0.
    pub weekday: i32,
}

impl Record for TimeRecord {
    /// Only the start time is read; the rest is derived.
    fn from_row(row: Row) -> Result<Self, String> {
        let mut reader = RowReader::new(row);
        let start_time: i64 = reader.next("start_time")?;
        super::calendar::breakdown(start_time)
    }

    fn to_row(&self) -> Row {
        vec![
            Value::BigInt(self.start_time),
            Value::Int(self.hour),
            Value::Int(self.day),
            Value::Int(self.week),
            Value::Int(self.month),
            Value::Int(self.year),
            Value::Int(self.weekday),
        ]
    }
}

/// The five record sets produced from staging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedData {
    pub songplays: Vec<SongPlayRecord>,
    pub users: Vec<UserRecord>,
    pub songs: Vec<SongRecord>,
    pub artists: Vec<ArtistRecord>,
    pub time: Vec<TimeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_songplay_reads_nullable_columns() {
        let row = vec![
            Value::BigInt(1541548796),
            Value::Int(26),
            Value::from("free"),
            Value::Null,
            Value::Null,
            Value::BigInt(583),
            Value::from("San Jose-Sunnyvale-Santa Clara, CA"),
            Value::Null,
        ];
        let record = SongPlayRecord::from_row(row.clone()).unwrap();
        assert_eq!(record.song_id, None);
        assert_eq!(record.session_id, Some(583));
        assert_eq!(record.to_row(), row);
    }

    #[test]
    fn test_required_column_rejects_null() {
        let row = vec![
            Value::from("SOA"),
            Value::Null,
            Value::from("ARA"),
            Value::Int(2001),
            Value::Decimal(Decimal::from(200)),
        ];
        let err = SongRecord::from_row(row).unwrap_err();
        assert!(err.contains("title"), "{}", err);
    }

    #[test]
    fn test_short_row_names_missing_column() {
        let err = UserRecord::from_row(vec![Value::Int(1), Value::from("Kaylee")]).unwrap_err();
        assert_eq!(err, "missing column last_name");
    }
}
